//! Experiment configuration.
//!
//! One `ExperimentConfig` describes a whole session: module definitions,
//! block sizes, trial timing and attention-check settings. It is constructed
//! once (from a preset or a JSON file) and passed by reference; nothing here
//! is global. The historical experiment variants ship as presets so they are
//! plain configuration instances of the same engine.

use crate::stimulus::{RenderMode, StimulusSet, StimulusSetError};
use crate::trial::{ResponseWindow, TrialTiming};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Chance that a trial attempt becomes an attention check.
    #[serde(default = "default_check_probability")]
    pub probability: f32,
    /// Marker radius in pixels. A click within this radius is a hit.
    #[serde(default = "default_check_radius")]
    pub radius: f32,
    /// Placement margin keeping the marker fully on screen.
    #[serde(default = "default_check_margin")]
    pub margin: f32,
    #[serde(default = "default_check_window_ms")]
    pub window_ms: u64,
}

fn default_check_probability() -> f32 {
    0.05
}

fn default_check_radius() -> f32 {
    15.0
}

fn default_check_margin() -> f32 {
    100.0
}

fn default_check_window_ms() -> u64 {
    3000
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            probability: default_check_probability(),
            radius: default_check_radius(),
            margin: default_check_margin(),
            window_ms: default_check_window_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_screen_width")]
    pub screen_width: f32,
    #[serde(default = "default_screen_height")]
    pub screen_height: f32,
    #[serde(default = "default_practice_trials")]
    pub practice_trials: usize,
    #[serde(default = "default_main_trials")]
    pub main_trials: usize,
    #[serde(default)]
    pub timing: TrialTiming,
    #[serde(default)]
    pub attention: AttentionConfig,
    /// Randomize module order per session.
    #[serde(default = "default_true")]
    pub shuffle_modules: bool,
    /// Fixed seed for reproducible sessions. Absent means seed from the clock.
    #[serde(default)]
    pub seed: Option<u64>,
    pub modules: Vec<StimulusSet>,
}

fn default_title() -> String {
    "Flanker Task".to_string()
}

fn default_screen_width() -> f32 {
    1000.0
}

fn default_screen_height() -> f32 {
    600.0
}

fn default_practice_trials() -> usize {
    6
}

fn default_main_trials() -> usize {
    30
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Stimulus(#[from] StimulusSetError),
    #[error("no modules configured")]
    NoModules,
    #[error("main_trials must be at least 1")]
    NoMainTrials,
    #[error("attention probability {0} is outside [0, 1)")]
    BadProbability(f32),
    #[error("attention margin {margin} leaves no room on a {width}x{height} screen")]
    BadMargin { margin: f32, width: f32, height: f32 },
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.is_empty() {
            return Err(ConfigError::NoModules);
        }
        if self.main_trials == 0 {
            return Err(ConfigError::NoMainTrials);
        }
        // Checks never consume balanced slots, so a certain check on every
        // attempt would starve the main block forever. p must stay below 1.
        let p = self.attention.probability;
        if !p.is_finite() || !(0.0..1.0).contains(&p) {
            return Err(ConfigError::BadProbability(p));
        }
        if p > 0.0 {
            let margin = self.attention.margin;
            if margin * 2.0 >= self.screen_width || margin * 2.0 >= self.screen_height {
                return Err(ConfigError::BadMargin {
                    margin,
                    width: self.screen_width,
                    height: self.screen_height,
                });
            }
        }
        for module in &self.modules {
            module.validate()?;
        }
        Ok(())
    }

    /// Look up a named builtin.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "battery" => Some(Self::battery()),
            "letters" => Some(Self::letters()),
            "bounded" => Some(Self::bounded_emoji()),
            "prompted" => Some(Self::prompted_emoji()),
            _ => None,
        }
    }

    pub const PRESET_NAMES: [&'static str; 4] = ["battery", "letters", "bounded", "prompted"];

    /// The full four-module battery: letters, emoji images, shapes, and the
    /// mixed module with image targets flanked by letters.
    pub fn battery() -> Self {
        let mut mixed = module(
            "Letter + Emoji",
            RenderMode::Mixed,
            &["happy_1", "happy_2"],
            &["sad_1", "sad_2"],
            &["neutral_1", "neutral_2"],
        );
        mixed.flanker_left = vec!["H".to_string()];
        mixed.flanker_right = vec!["S".to_string()];
        mixed.flanker_neutral = vec!["X".to_string()];
        mixed.assets = image_assets("emoticons", &["happy_1", "happy_2", "sad_1", "sad_2"]);

        let mut emoji = module(
            "Emoji",
            RenderMode::Image,
            &["happy_1", "happy_2"],
            &["sad_1", "sad_2"],
            &["neutral_1", "neutral_2"],
        );
        emoji.assets = image_assets(
            "emoticons",
            &["happy_1", "happy_2", "sad_1", "sad_2", "neutral_1", "neutral_2"],
        );

        let mut shape = module(
            "Shape",
            RenderMode::Image,
            &["square", "pentagon"],
            &["circle", "triangle"],
            &["heart", "star"],
        );
        shape.assets = image_assets(
            "shapes",
            &["square", "pentagon", "circle", "triangle", "heart", "star"],
        );

        Self {
            title: "Flanker Battery".to_string(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            practice_trials: 6,
            main_trials: 30,
            timing: TrialTiming::default(),
            attention: AttentionConfig::default(),
            shuffle_modules: true,
            seed: None,
            modules: vec![
                module(
                    "Letter",
                    RenderMode::Text,
                    &["A", "B"],
                    &["C", "D"],
                    &["X", "Y"],
                ),
                emoji,
                shape,
                mixed,
            ],
        }
    }

    /// The quick single-module text variant with frequent attention checks.
    pub fn letters() -> Self {
        Self {
            title: "Letter Flanker".to_string(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            practice_trials: 4,
            main_trials: 20,
            timing: TrialTiming::default(),
            attention: AttentionConfig {
                probability: 0.2,
                ..AttentionConfig::default()
            },
            shuffle_modules: false,
            seed: None,
            modules: vec![module(
                "Letter",
                RenderMode::Text,
                &["A", "B"],
                &["C", "D"],
                &["X", "Y"],
            )],
        }
    }

    /// Speeded variant: fixation cross, a fixed 1.5 s stimulus window and an
    /// inter-trial blank, no attention checks.
    pub fn bounded_emoji() -> Self {
        let mut emoji = module(
            "Emoji",
            RenderMode::Image,
            &["happy_1", "happy_2"],
            &["sad_1", "sad_2"],
            &["neutral_1", "neutral_2"],
        );
        emoji.assets = image_assets(
            "emoticons",
            &["happy_1", "happy_2", "sad_1", "sad_2", "neutral_1", "neutral_2"],
        );

        Self {
            title: "Speeded Emoji Flanker".to_string(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            practice_trials: 6,
            main_trials: 30,
            timing: TrialTiming {
                fixation_ms: 500,
                iti_ms: 400,
                response: ResponseWindow::Bounded { limit_ms: 1500 },
            },
            attention: AttentionConfig {
                probability: 0.0,
                ..AttentionConfig::default()
            },
            shuffle_modules: false,
            seed: None,
            modules: vec![emoji],
        }
    }

    /// Like `bounded_emoji`, but the stimulus disappears after 1.5 s and the
    /// response is collected on a separate question screen with no deadline.
    pub fn prompted_emoji() -> Self {
        let mut config = Self::bounded_emoji();
        config.title = "Prompted Emoji Flanker".to_string();
        config.timing.response = ResponseWindow::StimulusThenPrompt { stimulus_ms: 1500 };
        config
    }
}

fn module(
    name: &str,
    mode: RenderMode,
    left: &[&str],
    right: &[&str],
    neutral: &[&str],
) -> StimulusSet {
    let owned = |keys: &[&str]| keys.iter().map(|k| k.to_string()).collect::<Vec<_>>();
    StimulusSet {
        name: name.to_string(),
        mode,
        left: owned(left),
        right: owned(right),
        neutral: owned(neutral),
        flanker_left: Vec::new(),
        flanker_right: Vec::new(),
        flanker_neutral: Vec::new(),
        assets: HashMap::new(),
    }
}

fn image_assets(folder: &str, keys: &[&str]) -> HashMap<String, String> {
    keys.iter()
        .map(|k| (k.to_string(), format!("{folder}/{k}.png")))
        .collect()
}
