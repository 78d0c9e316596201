//! Interactive flanker session.
//!
//! The window walks one participant through the configured modules: intro,
//! per-module key mapping, practice with a summary screen, then the balanced
//! main block. The session engine owns randomness, scheduling and the results
//! log; this binary owns the clock, the pixels and the input queue. The active
//! trial is ticked once per frame at the display rate and never sleeps.
//!
//! Run with a preset or a JSON config:
//!
//!   cargo run -p eriksen_viz -- --preset letters --participant p01
//!   cargo run -p eriksen_viz -- --config lab.json --assets ./assets

use eriksen::config::ExperimentConfig;
use eriksen::paths::default_results_path;
use eriksen::session::{seed_from_clock, SessionEvent, SessionRunner, Stage};
use eriksen::stats::BlockStats;
use eriksen::stimulus::{RenderMode, StimulusSet};
use eriksen::trial::{InputEvent, TrialOutcome, TrialRun, TrialView};
use macroquad::prelude::*;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::{error, info, warn};

mod stimuli;

use stimuli::AssetStore;

// The task area is plain white with dark ink, as participants expect from the
// paper versions of this task.
const BG_COLOR: Color = WHITE;
const TITLE_FONT: u16 = 48;
const BODY_FONT: u16 = 28;
const LINE_H: f32 = 35.0;

#[derive(Debug, Clone)]
struct VizConfig {
    config_path: Option<PathBuf>,
    preset: Option<String>,
    assets_dir: PathBuf,
    out_path: Option<PathBuf>,
    participant: Option<String>,
    age: Option<u32>,
    seed: Option<u64>,
}

impl VizConfig {
    fn from_env_and_args() -> Self {
        let mut config_path: Option<PathBuf> = None;
        let mut preset: Option<String> = env::var("ERIKSEN_PRESET").ok();
        let mut assets_dir: Option<PathBuf> =
            env::var("ERIKSEN_ASSETS_DIR").ok().map(PathBuf::from);
        let mut out_path: Option<PathBuf> = env::var("ERIKSEN_OUT").ok().map(PathBuf::from);
        let mut participant: Option<String> = None;
        let mut age: Option<u32> = None;
        let mut seed: Option<u64> = None;

        let mut args = env::args().skip(1);
        while let Some(a) = args.next() {
            match a.as_str() {
                "--config" => {
                    if let Some(v) = args.next() {
                        config_path = Some(PathBuf::from(v));
                    }
                }
                "--preset" => {
                    if let Some(v) = args.next() {
                        preset = Some(v);
                    }
                }
                "--assets" => {
                    if let Some(v) = args.next() {
                        assets_dir = Some(PathBuf::from(v));
                    }
                }
                "--out" => {
                    if let Some(v) = args.next() {
                        out_path = Some(PathBuf::from(v));
                    }
                }
                "--participant" => {
                    if let Some(v) = args.next() {
                        participant = Some(v);
                    }
                }
                "--age" => {
                    if let Some(v) = args.next() {
                        age = v.parse().ok();
                    }
                }
                "--seed" => {
                    if let Some(v) = args.next() {
                        seed = v.parse().ok();
                    }
                }
                _ => {}
            }
        }

        Self {
            config_path,
            preset,
            assets_dir: assets_dir.unwrap_or_else(|| PathBuf::from("assets")),
            out_path,
            participant,
            age,
            seed,
        }
    }
}

fn load_experiment(viz: &VizConfig) -> Result<ExperimentConfig, String> {
    if let Some(path) = &viz.config_path {
        return ExperimentConfig::load(path).map_err(|e| format!("{}: {e}", path.display()));
    }
    let name = viz.preset.as_deref().unwrap_or("battery");
    ExperimentConfig::preset(name).ok_or_else(|| {
        format!(
            "unknown preset `{name}` (have: {})",
            ExperimentConfig::PRESET_NAMES.join(", ")
        )
    })
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Eriksen Flanker".to_owned(),
        window_width: 1000,
        window_height: 600,
        window_resizable: false,
        ..Default::default()
    }
}

/// In-window replacement for the console prompt: collects the participant ID
/// and an optional age before the session starts.
async fn participant_entry() -> (String, Option<u32>) {
    let mut name = String::new();
    let mut age = String::new();
    let mut editing_age = false;
    loop {
        clear_background(BG_COLOR);
        let cx = screen_width() * 0.5;

        stimuli::draw_text_centered("Participant Setup", cx, 120.0, TITLE_FONT, stimuli::INK);
        let name_line = format!(
            "Participant ID: {}{}",
            name,
            if editing_age { "" } else { "_" }
        );
        let age_line = format!("Age (optional): {}{}", age, if editing_age { "_" } else { "" });
        stimuli::draw_text_centered(&name_line, cx, 260.0, BODY_FONT, stimuli::INK);
        stimuli::draw_text_centered(&age_line, cx, 310.0, BODY_FONT, stimuli::INK);
        stimuli::draw_text_centered(
            "Type, then press ENTER. TAB switches fields, ESC quits.",
            cx,
            420.0,
            BODY_FONT,
            GRAY,
        );

        while let Some(ch) = get_char_pressed() {
            if editing_age {
                if ch.is_ascii_digit() && age.len() < 3 {
                    age.push(ch);
                }
            } else if (ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') && name.len() < 32 {
                name.push(ch);
            }
        }
        if is_key_pressed(KeyCode::Backspace) {
            if editing_age {
                age.pop();
            } else {
                name.pop();
            }
        }
        if is_key_pressed(KeyCode::Tab) {
            editing_age = !editing_age;
        }
        if is_key_pressed(KeyCode::Enter) {
            if !editing_age {
                editing_age = true;
            } else if name.is_empty() {
                // An ID is required; bounce back to the empty field.
                editing_age = false;
            } else {
                return (name, age.parse().ok());
            }
        }
        if is_key_pressed(KeyCode::Escape) {
            process::exit(0);
        }
        next_frame().await;
    }
}

fn draw_lines_centered(lines: &[String], top: f32, font: u16) {
    let cx = screen_width() * 0.5;
    let mut y = top;
    for line in lines {
        if !line.is_empty() {
            stimuli::draw_text_centered(line, cx, y, font, stimuli::INK);
        }
        y += LINE_H;
    }
}

fn draw_intro(config: &ExperimentConfig) {
    let count = config.modules.len();
    let tasks = if count == 1 {
        "1 task".to_string()
    } else {
        format!("{count} tasks")
    };
    let mut lines = vec![
        "Thank you for consenting to participate in this experiment.".to_string(),
        String::new(),
        "General Instructions:".to_string(),
        format!("The session consists of {tasks}."),
    ];
    if config.practice_trials > 0 {
        lines.push(
            "Each task includes a short practice block followed by the main experiment."
                .to_string(),
        );
    }
    lines.push("Answer with the LEFT and RIGHT arrow keys.".to_string());
    if config.attention.probability > 0.0 {
        lines.push(String::new());
        lines.push("Please Note:".to_string());
        lines.push("At random times a red dot will appear.".to_string());
        lines.push("CLICK on it to proceed.".to_string());
    }
    lines.push(String::new());
    lines.push("Press SPACE to begin.".to_string());
    draw_lines_centered(&lines, 80.0, BODY_FONT);
}

fn draw_thumb_row(store: &AssetStore, set: &StimulusSet, keys: &[String], y: f32) {
    let cx = screen_width() * 0.5;
    let step = stimuli::THUMB_SIZE + 20.0;
    let total = step * keys.len() as f32;
    let mut x = cx - total * 0.5 + step * 0.5;
    for key in keys {
        stimuli::draw_thumb(store, set, key, x, y);
        x += step;
    }
}

fn draw_module_intro(set: &StimulusSet, store: &AssetStore, practice_trials: usize) {
    let cx = screen_width() * 0.5;
    stimuli::draw_text_centered(&set.name, cx, 90.0, TITLE_FONT, stimuli::INK);

    let noun = match set.mode {
        RenderMode::Text => "letters",
        RenderMode::Image => "images",
        RenderMode::Mixed => "characters",
    };
    stimuli::draw_text_centered(
        &format!("You will be shown three {noun}."),
        cx,
        160.0,
        BODY_FONT,
        stimuli::INK,
    );
    stimuli::draw_text_centered(
        "Decide which group the CENTER one belongs to. Ignore the others.",
        cx,
        195.0,
        BODY_FONT,
        stimuli::INK,
    );

    match set.mode {
        RenderMode::Text => {
            stimuli::draw_text_centered(
                &format!("LEFT ARROW = {}", set.left.join(", ")),
                cx,
                290.0,
                BODY_FONT,
                stimuli::INK,
            );
            stimuli::draw_text_centered(
                &format!("RIGHT ARROW = {}", set.right.join(", ")),
                cx,
                340.0,
                BODY_FONT,
                stimuli::INK,
            );
        }
        RenderMode::Image | RenderMode::Mixed => {
            stimuli::draw_text_centered("LEFT ARROW:", cx, 250.0, BODY_FONT, stimuli::INK);
            draw_thumb_row(store, set, &set.left, 310.0);
            stimuli::draw_text_centered("RIGHT ARROW:", cx, 390.0, BODY_FONT, stimuli::INK);
            draw_thumb_row(store, set, &set.right, 450.0);
        }
    }

    let starter = if practice_trials > 0 {
        "Press SPACE to begin practice"
    } else {
        "Press SPACE to begin"
    };
    stimuli::draw_text_centered(starter, cx, screen_height() - 50.0, BODY_FONT, stimuli::INK);
}

fn draw_practice_summary(stats: &BlockStats, checks: (u32, u32)) {
    let cx = screen_width() * 0.5;
    let cy = screen_height() * 0.5;
    stimuli::draw_text_centered("Practice Complete", cx, cy - 80.0, TITLE_FONT, stimuli::INK);
    stimuli::draw_text_centered(
        &format!("Accuracy: {:.1}%", stats.accuracy() * 100.0),
        cx,
        cy - 10.0,
        BODY_FONT,
        stimuli::INK,
    );
    if let Some(rt) = stats.mean_reaction_seconds() {
        stimuli::draw_text_centered(
            &format!("Mean RT (correct trials): {:.0} ms", rt * 1000.0),
            cx,
            cy + 30.0,
            BODY_FONT,
            stimuli::INK,
        );
    }
    let (shown, hit) = checks;
    if shown > 0 {
        stimuli::draw_text_centered(
            &format!("Red dots clicked: {hit}/{shown}"),
            cx,
            cy + 70.0,
            BODY_FONT,
            stimuli::INK,
        );
    }
    stimuli::draw_text_centered(
        "Press SPACE to start the experiment",
        cx,
        cy + 110.0,
        BODY_FONT,
        stimuli::INK,
    );
}

fn draw_end_screen(out_path: &Path) {
    let cx = screen_width() * 0.5;
    let cy = screen_height() * 0.5;
    stimuli::draw_text_centered("Experiment Complete", cx, cy - 60.0, TITLE_FONT, stimuli::INK);
    stimuli::draw_text_centered("Thank You!", cx, cy, TITLE_FONT, stimuli::INK);
    stimuli::draw_text_centered(
        &format!("Data saved as: {}", out_path.display()),
        cx,
        cy + 70.0,
        BODY_FONT,
        stimuli::INK,
    );
    stimuli::draw_text_centered("Press ESC to exit", cx, screen_height() - 50.0, BODY_FONT, GRAY);
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt::init();

    let viz = VizConfig::from_env_and_args();
    let experiment = match load_experiment(&viz) {
        Ok(config) => config,
        Err(e) => {
            error!("Config error: {e}");
            process::exit(1);
        }
    };
    info!(
        "Experiment: {} ({} modules)",
        experiment.title,
        experiment.modules.len()
    );

    // Check markers are placed in config screen coordinates; the window must
    // match them one-to-one.
    request_new_screen_size(experiment.screen_width, experiment.screen_height);

    let (participant, age) = match (viz.participant.clone(), viz.age) {
        (Some(name), age) => (name, age),
        (None, _) => participant_entry().await,
    };

    let seed = viz.seed.or(experiment.seed).unwrap_or_else(seed_from_clock);
    info!("Participant `{participant}`, seed {seed}");

    let mut runner = match SessionRunner::new(experiment, &participant, age, seed) {
        Ok(runner) => runner,
        Err(e) => {
            error!("Invalid experiment config: {e}");
            process::exit(1);
        }
    };

    let store = match AssetStore::load(&viz.assets_dir, &runner.config().modules).await {
        Ok(store) => store,
        Err(e) => {
            error!("Stimulus assets: {e}");
            process::exit(1);
        }
    };
    if !store.is_empty() {
        info!(
            "Loaded {} stimulus images from {:?}",
            store.len(),
            viz.assets_dir
        );
    }

    let out_path = viz
        .out_path
        .clone()
        .unwrap_or_else(|| default_results_path(&participant, runner.results().meta.started_unix));
    info!("Results file: {:?}", out_path);

    let mut active: Option<TrialRun> = None;
    let mut aborted = false;

    loop {
        clear_background(BG_COLOR);

        if is_key_pressed(KeyCode::Escape) {
            aborted = runner.stage() != Stage::Done;
            break;
        }

        let mut events: Vec<InputEvent> = Vec::new();
        if is_key_pressed(KeyCode::Left) {
            events.push(InputEvent::Left);
        }
        if is_key_pressed(KeyCode::Right) {
            events.push(InputEvent::Right);
        }
        if is_key_pressed(KeyCode::Space) {
            events.push(InputEvent::Advance);
        }
        if is_mouse_button_pressed(MouseButton::Left) {
            let (x, y) = mouse_position();
            events.push(InputEvent::Click { x, y });
        }
        let advance = events.contains(&InputEvent::Advance);

        match runner.stage() {
            Stage::Intro => {
                draw_intro(runner.config());
                if advance {
                    runner.advance();
                }
            }
            Stage::ModuleIntro => {
                if let Some(set) = runner.current_module() {
                    draw_module_intro(set, &store, runner.config().practice_trials);
                }
                if advance {
                    runner.advance();
                }
            }
            Stage::PracticeSummary => {
                draw_practice_summary(runner.practice_stats(), runner.practice_checks());
                if advance {
                    runner.advance();
                }
            }
            Stage::Practice | Stage::Main => {
                let now = Instant::now();
                if active.is_none() {
                    active = runner.start_trial(now);
                }

                let mut completed: Option<TrialOutcome> = None;
                if let Some(run) = active.as_mut() {
                    completed = run.tick(now, &events);
                    if completed.is_none() {
                        let cx = screen_width() * 0.5;
                        let cy = screen_height() * 0.5;
                        match run.view() {
                            TrialView::Blank => {}
                            TrialView::Fixation => stimuli::draw_fixation(cx, cy),
                            TrialView::Marker(spot) => stimuli::draw_marker(spot),
                            TrialView::Stimulus(spec) => {
                                if let Some(set) = runner.current_module() {
                                    stimuli::draw_stimulus(spec, set, &store, cx, cy);
                                }
                            }
                            TrialView::Prompt(_) => stimuli::draw_prompt(cx, cy),
                        }
                    }
                }

                if let Some(outcome) = completed {
                    if let Some(run) = active.take() {
                        match runner.finish_trial(&run, &outcome) {
                            Some(SessionEvent::BlockComplete { last }) => {
                                match runner.write_results(&out_path) {
                                    Ok(()) => info!("Block complete; results flushed"),
                                    Err(e) => error!("Failed to write results: {e}"),
                                }
                                if last {
                                    info!("Session complete: {} records", runner.results().len());
                                }
                            }
                            Some(SessionEvent::PracticeComplete) | None => {}
                        }
                    }
                }
            }
            Stage::Done => {
                draw_end_screen(&out_path);
            }
        }

        next_frame().await;
    }

    if aborted {
        warn!("Session aborted at {:?}", runner.stage());
        if !runner.results().is_empty() {
            match runner.write_results(&out_path) {
                Ok(()) => info!("Partial results kept at {:?}", out_path),
                Err(e) => error!("Failed to write partial results: {e}"),
            }
        }
    }
}
