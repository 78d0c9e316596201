//! Headless session simulation.
//!
//! Drives a full `SessionRunner` with a scripted observer on a synthetic
//! 60 Hz clock, no window required. The observer answers with configurable
//! accuracy and latency, clicks attention markers, and continues through
//! every screen, so one call exercises the same code path a participant
//! would. Used by the `simulate` command to vet a configuration and to
//! produce example results files.

use crate::config::{ConfigError, ExperimentConfig};
use crate::prng::Prng;
use crate::schedule::Condition;
use crate::session::{SessionEvent, SessionRunner, Stage};
use crate::stimulus::Side;
use crate::trial::{InputEvent, TrialOutcome, TrialRun, TrialView};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How the scripted observer behaves.
#[derive(Debug, Clone, Copy)]
pub struct ObserverProfile {
    /// Chance of answering on the target's side.
    pub accuracy: f32,
    pub base_rt_ms: f32,
    pub rt_jitter_ms: f32,
    /// Extra latency on incongruent trials, so simulated data shows a
    /// plausible flanker effect.
    pub incongruent_penalty_ms: f32,
    pub check_hit_rate: f32,
}

impl Default for ObserverProfile {
    fn default() -> Self {
        Self {
            accuracy: 0.92,
            base_rt_ms: 420.0,
            rt_jitter_ms: 120.0,
            incongruent_penalty_ms: 60.0,
            check_hit_rate: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub participant: String,
    pub seed: u64,
    pub modules: usize,
    pub trials_logged: usize,
    pub checks_shown: u32,
    pub checks_hit: u32,
    pub accuracy: f32,
    pub mean_rt_seconds: Option<f64>,
    pub flanker_effects: Vec<(String, Option<f64>)>,
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewKind {
    Stimulus,
    Prompt,
    Marker,
    Other,
}

fn view_kind(view: &TrialView<'_>) -> ViewKind {
    match view {
        TrialView::Stimulus(_) => ViewKind::Stimulus,
        TrialView::Prompt(_) => ViewKind::Prompt,
        TrialView::Marker(_) => ViewKind::Marker,
        TrialView::Fixation | TrialView::Blank => ViewKind::Other,
    }
}

/// What the observer intends to do in the current phase.
#[derive(Debug, Clone, Copy)]
struct Plan {
    due: Instant,
    event: Option<InputEvent>,
    fired: bool,
}

impl Plan {
    fn idle(now: Instant) -> Self {
        Self {
            due: now,
            event: None,
            fired: true,
        }
    }

    fn take(&mut self, now: Instant) -> Option<InputEvent> {
        if self.fired || now < self.due {
            return None;
        }
        self.fired = true;
        self.event
    }
}

fn make_plan(
    view: &TrialView<'_>,
    now: Instant,
    profile: &ObserverProfile,
    prng: &mut Prng,
) -> Plan {
    match view {
        TrialView::Stimulus(spec) | TrialView::Prompt(spec) => {
            let answer_correct = prng.next_f32_01() < profile.accuracy;
            let side = if answer_correct {
                spec.target_side
            } else {
                spec.target_side.opposite()
            };
            let mut latency = profile.base_rt_ms + prng.gen_range_f32(0.0, profile.rt_jitter_ms);
            if spec.condition == Condition::Incongruent {
                latency += profile.incongruent_penalty_ms;
            }
            let event = match side {
                Side::Left => InputEvent::Left,
                Side::Right => InputEvent::Right,
            };
            Plan {
                due: now + Duration::from_millis(latency as u64),
                event: Some(event),
                fired: false,
            }
        }
        TrialView::Marker(spot) => {
            if prng.next_f32_01() < profile.check_hit_rate {
                let latency = prng.gen_range_f32(400.0, 1200.0);
                Plan {
                    due: now + Duration::from_millis(latency as u64),
                    event: Some(InputEvent::Click { x: spot.x, y: spot.y }),
                    fired: false,
                }
            } else {
                // Missed check: the observer never clicks.
                Plan::idle(now)
            }
        }
        TrialView::Fixation | TrialView::Blank => Plan::idle(now),
    }
}

/// Run one full simulated session. With `out` set, the results file is
/// flushed at every block boundary, exactly like the interactive frontend.
pub fn run_headless(
    config: ExperimentConfig,
    participant: &str,
    seed: u64,
    profile: &ObserverProfile,
    out: Option<&Path>,
) -> Result<SimReport, SimError> {
    let mut runner = SessionRunner::new(config, participant, None, seed)?;
    let mut observer = Prng::new(seed ^ 0xA5A5_A5A5_A5A5_A5A5);

    let mut now = Instant::now();
    while runner.stage() != Stage::Done {
        match runner.stage() {
            Stage::Intro | Stage::ModuleIntro | Stage::PracticeSummary => runner.advance(),
            Stage::Practice | Stage::Main => {
                let Some(mut run) = runner.start_trial(now) else {
                    break;
                };
                let outcome = drive_trial(&mut run, &mut now, profile, &mut observer);
                let event = runner.finish_trial(&run, &outcome);
                if let (Some(SessionEvent::BlockComplete { .. }), Some(path)) = (event, out) {
                    runner.write_results(path)?;
                }
            }
            Stage::Done => {}
        }
    }

    let summary = runner.summary();
    let meta = &runner.results().meta;
    Ok(SimReport {
        participant: meta.participant.clone(),
        seed,
        modules: summary.modules.len(),
        trials_logged: runner.results().len(),
        checks_shown: summary.modules.iter().map(|m| m.checks_shown).sum(),
        checks_hit: summary.modules.iter().map(|m| m.checks_hit).sum(),
        accuracy: summary.overall.accuracy(),
        mean_rt_seconds: summary.overall.mean_reaction_seconds(),
        flanker_effects: summary
            .modules
            .iter()
            .map(|m| (m.name.clone(), m.flanker_effect_seconds()))
            .collect(),
    })
}

fn drive_trial(
    run: &mut TrialRun,
    now: &mut Instant,
    profile: &ObserverProfile,
    observer: &mut Prng,
) -> TrialOutcome {
    let mut kind = ViewKind::Other;
    let mut plan = Plan::idle(*now);
    loop {
        *now += FRAME;
        let view = run.view();
        let current = view_kind(&view);
        if current != kind {
            kind = current;
            plan = make_plan(&view, *now, profile, observer);
        }
        let events: Vec<InputEvent> = plan.take(*now).into_iter().collect();
        if let Some(outcome) = run.tick(*now, &events) {
            return outcome;
        }
    }
}

pub fn print_report(r: &SimReport) {
    println!("simulated session");
    println!("participant={}", r.participant);
    println!("seed={}", r.seed);
    println!("modules={}", r.modules);
    println!("trials_logged={}", r.trials_logged);
    println!("checks_shown={}", r.checks_shown);
    println!("checks_hit={}", r.checks_hit);
    println!("accuracy={:.3}", r.accuracy);
    match r.mean_rt_seconds {
        Some(rt) => println!("mean_rt_s={rt:.4}"),
        None => println!("mean_rt_s=n/a"),
    }
    for (module, effect) in &r.flanker_effects {
        match effect {
            Some(e) => println!("flanker_effect_s[{module}]={e:+.4}"),
            None => println!("flanker_effect_s[{module}]=n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultsLog;

    #[test]
    fn battery_simulation_is_deterministic() {
        let profile = ObserverProfile::default();
        let a = run_headless(ExperimentConfig::battery(), "sim", 31, &profile, None).unwrap();
        let b = run_headless(ExperimentConfig::battery(), "sim", 31, &profile, None).unwrap();
        assert_eq!(a, b);

        // Every module logged its full balanced block, plus any checks.
        assert_eq!(a.modules, 4);
        assert_eq!(a.trials_logged - a.checks_shown as usize, 4 * 30);
        assert!(a.accuracy > 0.5);
    }

    #[test]
    fn perfect_observer_scores_everything() {
        let profile = ObserverProfile {
            accuracy: 1.0,
            check_hit_rate: 1.0,
            ..ObserverProfile::default()
        };
        let mut config = ExperimentConfig::letters();
        // Check-heavy so the hit accounting actually gets exercised.
        config.attention.probability = 0.5;
        let report = run_headless(config, "sim", 7, &profile, None).unwrap();
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.checks_hit, report.checks_shown);
        assert!(report.checks_shown > 0);
    }

    #[test]
    fn bounded_variant_completes_with_responses_in_window() {
        let profile = ObserverProfile {
            accuracy: 1.0,
            ..ObserverProfile::default()
        };
        let report =
            run_headless(ExperimentConfig::bounded_emoji(), "sim", 3, &profile, None).unwrap();
        assert_eq!(report.trials_logged, 30);
        assert_eq!(report.checks_shown, 0);
        // Max latency 420 + 120 + 60 ms sits well inside the 1.5 s window.
        assert_eq!(report.accuracy, 1.0);
        let rt = report.mean_rt_seconds.unwrap();
        assert!(rt > 0.4 && rt < 0.7, "mean rt {rt}");
    }

    #[test]
    fn prompted_variant_measures_rt_from_question_screen() {
        let profile = ObserverProfile {
            accuracy: 1.0,
            ..ObserverProfile::default()
        };
        let report =
            run_headless(ExperimentConfig::prompted_emoji(), "sim", 5, &profile, None).unwrap();
        assert_eq!(report.trials_logged, 30);
        assert_eq!(report.checks_shown, 0);
        assert_eq!(report.accuracy, 1.0);
        // The observer re-plans at the question screen, so the mean sits in
        // the same band as its raw latency rather than stimulus + latency.
        let rt = report.mean_rt_seconds.unwrap();
        assert!(rt > 0.4 && rt < 0.7, "mean rt {rt}");
    }

    #[test]
    fn injected_penalty_appears_as_flanker_effect() {
        let profile = ObserverProfile {
            accuracy: 1.0,
            rt_jitter_ms: 0.0,
            incongruent_penalty_ms: 200.0,
            check_hit_rate: 1.0,
            ..ObserverProfile::default()
        };
        let report =
            run_headless(ExperimentConfig::letters(), "sim", 11, &profile, None).unwrap();
        let (_, effect) = &report.flanker_effects[0];
        let effect = effect.unwrap();
        // Frame quantization smears the 200 ms penalty a little.
        assert!(effect > 0.15 && effect < 0.25, "effect {effect}");
    }

    #[test]
    fn out_path_gets_a_readable_results_file() {
        let path = std::env::temp_dir().join(format!("eriksen_sim_{}.csv", std::process::id()));
        let profile = ObserverProfile::default();
        let report = run_headless(
            ExperimentConfig::letters(),
            "sim",
            19,
            &profile,
            Some(&path),
        )
        .unwrap();

        let log = ResultsLog::read_csv(&path).unwrap();
        assert_eq!(log.len(), report.trials_logged);
        assert_eq!(log.meta.participant, "sim");
        assert_eq!(log.meta.seed, Some(19));

        std::fs::remove_file(&path).unwrap();
    }
}
