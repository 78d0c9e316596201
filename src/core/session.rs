//! Session orchestration.
//!
//! `SessionRunner` walks one participant through the configured modules:
//! intro screen, per-module instructions, a practice block with a summary,
//! then the balanced main block. It owns the randomness, the schedule and the
//! results log; the frontend owns the clock and the input. The runner hands
//! out one `TrialRun` at a time and takes its outcome back, so every executed
//! trial produces exactly one record, in execution order.
//!
//! Attention checks are drawn per trial attempt and never consume a slot of
//! the balanced condition sequence: a check defers the pending condition to
//! the next attempt, so block balance is preserved exactly.

use crate::config::{ConfigError, ExperimentConfig};
use crate::prng::Prng;
use crate::results::{ResultsLog, SessionMeta, TrialRecord};
use crate::schedule::{balanced_block, practice_block, Condition};
use crate::stats::{summarize, BlockStats, SessionSummary};
use crate::stimulus::StimulusSet;
use crate::trial::{CheckSpec, ResponseKind, TrialKind, TrialOutcome, TrialRun, TrialSpec};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Where the session currently is. Screens advance on the continue key,
/// trial stages advance as trials finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intro,
    ModuleIntro,
    Practice,
    PracticeSummary,
    Main,
    Done,
}

/// Block boundaries the frontend reacts to (flushing the results file,
/// switching screens).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    PracticeComplete,
    BlockComplete { last: bool },
}

#[derive(Debug)]
pub struct SessionRunner {
    config: ExperimentConfig,
    prng: Prng,
    order: Vec<usize>,
    position: usize,
    stage: Stage,
    log: ResultsLog,
    practice_stats: BlockStats,
    practice_checks_shown: u32,
    practice_checks_hit: u32,
    schedule: Vec<Condition>,
    served: usize,
}

impl SessionRunner {
    pub fn new(
        config: ExperimentConfig,
        participant: &str,
        age: Option<u32>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut prng = Prng::new(seed);
        let mut order: Vec<usize> = (0..config.modules.len()).collect();
        if config.shuffle_modules {
            prng.shuffle(&mut order);
        }

        let started_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());
        let meta = SessionMeta {
            participant: participant.to_string(),
            age,
            seed: Some(seed),
            started_unix,
        };

        Ok(Self {
            config,
            prng,
            order,
            position: 0,
            stage: Stage::Intro,
            log: ResultsLog::new(meta),
            practice_stats: BlockStats::new(),
            practice_checks_shown: 0,
            practice_checks_hit: 0,
            schedule: Vec::new(),
            served: 0,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn results(&self) -> &ResultsLog {
        &self.log
    }

    pub fn practice_stats(&self) -> &BlockStats {
        &self.practice_stats
    }

    /// Attention checks shown and hit during the latest practice block.
    /// Practice checks feed the summary screen only and are never logged.
    pub fn practice_checks(&self) -> (u32, u32) {
        (self.practice_checks_shown, self.practice_checks_hit)
    }

    pub fn summary(&self) -> SessionSummary {
        summarize(self.log.records())
    }

    /// The module on deck, `None` once the session is over.
    pub fn current_module(&self) -> Option<&StimulusSet> {
        self.order
            .get(self.position)
            .map(|&idx| &self.config.modules[idx])
    }

    /// Completed and total trials of the active block, for progress displays.
    pub fn progress(&self) -> (usize, usize) {
        match self.stage {
            Stage::Practice | Stage::Main => (self.served, self.schedule.len()),
            _ => (0, 0),
        }
    }

    /// Continue past an instruction or summary screen.
    pub fn advance(&mut self) {
        match self.stage {
            Stage::Intro => self.stage = Stage::ModuleIntro,
            Stage::ModuleIntro => {
                if self.config.practice_trials > 0 {
                    self.practice_stats = BlockStats::new();
                    self.practice_checks_shown = 0;
                    self.practice_checks_hit = 0;
                    self.schedule = practice_block(self.config.practice_trials, &mut self.prng);
                    self.served = 0;
                    self.stage = Stage::Practice;
                } else {
                    self.enter_main();
                }
            }
            Stage::PracticeSummary => self.enter_main(),
            // Trial stages advance through finish_trial, Done is terminal.
            Stage::Practice | Stage::Main | Stage::Done => {}
        }
    }

    fn enter_main(&mut self) {
        self.schedule = balanced_block(self.config.main_trials, &mut self.prng);
        self.served = 0;
        self.stage = Stage::Main;
    }

    /// Begin the next trial of the active block. Draws the attention-check
    /// substitution first; a check leaves the pending condition in place.
    pub fn start_trial(&mut self, now: Instant) -> Option<TrialRun> {
        if self.stage != Stage::Practice && self.stage != Stage::Main {
            return None;
        }
        let module_idx = *self.order.get(self.position)?;

        let p = self.config.attention.probability;
        if p > 0.0 && self.prng.next_f32_01() < p {
            let spot = CheckSpec::place(
                self.config.screen_width,
                self.config.screen_height,
                self.config.attention.radius,
                self.config.attention.margin,
                &mut self.prng,
            );
            let window = Duration::from_millis(self.config.attention.window_ms);
            return Some(TrialRun::check(spot, window, now));
        }

        let condition = self.schedule[self.served];
        let spec = TrialSpec::draw(&self.config.modules[module_idx], condition, &mut self.prng);
        Some(TrialRun::normal(spec, self.config.timing, now))
    }

    /// Record a finished trial and move the session along. Practice results
    /// feed the summary only; main results land in the log.
    pub fn finish_trial(&mut self, run: &TrialRun, outcome: &TrialOutcome) -> Option<SessionEvent> {
        match self.stage {
            Stage::Practice => {
                if run.is_check() {
                    self.practice_checks_shown += 1;
                    if outcome.response == ResponseKind::Clicked {
                        self.practice_checks_hit += 1;
                    }
                } else {
                    self.practice_stats
                        .record(outcome.correct, outcome.reaction_seconds);
                    self.served += 1;
                    if self.served >= self.schedule.len() {
                        self.stage = Stage::PracticeSummary;
                        return Some(SessionEvent::PracticeComplete);
                    }
                }
                None
            }
            Stage::Main => {
                let module_name = match self.current_module() {
                    Some(module) => module.name.clone(),
                    None => return None,
                };
                let record = match run.kind() {
                    TrialKind::Normal(spec) => TrialRecord::normal(spec, outcome),
                    TrialKind::Check(_) => TrialRecord::check(&module_name, outcome),
                };
                self.log.append(record);

                if !run.is_check() {
                    self.served += 1;
                    if self.served >= self.schedule.len() {
                        self.position += 1;
                        let last = self.position >= self.order.len();
                        self.stage = if last { Stage::Done } else { Stage::ModuleIntro };
                        return Some(SessionEvent::BlockComplete { last });
                    }
                }
                None
            }
            _ => None,
        }
    }

    pub fn write_results(&self, path: &Path) -> io::Result<()> {
        self.log.write_csv(path)
    }
}

/// Seed for sessions that did not pin one in the config.
pub fn seed_from_clock() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ (std::process::id() as u64).rotate_left(32)
}
