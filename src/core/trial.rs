//! Single-trial state machine.
//!
//! A `TrialRun` owns one trial from onset to logging. It never reads the
//! clock or sleeps: the frontend calls `tick` once per frame with the current
//! `Instant` and the input events seen since the last frame, and draws
//! whatever `view` says. The run reports its outcome exactly once, from the
//! tick that completes it.

use crate::prng::Prng;
use crate::schedule::Condition;
use crate::stimulus::{RenderMode, Side, StimulusSet};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How long the response window stays open after stimulus onset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ResponseWindow {
    /// Stimulus stays up until a response key arrives.
    Unbounded,
    /// Stimulus stays up for `limit_ms`; keys land only inside the window,
    /// expiry records a missing response.
    Bounded { limit_ms: u64 },
    /// Stimulus shows for `stimulus_ms` with input ignored, then an unbounded
    /// prompt collects the response. Reaction time counts from prompt onset.
    StimulusThenPrompt { stimulus_ms: u64 },
}

impl Default for ResponseWindow {
    fn default() -> Self {
        ResponseWindow::Unbounded
    }
}

/// Per-trial timing. Fixation and inter-trial blanks default to off, which
/// matches the open-response variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialTiming {
    #[serde(default)]
    pub fixation_ms: u64,
    #[serde(default)]
    pub iti_ms: u64,
    #[serde(default)]
    pub response: ResponseWindow,
}

impl Default for TrialTiming {
    fn default() -> Self {
        Self {
            fixation_ms: 0,
            iti_ms: 0,
            response: ResponseWindow::Unbounded,
        }
    }
}

/// Input relayed from the frontend. Anything a phase does not consume is
/// dropped, never queued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Left,
    Right,
    Click { x: f32, y: f32 },
    /// The continue key on instruction and summary screens.
    Advance,
}

/// What the participant did, as it lands in the results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Left,
    Right,
    Clicked,
    None,
}

impl ResponseKind {
    pub fn label(self) -> &'static str {
        match self {
            ResponseKind::Left => "left",
            ResponseKind::Right => "right",
            ResponseKind::Clicked => "clicked",
            ResponseKind::None => "none",
        }
    }

    pub fn from_label(label: &str) -> Option<ResponseKind> {
        match label {
            "left" => Some(ResponseKind::Left),
            "right" => Some(ResponseKind::Right),
            "clicked" => Some(ResponseKind::Clicked),
            "none" => Some(ResponseKind::None),
            _ => None,
        }
    }

    pub fn side(self) -> Option<Side> {
        match self {
            ResponseKind::Left => Some(Side::Left),
            ResponseKind::Right => Some(Side::Right),
            _ => None,
        }
    }
}

/// A drawn normal trial: what to show and what counts as correct.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSpec {
    pub module: String,
    pub mode: RenderMode,
    pub target: String,
    pub target_side: Side,
    pub flanker: String,
    pub condition: Condition,
}

impl TrialSpec {
    /// Draw target and flanker for `condition` from `set`.
    pub fn draw(set: &StimulusSet, condition: Condition, prng: &mut Prng) -> Self {
        let idx = prng.gen_range_usize(0, set.target_count());
        let (target, target_side) = set.target_at(idx);
        let pool = set.flanker_pool(condition.flanker_group(target_side));
        let flanker = prng.choose(pool).clone();
        Self {
            module: set.name.clone(),
            mode: set.mode,
            target: target.to_string(),
            target_side,
            flanker,
            condition,
        }
    }
}

/// Attention-check marker position and hit radius, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckSpec {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl CheckSpec {
    /// Uniform placement with a margin that keeps the marker fully visible.
    pub fn place(width: f32, height: f32, radius: f32, margin: f32, prng: &mut Prng) -> Self {
        let x = prng.gen_range_f32(margin, width - margin);
        let y = prng.gen_range_f32(margin, height - margin);
        Self { x, y, radius }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        let dx = x - self.x;
        let dy = y - self.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

#[derive(Debug, Clone)]
pub enum TrialKind {
    Normal(TrialSpec),
    Check(CheckSpec),
}

/// What the frontend should draw this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialView<'a> {
    Blank,
    Fixation,
    Stimulus(&'a TrialSpec),
    Marker(CheckSpec),
    Prompt(&'a TrialSpec),
}

/// Outcome of one finished trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    pub response: ResponseKind,
    pub correct: bool,
    pub reaction_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fixation,
    Stimulus,
    Prompt,
    Iti,
    Done,
}

#[derive(Debug)]
pub struct TrialRun {
    kind: TrialKind,
    timing: TrialTiming,
    check_window: Duration,
    phase: Phase,
    phase_start: Instant,
    response: Option<ResponseKind>,
    reaction_seconds: Option<f64>,
    reported: bool,
}

impl TrialRun {
    pub fn normal(spec: TrialSpec, timing: TrialTiming, now: Instant) -> Self {
        let phase = if timing.fixation_ms > 0 {
            Phase::Fixation
        } else {
            Phase::Stimulus
        };
        Self {
            kind: TrialKind::Normal(spec),
            timing,
            check_window: Duration::ZERO,
            phase,
            phase_start: now,
            response: None,
            reaction_seconds: None,
            reported: false,
        }
    }

    /// Checks skip fixation and the inter-trial blank: the marker goes up
    /// immediately and stays for the whole window.
    pub fn check(spot: CheckSpec, window: Duration, now: Instant) -> Self {
        Self {
            kind: TrialKind::Check(spot),
            timing: TrialTiming::default(),
            check_window: window,
            phase: Phase::Stimulus,
            phase_start: now,
            response: None,
            reaction_seconds: None,
            reported: false,
        }
    }

    pub fn kind(&self) -> &TrialKind {
        &self.kind
    }

    pub fn is_check(&self) -> bool {
        matches!(self.kind, TrialKind::Check(_))
    }

    pub fn view(&self) -> TrialView<'_> {
        match (&self.kind, self.phase) {
            (_, Phase::Iti) | (_, Phase::Done) => TrialView::Blank,
            (_, Phase::Fixation) => TrialView::Fixation,
            (TrialKind::Check(spot), _) => TrialView::Marker(*spot),
            (TrialKind::Normal(spec), Phase::Stimulus) => TrialView::Stimulus(spec),
            (TrialKind::Normal(spec), Phase::Prompt) => TrialView::Prompt(spec),
        }
    }

    /// Advance the trial to `now`, feeding it this frame's events.
    /// Returns the outcome from the completing tick, `None` otherwise.
    pub fn tick(&mut self, now: Instant, events: &[InputEvent]) -> Option<TrialOutcome> {
        match self.phase {
            Phase::Fixation => {
                if self.elapsed(now) >= Duration::from_millis(self.timing.fixation_ms) {
                    self.enter(Phase::Stimulus, now);
                }
                None
            }
            Phase::Stimulus => match &self.kind {
                TrialKind::Check(spot) => {
                    let spot = *spot;
                    self.tick_check(spot, now, events)
                }
                TrialKind::Normal(_) => self.tick_stimulus(now, events),
            },
            Phase::Prompt => {
                if let Some((kind, rt)) = self.first_key(now, events) {
                    self.response = Some(kind);
                    self.reaction_seconds = Some(rt);
                    self.leave_response_phase(now)
                } else {
                    None
                }
            }
            Phase::Iti => {
                if self.elapsed(now) >= Duration::from_millis(self.timing.iti_ms) {
                    self.finish(now)
                } else {
                    None
                }
            }
            Phase::Done => None,
        }
    }

    fn tick_check(
        &mut self,
        spot: CheckSpec,
        now: Instant,
        events: &[InputEvent],
    ) -> Option<TrialOutcome> {
        // Expiry wins ties: a click landing at or after the deadline misses.
        if self.elapsed(now) >= self.check_window {
            return self.finish(now);
        }
        if self.response.is_none() {
            for event in events {
                if let InputEvent::Click { x, y } = event {
                    if spot.contains(*x, *y) {
                        self.response = Some(ResponseKind::Clicked);
                        self.reaction_seconds = Some(self.elapsed(now).as_secs_f64());
                        break;
                    }
                }
            }
        }
        // The marker stays up for the full window even after a hit.
        None
    }

    fn tick_stimulus(&mut self, now: Instant, events: &[InputEvent]) -> Option<TrialOutcome> {
        match self.timing.response {
            ResponseWindow::Unbounded => {
                if let Some((kind, rt)) = self.first_key(now, events) {
                    self.response = Some(kind);
                    self.reaction_seconds = Some(rt);
                    self.leave_response_phase(now)
                } else {
                    None
                }
            }
            ResponseWindow::Bounded { limit_ms } => {
                if self.elapsed(now) >= Duration::from_millis(limit_ms) {
                    return self.leave_response_phase(now);
                }
                if self.response.is_none() {
                    if let Some((kind, rt)) = self.first_key(now, events) {
                        self.response = Some(kind);
                        self.reaction_seconds = Some(rt);
                    }
                }
                // Stimulus duration is fixed; hold until the window closes.
                None
            }
            ResponseWindow::StimulusThenPrompt { stimulus_ms } => {
                if self.elapsed(now) >= Duration::from_millis(stimulus_ms) {
                    self.enter(Phase::Prompt, now);
                }
                None
            }
        }
    }

    fn first_key(&self, now: Instant, events: &[InputEvent]) -> Option<(ResponseKind, f64)> {
        for event in events {
            let kind = match event {
                InputEvent::Left => ResponseKind::Left,
                InputEvent::Right => ResponseKind::Right,
                _ => continue,
            };
            return Some((kind, self.elapsed(now).as_secs_f64()));
        }
        None
    }

    fn leave_response_phase(&mut self, now: Instant) -> Option<TrialOutcome> {
        if self.timing.iti_ms > 0 {
            self.enter(Phase::Iti, now);
            None
        } else {
            self.finish(now)
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.phase_start)
    }

    fn enter(&mut self, phase: Phase, now: Instant) {
        self.phase = phase;
        self.phase_start = now;
    }

    fn finish(&mut self, now: Instant) -> Option<TrialOutcome> {
        self.enter(Phase::Done, now);
        if self.reported {
            return None;
        }
        self.reported = true;
        let response = self.response.unwrap_or(ResponseKind::None);
        let correct = match &self.kind {
            TrialKind::Normal(spec) => response.side() == Some(spec.target_side),
            TrialKind::Check(_) => response == ResponseKind::Clicked,
        };
        Some(TrialOutcome {
            response,
            correct,
            reaction_seconds: self.reaction_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(side: Side) -> TrialSpec {
        TrialSpec {
            module: "Letter".into(),
            mode: RenderMode::Text,
            target: if side == Side::Left { "A" } else { "C" }.into(),
            target_side: side,
            flanker: "X".into(),
            condition: Condition::Neutral,
        }
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn unbounded_trial_scores_left_key_on_left_target() {
        let t0 = Instant::now();
        let mut run = TrialRun::normal(spec(Side::Left), TrialTiming::default(), t0);
        assert!(matches!(run.view(), TrialView::Stimulus(_)));
        assert!(run.tick(at(t0, 16), &[]).is_none());
        let out = run
            .tick(at(t0, 430), &[InputEvent::Left])
            .expect("key completes trial");
        assert_eq!(out.response, ResponseKind::Left);
        assert!(out.correct);
        assert!((out.reaction_seconds.unwrap() - 0.43).abs() < 1e-9);
    }

    #[test]
    fn wrong_side_is_recorded_incorrect() {
        let t0 = Instant::now();
        let mut run = TrialRun::normal(spec(Side::Right), TrialTiming::default(), t0);
        let out = run.tick(at(t0, 300), &[InputEvent::Left]).unwrap();
        assert_eq!(out.response, ResponseKind::Left);
        assert!(!out.correct);
    }

    #[test]
    fn clicks_are_ignored_during_normal_trials() {
        let t0 = Instant::now();
        let mut run = TrialRun::normal(spec(Side::Left), TrialTiming::default(), t0);
        assert!(run
            .tick(at(t0, 100), &[InputEvent::Click { x: 10.0, y: 10.0 }])
            .is_none());
        assert!(run.tick(at(t0, 200), &[InputEvent::Advance]).is_none());
        assert!(run.tick(at(t0, 300), &[InputEvent::Right]).is_some());
    }

    #[test]
    fn fixation_delays_stimulus_onset() {
        let t0 = Instant::now();
        let timing = TrialTiming {
            fixation_ms: 500,
            ..TrialTiming::default()
        };
        let mut run = TrialRun::normal(spec(Side::Left), timing, t0);
        assert_eq!(run.view(), TrialView::Fixation);
        // Keys during fixation are dropped.
        assert!(run.tick(at(t0, 200), &[InputEvent::Left]).is_none());
        assert_eq!(run.view(), TrialView::Fixation);
        assert!(run.tick(at(t0, 510), &[]).is_none());
        assert!(matches!(run.view(), TrialView::Stimulus(_)));
        // Reaction time counts from stimulus onset, not trial start.
        let out = run.tick(at(t0, 760), &[InputEvent::Left]).unwrap();
        assert!((out.reaction_seconds.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn bounded_window_expires_to_missing_response() {
        let t0 = Instant::now();
        let timing = TrialTiming {
            response: ResponseWindow::Bounded { limit_ms: 1500 },
            ..TrialTiming::default()
        };
        let mut run = TrialRun::normal(spec(Side::Left), timing, t0);
        assert!(run.tick(at(t0, 700), &[]).is_none());
        let out = run.tick(at(t0, 1500), &[]).expect("expiry completes trial");
        assert_eq!(out.response, ResponseKind::None);
        assert!(!out.correct);
        assert_eq!(out.reaction_seconds, None);
    }

    #[test]
    fn bounded_window_holds_stimulus_after_early_response() {
        let t0 = Instant::now();
        let timing = TrialTiming {
            response: ResponseWindow::Bounded { limit_ms: 1500 },
            ..TrialTiming::default()
        };
        let mut run = TrialRun::normal(spec(Side::Left), timing, t0);
        assert!(run.tick(at(t0, 600), &[InputEvent::Left]).is_none());
        assert!(matches!(run.view(), TrialView::Stimulus(_)));
        // A second key does not overwrite the first.
        assert!(run.tick(at(t0, 900), &[InputEvent::Right]).is_none());
        let out = run.tick(at(t0, 1500), &[]).unwrap();
        assert_eq!(out.response, ResponseKind::Left);
        assert!(out.correct);
        assert!((out.reaction_seconds.unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn key_on_expiry_tick_is_late() {
        let t0 = Instant::now();
        let timing = TrialTiming {
            response: ResponseWindow::Bounded { limit_ms: 1000 },
            ..TrialTiming::default()
        };
        let mut run = TrialRun::normal(spec(Side::Left), timing, t0);
        let out = run.tick(at(t0, 1000), &[InputEvent::Left]).unwrap();
        assert_eq!(out.response, ResponseKind::None);
    }

    #[test]
    fn prompt_model_ignores_keys_until_prompt() {
        let t0 = Instant::now();
        let timing = TrialTiming {
            response: ResponseWindow::StimulusThenPrompt { stimulus_ms: 1500 },
            ..TrialTiming::default()
        };
        let mut run = TrialRun::normal(spec(Side::Right), timing, t0);
        assert!(run.tick(at(t0, 400), &[InputEvent::Right]).is_none());
        assert!(matches!(run.view(), TrialView::Stimulus(_)));
        assert!(run.tick(at(t0, 1500), &[]).is_none());
        assert!(matches!(run.view(), TrialView::Prompt(_)));
        // Reaction time is measured from prompt onset.
        let out = run.tick(at(t0, 1900), &[InputEvent::Right]).unwrap();
        assert_eq!(out.response, ResponseKind::Right);
        assert!(out.correct);
        assert!((out.reaction_seconds.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn iti_holds_the_outcome_until_the_blank_ends() {
        let t0 = Instant::now();
        let timing = TrialTiming {
            iti_ms: 400,
            ..TrialTiming::default()
        };
        let mut run = TrialRun::normal(spec(Side::Left), timing, t0);
        assert!(run.tick(at(t0, 350), &[InputEvent::Left]).is_none());
        assert_eq!(run.view(), TrialView::Blank);
        assert!(run.tick(at(t0, 500), &[]).is_none());
        let out = run.tick(at(t0, 750), &[]).expect("blank over");
        assert_eq!(out.response, ResponseKind::Left);
        // Once reported, the run stays silent.
        assert!(run.tick(at(t0, 800), &[]).is_none());
    }

    #[test]
    fn check_hit_inside_radius_before_deadline() {
        let t0 = Instant::now();
        let spot = CheckSpec {
            x: 300.0,
            y: 200.0,
            radius: 15.0,
        };
        let mut run = TrialRun::check(spot, Duration::from_secs(3), t0);
        assert!(matches!(run.view(), TrialView::Marker(_)));
        // Outside the radius: ignored.
        assert!(run
            .tick(at(t0, 600), &[InputEvent::Click { x: 340.0, y: 200.0 }])
            .is_none());
        // On the rim counts as a hit.
        assert!(run
            .tick(at(t0, 900), &[InputEvent::Click { x: 315.0, y: 200.0 }])
            .is_none());
        // The marker holds for the rest of the window.
        assert!(matches!(run.view(), TrialView::Marker(_)));
        let out = run.tick(at(t0, 3000), &[]).expect("window over");
        assert_eq!(out.response, ResponseKind::Clicked);
        assert!(out.correct);
        assert!((out.reaction_seconds.unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn check_miss_records_no_click_and_no_reaction_time() {
        let t0 = Instant::now();
        let spot = CheckSpec {
            x: 300.0,
            y: 200.0,
            radius: 15.0,
        };
        let mut run = TrialRun::check(spot, Duration::from_secs(3), t0);
        assert!(run.tick(at(t0, 2000), &[InputEvent::Left]).is_none());
        let out = run
            .tick(at(t0, 3000), &[InputEvent::Click { x: 300.0, y: 200.0 }])
            .expect("deadline");
        // The click arrived with the expiry tick, so it does not count.
        assert_eq!(out.response, ResponseKind::None);
        assert!(!out.correct);
        assert_eq!(out.reaction_seconds, None);
    }

    #[test]
    fn draw_respects_condition_pools() {
        let set = StimulusSet {
            name: "Letter".into(),
            mode: RenderMode::Text,
            left: vec!["A".into(), "B".into()],
            right: vec!["C".into(), "D".into()],
            neutral: vec!["X".into()],
            flanker_left: Vec::new(),
            flanker_right: Vec::new(),
            flanker_neutral: Vec::new(),
            assets: Default::default(),
        };
        let mut prng = Prng::new(42);
        for _ in 0..200 {
            for condition in Condition::ALL {
                let spec = TrialSpec::draw(&set, condition, &mut prng);
                let target_side = set.side_of(&spec.target).expect("target mapped");
                assert_eq!(target_side, spec.target_side);
                match condition {
                    Condition::Congruent => {
                        assert_eq!(set.side_of(&spec.flanker), Some(target_side));
                    }
                    Condition::Incongruent => {
                        assert_eq!(set.side_of(&spec.flanker), Some(target_side.opposite()));
                    }
                    Condition::Neutral => assert_eq!(spec.flanker, "X"),
                }
            }
        }
    }

    #[test]
    fn marker_placement_respects_margins() {
        let mut prng = Prng::new(9);
        for _ in 0..500 {
            let spot = CheckSpec::place(1000.0, 600.0, 15.0, 100.0, &mut prng);
            assert!(spot.x >= 100.0 && spot.x <= 900.0);
            assert!(spot.y >= 100.0 && spot.y <= 500.0);
        }
    }
}
