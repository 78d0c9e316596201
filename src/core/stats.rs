//! Running accuracy and reaction-time aggregates.
//!
//! `BlockStats` is the per-block accumulator behind the practice summary.
//! `summarize` folds a finished record sequence into the per-module,
//! per-condition breakdown used by the report command and the simulation
//! driver.

use crate::results::TrialRecord;
use crate::schedule::Condition;
use crate::trial::ResponseKind;

#[derive(Debug, Clone)]
pub struct BlockStats {
    pub correct: u32,
    pub incorrect: u32,
    pub trials: u32,
    rt_sum: f64,
    rt_count: u32,
}

impl BlockStats {
    pub fn new() -> Self {
        Self {
            correct: 0,
            incorrect: 0,
            trials: 0,
            rt_sum: 0.0,
            rt_count: 0,
        }
    }

    pub fn record(&mut self, is_correct: bool, reaction_seconds: Option<f64>) {
        if is_correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
        self.trials += 1;

        // Mean reaction time covers correct responses only; misses and wrong
        // keys would skew it.
        if is_correct {
            if let Some(rt) = reaction_seconds {
                self.rt_sum += rt;
                self.rt_count += 1;
            }
        }
    }

    pub fn accuracy(&self) -> f32 {
        let total = self.correct + self.incorrect;
        if total == 0 {
            0.0
        } else {
            self.correct as f32 / total as f32
        }
    }

    pub fn mean_reaction_seconds(&self) -> Option<f64> {
        if self.rt_count == 0 {
            None
        } else {
            Some(self.rt_sum / self.rt_count as f64)
        }
    }
}

impl Default for BlockStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ModuleSummary {
    pub name: String,
    pub overall: BlockStats,
    /// Indexed in `Condition::ALL` order.
    pub by_condition: [BlockStats; 3],
    pub checks_shown: u32,
    pub checks_hit: u32,
}

impl ModuleSummary {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            overall: BlockStats::new(),
            by_condition: [BlockStats::new(), BlockStats::new(), BlockStats::new()],
            checks_shown: 0,
            checks_hit: 0,
        }
    }

    pub fn condition(&self, condition: Condition) -> &BlockStats {
        &self.by_condition[condition.index()]
    }

    /// Mean correct reaction time, incongruent minus congruent.
    pub fn flanker_effect_seconds(&self) -> Option<f64> {
        let congruent = self.condition(Condition::Congruent).mean_reaction_seconds()?;
        let incongruent = self
            .condition(Condition::Incongruent)
            .mean_reaction_seconds()?;
        Some(incongruent - congruent)
    }
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Normal trials across all modules. Checks are counted per module.
    pub overall: BlockStats,
    pub modules: Vec<ModuleSummary>,
}

/// Fold records into per-module summaries, preserving first-seen module order.
pub fn summarize(records: &[TrialRecord]) -> SessionSummary {
    let mut overall = BlockStats::new();
    let mut modules: Vec<ModuleSummary> = Vec::new();

    for record in records {
        let idx = match modules.iter().position(|m| m.name == record.module) {
            Some(idx) => idx,
            None => {
                modules.push(ModuleSummary::new(&record.module));
                modules.len() - 1
            }
        };
        let module = &mut modules[idx];

        if record.is_check() {
            module.checks_shown += 1;
            if record.response == ResponseKind::Clicked {
                module.checks_hit += 1;
            }
            continue;
        }

        overall.record(record.correct, record.reaction_seconds);
        module.overall.record(record.correct, record.reaction_seconds);
        if let Some(condition) = record.condition {
            module.by_condition[condition.index()].record(record.correct, record.reaction_seconds);
        }
    }

    SessionSummary { overall, modules }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::TrialRecord;
    use crate::trial::TrialOutcome;

    fn check_outcome(clicked: bool) -> TrialOutcome {
        TrialOutcome {
            response: if clicked {
                ResponseKind::Clicked
            } else {
                ResponseKind::None
            },
            correct: clicked,
            reaction_seconds: clicked.then_some(0.8),
        }
    }

    #[test]
    fn accuracy_and_mean_rt_over_correct_trials() {
        let mut stats = BlockStats::new();
        assert_eq!(stats.accuracy(), 0.0);
        assert_eq!(stats.mean_reaction_seconds(), None);
        stats.record(true, Some(0.4));
        stats.record(true, Some(0.6));
        stats.record(false, Some(9.9));
        stats.record(false, None);
        assert_eq!(stats.trials, 4);
        assert!((stats.accuracy() - 0.5).abs() < 1e-6);
        assert!((stats.mean_reaction_seconds().unwrap() - 0.5).abs() < 1e-9);
    }

    fn normal(module: &str, condition: Condition, correct: bool, rt: f64) -> TrialRecord {
        TrialRecord {
            module: module.into(),
            target: "A".into(),
            condition: Some(condition),
            flanker: Some("X".into()),
            response: if correct {
                ResponseKind::Left
            } else {
                ResponseKind::Right
            },
            correct,
            reaction_seconds: Some(rt),
        }
    }

    #[test]
    fn summarize_splits_modules_and_conditions() {
        let records = vec![
            normal("Letter", Condition::Congruent, true, 0.40),
            normal("Letter", Condition::Incongruent, true, 0.55),
            normal("Letter", Condition::Neutral, false, 0.48),
            TrialRecord::check("Letter", &check_outcome(true)),
            TrialRecord::check("Letter", &check_outcome(false)),
            normal("Shape", Condition::Congruent, true, 0.52),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.overall.trials, 4);
        assert_eq!(summary.modules.len(), 2);

        let letter = &summary.modules[0];
        assert_eq!(letter.name, "Letter");
        assert_eq!(letter.overall.trials, 3);
        assert_eq!(letter.checks_shown, 2);
        assert_eq!(letter.checks_hit, 1);
        assert_eq!(letter.condition(Condition::Congruent).trials, 1);
        let effect = letter.flanker_effect_seconds().unwrap();
        assert!((effect - 0.15).abs() < 1e-9);

        // One condition missing means no effect estimate.
        let shape = &summary.modules[1];
        assert_eq!(shape.flanker_effect_seconds(), None);
    }
}
