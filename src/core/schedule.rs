//! Condition scheduling for trial blocks.
//!
//! Main blocks are balanced: every condition gets at least `floor(n / 3)`
//! slots, the remainder is drawn uniformly without replacement, and the whole
//! sequence is shuffled. Practice blocks are plain uniform draws.

use crate::prng::Prng;
use crate::stimulus::{Group, Side};
use serde::{Deserialize, Serialize};

/// Congruency of flankers relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Congruent,
    Incongruent,
    Neutral,
}

impl Condition {
    pub const ALL: [Condition; 3] = [
        Condition::Congruent,
        Condition::Incongruent,
        Condition::Neutral,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Condition::Congruent => "congruent",
            Condition::Incongruent => "incongruent",
            Condition::Neutral => "neutral",
        }
    }

    /// Position in `ALL`, for fixed-size per-condition tables.
    pub fn index(self) -> usize {
        match self {
            Condition::Congruent => 0,
            Condition::Incongruent => 1,
            Condition::Neutral => 2,
        }
    }

    pub fn from_label(label: &str) -> Option<Condition> {
        match label {
            "congruent" => Some(Condition::Congruent),
            "incongruent" => Some(Condition::Incongruent),
            "neutral" => Some(Condition::Neutral),
            _ => None,
        }
    }

    /// The pool flankers come from when the target maps to `target_side`.
    pub fn flanker_group(self, target_side: Side) -> Group {
        match self {
            Condition::Congruent => Group::Side(target_side),
            Condition::Incongruent => Group::Side(target_side.opposite()),
            Condition::Neutral => Group::Neutral,
        }
    }
}

/// Balanced condition sequence for a main block of `n` trials.
pub fn balanced_block(n: usize, prng: &mut Prng) -> Vec<Condition> {
    let quota = n / 3;
    let mut block = Vec::with_capacity(n);
    for cond in Condition::ALL {
        for _ in 0..quota {
            block.push(cond);
        }
    }
    // Remainder: distinct conditions, drawn without replacement.
    let mut rest = Condition::ALL.to_vec();
    prng.shuffle(&mut rest);
    block.extend(rest.into_iter().take(n - block.len()));
    prng.shuffle(&mut block);
    block
}

/// Unconstrained practice sequence: one uniform draw per trial.
pub fn practice_block(n: usize, prng: &mut Prng) -> Vec<Condition> {
    (0..n).map(|_| *prng.choose(&Condition::ALL)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(block: &[Condition]) -> [usize; 3] {
        let mut out = [0usize; 3];
        for cond in block {
            match cond {
                Condition::Congruent => out[0] += 1,
                Condition::Incongruent => out[1] += 1,
                Condition::Neutral => out[2] += 1,
            }
        }
        out
    }

    #[test]
    fn balanced_block_meets_quota_for_divisible_n() {
        let mut prng = Prng::new(7);
        let block = balanced_block(30, &mut prng);
        assert_eq!(block.len(), 30);
        assert_eq!(counts(&block), [10, 10, 10]);
    }

    #[test]
    fn balanced_block_spreads_remainder_over_distinct_conditions() {
        for n in [31usize, 32] {
            for seed in 1..50u64 {
                let mut prng = Prng::new(seed);
                let block = balanced_block(n, &mut prng);
                assert_eq!(block.len(), n);
                let c = counts(&block);
                let quota = n / 3;
                for count in c {
                    assert!(count >= quota, "n={n} seed={seed}: {c:?}");
                    assert!(count <= quota + 1, "n={n} seed={seed}: {c:?}");
                }
            }
        }
    }

    #[test]
    fn balanced_block_handles_tiny_n() {
        let mut prng = Prng::new(3);
        assert_eq!(balanced_block(0, &mut prng).len(), 0);
        let two = balanced_block(2, &mut prng);
        assert_eq!(two.len(), 2);
        // Remainder draws are without replacement.
        assert_ne!(two[0], two[1]);
    }

    #[test]
    fn same_seed_reproduces_the_sequence() {
        let a = balanced_block(30, &mut Prng::new(99));
        let b = balanced_block(30, &mut Prng::new(99));
        assert_eq!(a, b);
        let c = balanced_block(30, &mut Prng::new(100));
        assert_ne!(a, c);
    }

    #[test]
    fn practice_block_is_uniform_draws_not_quota() {
        let mut prng = Prng::new(11);
        let block = practice_block(6, &mut prng);
        assert_eq!(block.len(), 6);
        let again = practice_block(6, &mut Prng::new(11));
        assert_eq!(block, again);
    }

    #[test]
    fn flanker_group_follows_condition() {
        assert_eq!(
            Condition::Congruent.flanker_group(Side::Left),
            Group::Side(Side::Left)
        );
        assert_eq!(
            Condition::Incongruent.flanker_group(Side::Left),
            Group::Side(Side::Right)
        );
        assert_eq!(Condition::Neutral.flanker_group(Side::Right), Group::Neutral);
    }

    #[test]
    fn condition_labels_round_trip() {
        for cond in Condition::ALL {
            assert_eq!(Condition::from_label(cond.label()), Some(cond));
        }
        assert_eq!(Condition::from_label("sideways"), None);
    }
}
