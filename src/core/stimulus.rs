//! Stimulus sets: the named pools a module draws targets and flankers from.
//!
//! A module maps every stimulus key to exactly one of three groups. The
//! left/right groups carry the response mapping; the neutral group only ever
//! appears as flankers. Mixed-mode modules render image targets between text
//! flankers and therefore carry a second triple of flanker letters.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response side a stimulus is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Which pool a flanker is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Side(Side),
    Neutral,
}

/// How a module's stimuli are put on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Target and flankers are drawn as one text line.
    Text,
    /// Target and flankers are images.
    Image,
    /// Image target between text flanker letters.
    Mixed,
}

/// One module's stimulus pools plus rendering info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusSet {
    pub name: String,
    pub mode: RenderMode,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub neutral: Vec<String>,
    /// Mixed mode only: flanker letters, grouped the same way as targets.
    #[serde(default)]
    pub flanker_left: Vec<String>,
    #[serde(default)]
    pub flanker_right: Vec<String>,
    #[serde(default)]
    pub flanker_neutral: Vec<String>,
    /// Image and mixed modes: stimulus key to image file path.
    #[serde(default)]
    pub assets: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum StimulusSetError {
    #[error("module `{module}`: {group} group is empty")]
    EmptyGroup { module: String, group: &'static str },
    #[error("module `{module}`: `{key}` appears in more than one group")]
    OverlappingGroups { module: String, key: String },
    #[error("module `{module}`: no image asset mapped for `{key}`")]
    MissingAsset { module: String, key: String },
    #[error("module `{module}`: mixed mode needs {group} flanker letters")]
    MissingFlankerGroup { module: String, group: &'static str },
}

impl StimulusSet {
    /// The side a target key responds to, or `None` for unknown/neutral keys.
    pub fn side_of(&self, key: &str) -> Option<Side> {
        if self.left.iter().any(|k| k == key) {
            Some(Side::Left)
        } else if self.right.iter().any(|k| k == key) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn group(&self, group: Group) -> &[String] {
        match group {
            Group::Side(Side::Left) => &self.left,
            Group::Side(Side::Right) => &self.right,
            Group::Neutral => &self.neutral,
        }
    }

    /// The pool flankers are drawn from. Mixed modules flank image targets
    /// with letters, so they use the secondary triple.
    pub fn flanker_pool(&self, group: Group) -> &[String] {
        if self.mode == RenderMode::Mixed {
            match group {
                Group::Side(Side::Left) => &self.flanker_left,
                Group::Side(Side::Right) => &self.flanker_right,
                Group::Neutral => &self.flanker_neutral,
            }
        } else {
            self.group(group)
        }
    }

    /// Number of drawable targets (left + right pools).
    pub fn target_count(&self) -> usize {
        self.left.len() + self.right.len()
    }

    /// Target key by flat index over left then right pools.
    pub fn target_at(&self, index: usize) -> (&str, Side) {
        if index < self.left.len() {
            (&self.left[index], Side::Left)
        } else {
            (&self.right[index - self.left.len()], Side::Right)
        }
    }

    /// Keys that must resolve to an image asset for this set to render.
    pub fn image_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        match self.mode {
            RenderMode::Text => {}
            RenderMode::Image => {
                for pool in [&self.left, &self.right, &self.neutral] {
                    keys.extend(pool.iter().map(String::as_str));
                }
            }
            // Mixed flankers are text; only targets need images.
            RenderMode::Mixed => {
                for pool in [&self.left, &self.right] {
                    keys.extend(pool.iter().map(String::as_str));
                }
            }
        }
        keys
    }

    pub fn validate(&self) -> Result<(), StimulusSetError> {
        let groups: [(&'static str, &Vec<String>); 3] = [
            ("left", &self.left),
            ("right", &self.right),
            ("neutral", &self.neutral),
        ];
        for (label, pool) in &groups {
            if pool.is_empty() {
                return Err(StimulusSetError::EmptyGroup {
                    module: self.name.clone(),
                    group: label,
                });
            }
        }
        // Every key belongs to exactly one group.
        for (i, (_, pool)) in groups.iter().enumerate() {
            for key in pool.iter() {
                for (_, other) in &groups[i + 1..] {
                    if other.iter().any(|k| k == key) {
                        return Err(StimulusSetError::OverlappingGroups {
                            module: self.name.clone(),
                            key: key.clone(),
                        });
                    }
                }
            }
        }
        if self.mode == RenderMode::Mixed {
            let triples: [(&'static str, &Vec<String>); 3] = [
                ("left", &self.flanker_left),
                ("right", &self.flanker_right),
                ("neutral", &self.flanker_neutral),
            ];
            for (label, pool) in triples {
                if pool.is_empty() {
                    return Err(StimulusSetError::MissingFlankerGroup {
                        module: self.name.clone(),
                        group: label,
                    });
                }
            }
        }
        for key in self.image_keys() {
            if !self.assets.contains_key(key) {
                return Err(StimulusSetError::MissingAsset {
                    module: self.name.clone(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters() -> StimulusSet {
        StimulusSet {
            name: "Letter".into(),
            mode: RenderMode::Text,
            left: vec!["A".into(), "B".into()],
            right: vec!["C".into(), "D".into()],
            neutral: vec!["X".into(), "Y".into()],
            flanker_left: Vec::new(),
            flanker_right: Vec::new(),
            flanker_neutral: Vec::new(),
            assets: HashMap::new(),
        }
    }

    #[test]
    fn side_lookup_covers_both_pools() {
        let set = letters();
        assert_eq!(set.side_of("A"), Some(Side::Left));
        assert_eq!(set.side_of("D"), Some(Side::Right));
        assert_eq!(set.side_of("X"), None);
        assert_eq!(set.side_of("nope"), None);
    }

    #[test]
    fn target_indexing_spans_left_then_right() {
        let set = letters();
        assert_eq!(set.target_count(), 4);
        assert_eq!(set.target_at(0), ("A", Side::Left));
        assert_eq!(set.target_at(3), ("D", Side::Right));
    }

    #[test]
    fn validate_rejects_key_in_two_groups() {
        let mut set = letters();
        set.neutral.push("A".into());
        assert!(matches!(
            set.validate(),
            Err(StimulusSetError::OverlappingGroups { .. })
        ));
    }

    #[test]
    fn validate_rejects_empty_group() {
        let mut set = letters();
        set.neutral.clear();
        assert!(matches!(
            set.validate(),
            Err(StimulusSetError::EmptyGroup { group: "neutral", .. })
        ));
    }

    #[test]
    fn image_mode_requires_assets_for_every_key() {
        let mut set = letters();
        set.mode = RenderMode::Image;
        assert!(matches!(
            set.validate(),
            Err(StimulusSetError::MissingAsset { .. })
        ));
        for key in ["A", "B", "C", "D", "X", "Y"] {
            set.assets.insert(key.into(), format!("img/{key}.png"));
        }
        assert!(set.validate().is_ok());
    }

    #[test]
    fn mixed_mode_flanks_from_secondary_triple() {
        let mut set = letters();
        set.mode = RenderMode::Mixed;
        set.flanker_left = vec!["H".into()];
        set.flanker_right = vec!["S".into()];
        set.flanker_neutral = vec!["X".into()];
        for key in ["A", "B", "C", "D"] {
            set.assets.insert(key.into(), format!("img/{key}.png"));
        }
        assert!(set.validate().is_ok());
        assert_eq!(set.flanker_pool(Group::Side(Side::Left)), ["H".to_string()]);
        assert_eq!(set.flanker_pool(Group::Neutral), ["X".to_string()]);
        // The neutral image pool never renders in mixed mode, so no asset needed.
        assert!(!set.image_keys().contains(&"X"));
    }
}
