//! One-way badges derived from the ledger and streaks.
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::{Ledger, level_for_xp};
use crate::numbers::usize_to_u32;
use crate::skills::SkillCategory;
use crate::streaks::StreakTracker;

pub(crate) const DEFAULT_BADGES_DATA: &str = include_str!("../data/badges.json");

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AwardError {
    #[error("badge `{code}` is already awarded")]
    AlreadyAwarded { code: String },
}

/// Monotonic unlock predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeRule {
    FirstEntry,
    BestStreak { days: u32 },
    CategoryXp { category: SkillCategory, xp: i64 },
    /// Level reached on lifetime XP; penalties never take it back.
    Level { level: u32 },
    EntryCount { count: u32 },
    ActiveDays { days: u32 },
}

impl BadgeRule {
    #[must_use]
    pub fn is_met(&self, ledger: &Ledger, streaks: &StreakTracker) -> bool {
        match self {
            Self::FirstEntry => ledger.entry_count() > 0,
            Self::BestStreak { days } => streaks.best_overall() >= *days,
            Self::CategoryXp { category, xp } => ledger.category_xp(*category) >= *xp,
            Self::Level { level } => level_for_xp(ledger.total_xp()) >= *level,
            Self::EntryCount { count } => usize_to_u32(ledger.entry_count()) >= *count,
            Self::ActiveDays { days } => usize_to_u32(ledger.active_days().len()) >= *days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub code: String,
    pub name: String,
    pub description: String,
    pub rule: BadgeRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BadgeCatalog {
    pub badges: Vec<Badge>,
}

impl BadgeCatalog {
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a badge catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// # Errors
    ///
    /// Returns an error if the bundled JSON is malformed.
    pub fn load_from_static() -> Result<Self, serde_json::Error> {
        Self::from_json(DEFAULT_BADGES_DATA)
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Badge> {
        self.badges.iter().find(|badge| badge.code == code)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Badge> {
        self.badges.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateId`] for repeated codes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut codes = HashSet::new();
        for badge in &self.badges {
            if !codes.insert(badge.code.as_str()) {
                return Err(ConfigError::DuplicateId {
                    kind: "badge",
                    id: badge.code.clone(),
                });
            }
            if let BadgeRule::CategoryXp { xp, .. } = badge.rule
                && xp < 0
            {
                return Err(ConfigError::MinViolation {
                    field: format!("{}.xp", badge.code),
                    min: 0,
                    value: xp,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeAward {
    pub code: String,
    pub awarded_at: NaiveDateTime,
}

/// Badges earned so far, in award order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct BadgeAwards {
    awards: Vec<BadgeAward>,
}

impl BadgeAwards {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.awards.iter().any(|award| award.code == code)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BadgeAward> {
        self.awards.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.awards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.awards.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`AwardError::AlreadyAwarded`] when the code is present.
    pub fn award(&mut self, code: &str, awarded_at: NaiveDateTime) -> Result<BadgeAward, AwardError> {
        if self.contains(code) {
            return Err(AwardError::AlreadyAwarded {
                code: code.to_string(),
            });
        }
        let award = BadgeAward {
            code: code.to_string(),
            awarded_at,
        };
        self.awards.push(award.clone());
        Ok(award)
    }
}

/// Codes whose predicate holds and that have not been awarded yet.
///
/// Read-only; repeated calls with unchanged inputs return the same codes.
#[must_use]
pub fn evaluate_badges(
    catalog: &BadgeCatalog,
    ledger: &Ledger,
    streaks: &StreakTracker,
    awards: &BadgeAwards,
) -> Vec<String> {
    catalog
        .iter()
        .filter(|badge| !awards.contains(&badge.code))
        .filter(|badge| badge.rule.is_met(ledger, streaks))
        .map(|badge| badge.code.clone())
        .collect()
}
