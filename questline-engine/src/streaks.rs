//! Per-key consecutive-day streaks.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::constants::GRACE_BRIDGE_MISSED_DAYS;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreakError {
    #[error("completion for `{key}` on {date} precedes the last recorded completion on {last}")]
    OutOfOrder {
        key: String,
        date: NaiveDate,
        last: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub key: String,
    pub days: u32,
    pub last_date: Option<NaiveDate>,
    /// Longest run ever reached for this key.
    #[serde(default)]
    pub best: u32,
}

impl StreakState {
    fn fresh(key: &str) -> Self {
        Self {
            key: key.to_string(),
            days: 0,
            last_date: None,
            best: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakOutcome {
    Started,
    Extended,
    /// Already counted for this date.
    Unchanged,
    Reset,
    /// Extended across a missed day covered by a grace token.
    Bridged,
}

/// Result of applying one completion to a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub key: String,
    pub outcome: StreakOutcome,
    pub before: Option<StreakState>,
    pub after: StreakState,
}

impl StreakUpdate {
    #[must_use]
    pub const fn days(&self) -> u32 {
        self.after.days
    }
}

/// Streak state for every key seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StreakTracker {
    states: BTreeMap<String, StreakState>,
}

impl StreakTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(days, last_date)`, defaulting to `(0, None)` for unknown keys.
    #[must_use]
    pub fn get_streak(&self, key: &str) -> (u32, Option<NaiveDate>) {
        self.states
            .get(key)
            .map_or((0, None), |state| (state.days, state.last_date))
    }

    #[must_use]
    pub fn state(&self, key: &str) -> Option<&StreakState> {
        self.states.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreakState> {
        self.states.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Best run ever reached across all keys.
    #[must_use]
    pub fn best_overall(&self) -> u32 {
        self.states
            .values()
            .map(|state| state.best.max(state.days))
            .max()
            .unwrap_or(0)
    }

    /// Streak days still alive on `date`: the last completion is on `date`
    /// or the day before. Stale streaks read as zero.
    #[must_use]
    pub fn active_days(&self, key: &str, date: NaiveDate) -> u32 {
        match self.gap(key, date) {
            Some(0 | 1) => self.get_streak(key).0,
            _ => 0,
        }
    }

    /// Like [`Self::active_days`] but treats a bridgeable gap as alive.
    #[must_use]
    pub fn active_days_with_grace(&self, key: &str, date: NaiveDate) -> u32 {
        if self.bridgeable(key, date) {
            self.get_streak(key).0
        } else {
            self.active_days(key, date)
        }
    }

    /// Whether a completion on `date` would reset the streak after exactly
    /// the number of missed days a grace token covers.
    #[must_use]
    pub fn bridgeable(&self, key: &str, date: NaiveDate) -> bool {
        self.gap(key, date) == Some(GRACE_BRIDGE_MISSED_DAYS + 1)
    }

    fn gap(&self, key: &str, date: NaiveDate) -> Option<i64> {
        let last = self.states.get(key)?.last_date?;
        Some((date - last).num_days())
    }

    /// Compute the update a completion would cause without applying it.
    ///
    /// # Errors
    ///
    /// Returns [`StreakError::OutOfOrder`] when `date` precedes the last
    /// recorded completion.
    pub fn preview(
        &self,
        key: &str,
        date: NaiveDate,
        grace: bool,
    ) -> Result<StreakUpdate, StreakError> {
        let before = self.states.get(key).cloned();
        let mut after = before.clone().unwrap_or_else(|| StreakState::fresh(key));

        let outcome = match after.last_date {
            None => {
                after.days = 1;
                StreakOutcome::Started
            }
            Some(last) => {
                let gap = (date - last).num_days();
                match gap {
                    _ if gap < 0 => {
                        return Err(StreakError::OutOfOrder {
                            key: key.to_string(),
                            date,
                            last,
                        });
                    }
                    0 => StreakOutcome::Unchanged,
                    1 => {
                        after.days = after.days.saturating_add(1);
                        StreakOutcome::Extended
                    }
                    _ if grace && gap == GRACE_BRIDGE_MISSED_DAYS + 1 => {
                        after.days = after.days.saturating_add(1);
                        StreakOutcome::Bridged
                    }
                    _ => {
                        after.days = 1;
                        StreakOutcome::Reset
                    }
                }
            }
        };
        after.last_date = Some(after.last_date.map_or(date, |last| last.max(date)));
        after.best = after.best.max(after.days);

        Ok(StreakUpdate {
            key: key.to_string(),
            outcome,
            before,
            after,
        })
    }

    /// Apply a completion, bridging a single missed day when `grace` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StreakError::OutOfOrder`] when `date` precedes the last
    /// recorded completion.
    pub fn apply(
        &mut self,
        key: &str,
        date: NaiveDate,
        grace: bool,
    ) -> Result<StreakUpdate, StreakError> {
        let update = self.preview(key, date, grace)?;
        self.states.insert(key.to_string(), update.after.clone());
        Ok(update)
    }

    /// Record a completion for `key` on `date` and return the new day count.
    ///
    /// # Errors
    ///
    /// Returns [`StreakError::OutOfOrder`] when `date` precedes the last
    /// recorded completion.
    pub fn update_streak(&mut self, key: &str, date: NaiveDate) -> Result<u32, StreakError> {
        self.apply(key, date, false).map(|update| update.days())
    }

    /// Restore the state an update replaced.
    pub fn restore(&mut self, update: &StreakUpdate) {
        match &update.before {
            Some(before) => {
                self.states.insert(update.key.clone(), before.clone());
            }
            None => {
                self.states.remove(&update.key);
            }
        }
    }

    /// Overwrite the state for a key, as loaded from storage.
    pub fn upsert(&mut self, state: StreakState) {
        self.states.insert(state.key.clone(), state);
    }
}
