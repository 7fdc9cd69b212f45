//! Atomic, idempotent end-of-day commit.
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::constants::{DAILY_MISS_PENALTY_CODE, DAILY_MISS_PENALTY_NOTE};
use crate::grace::GraceError;
use crate::ledger::{ActivityEntry, LedgerError, PenaltyEntry};
use crate::scoring::{Intensity, ScoredCompletion};
use crate::skills::SkillCatalog;
use crate::store::{DayCommit, ProgressState, ProgressStore};
use crate::streaks::{StreakError, StreakOutcome, StreakUpdate};

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("{date} was already finalized with different input")]
    AlreadyFinalized { date: NaiveDate },
    #[error("pending penalty must not be negative (got {amount})")]
    NegativePenalty { amount: i64 },
    #[error("gain for `{quest}` must not be negative (got {gain})")]
    NegativeGain { quest: String, gain: i64 },
    #[error("`{quest}` references unknown skill `{skill}`")]
    UnknownSkill { quest: String, skill: String },
    #[error(transparent)]
    Grace(#[from] GraceError),
    #[error(transparent)]
    Streak(#[from] StreakError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("storage failed while finalizing {date} (rolled back: {rolled_back})")]
    Storage {
        date: NaiveDate,
        rolled_back: bool,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// One completed quest with its precomputed gain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedItem {
    pub quest_id: String,
    pub label: String,
    pub skill: String,
    pub streak_key: String,
    pub minutes: u32,
    pub intensity: Intensity,
    pub gain: i64,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
}

impl From<ScoredCompletion> for CompletedItem {
    fn from(scored: ScoredCompletion) -> Self {
        Self {
            gain: scored.gain(),
            quest_id: scored.quest_id,
            label: scored.label,
            skill: scored.skill,
            streak_key: scored.streak_key,
            minutes: scored.minutes,
            intensity: scored.intensity,
            completed_at: scored.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub date: NaiveDate,
    pub items: Vec<CompletedItem>,
    pub pending_penalty: i64,
    /// Streak keys the caller wants protected by a grace token.
    #[serde(default)]
    pub grace_keys: Vec<String>,
}

impl FinalizeRequest {
    #[must_use]
    pub const fn new(date: NaiveDate, items: Vec<CompletedItem>, pending_penalty: i64) -> Self {
        Self {
            date,
            items,
            pending_penalty,
            grace_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_grace(mut self, key: impl Into<String>) -> Self {
        self.grace_keys.push(key.into());
        self
    }

    #[must_use]
    pub fn total_gain(&self) -> i64 {
        self.items.iter().map(|item| item.gain).sum()
    }

    /// Distinct streak keys in first-seen order.
    #[must_use]
    pub fn streak_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for item in &self.items {
            if !keys.contains(&item.streak_key.as_str()) {
                keys.push(&item.streak_key);
            }
        }
        keys
    }

    /// Stable hash of the request content. Completion timestamps are left
    /// out so a retry stamped later still counts as the same request.
    /// Every string and list is length-prefixed so field boundaries are part
    /// of the hash.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        write_field(&mut hasher, &self.date.to_string());
        hasher.write_u64(len_u64(self.items.len()));
        for item in &self.items {
            write_field(&mut hasher, &item.quest_id);
            write_field(&mut hasher, &item.label);
            write_field(&mut hasher, &item.skill);
            write_field(&mut hasher, &item.streak_key);
            hasher.write_u32(item.minutes);
            write_field(&mut hasher, item.intensity.key());
            hasher.write_i64(item.gain);
        }
        hasher.write_i64(self.pending_penalty);
        let mut grace: Vec<&str> = self.grace_keys.iter().map(String::as_str).collect();
        grace.sort_unstable();
        grace.dedup();
        hasher.write_u64(len_u64(grace.len()));
        for key in grace {
            write_field(&mut hasher, key);
        }
        hasher.finish()
    }
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

fn write_field(hasher: &mut XxHash64, value: &str) {
    hasher.write_u64(len_u64(value.len()));
    hasher.write(value.as_bytes());
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakResult {
    pub key: String,
    pub days: u32,
    pub outcome: StreakOutcome,
}

/// What a finalized day wrote. Stored per date for replay detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReceipt {
    pub date: NaiveDate,
    pub fingerprint: u64,
    pub entries: usize,
    pub xp_gained: i64,
    pub penalty: i64,
    pub streaks: Vec<StreakResult>,
    #[serde(default)]
    pub grace_used: Vec<u32>,
    pub finalized_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Committed(DayReceipt),
    /// The same request was already committed; nothing was written.
    Replayed(DayReceipt),
}

impl FinalizeOutcome {
    #[must_use]
    pub const fn receipt(&self) -> &DayReceipt {
        match self {
            Self::Committed(receipt) | Self::Replayed(receipt) => receipt,
        }
    }

    #[must_use]
    pub const fn is_replay(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }
}

/// Compute every write for `request` against `state` without touching it.
///
/// # Errors
///
/// Returns [`FinalizeError`] for invalid requests, unusable grace tokens and
/// out-of-order streak updates.
pub fn stage_day(
    skills: &SkillCatalog,
    state: &ProgressState,
    request: &FinalizeRequest,
    now: NaiveDateTime,
) -> Result<DayCommit, FinalizeError> {
    let date = request.date;
    if request.pending_penalty < 0 {
        return Err(FinalizeError::NegativePenalty {
            amount: request.pending_penalty,
        });
    }

    let mut entries = Vec::with_capacity(request.items.len());
    for item in &request.items {
        if item.gain < 0 {
            return Err(FinalizeError::NegativeGain {
                quest: item.quest_id.clone(),
                gain: item.gain,
            });
        }
        let category =
            skills
                .category_of(&item.skill)
                .ok_or_else(|| FinalizeError::UnknownSkill {
                    quest: item.quest_id.clone(),
                    skill: item.skill.clone(),
                })?;
        entries.push(ActivityEntry {
            day: date,
            skill: item.skill.clone(),
            category,
            quest_id: item.quest_id.clone(),
            label: item.label.clone(),
            completed_at: item.completed_at.unwrap_or(now),
            minutes: item.minutes,
            intensity: item.intensity,
            gain: item.gain,
        });
    }

    let penalty = (request.pending_penalty > 0).then(|| PenaltyEntry {
        date,
        code: DAILY_MISS_PENALTY_CODE.to_string(),
        amount: request.pending_penalty,
        note: DAILY_MISS_PENALTY_NOTE.to_string(),
    });

    let mut grace = state.grace.clone();
    let mut grace_used = Vec::new();
    let mut streaks: Vec<StreakUpdate> = Vec::new();
    let touched = request.streak_keys();
    for key in &request.grace_keys {
        if !touched.contains(&key.as_str()) {
            log::debug!("{date}: grace requested for {key} but no completion touches it");
        }
    }
    for key in touched {
        let wanted = request.grace_keys.iter().any(|wanted| wanted == key);
        let protect = wanted && state.streaks.bridgeable(key, date);
        if protect {
            grace_used.push(grace.consume(date, key, Some("missed day"))?);
        } else if wanted {
            log::debug!("{date}: {key} has no single missed day to bridge; grace not spent");
        }
        streaks.push(state.streaks.preview(key, date, protect)?);
    }

    let receipt = DayReceipt {
        date,
        fingerprint: request.fingerprint(),
        entries: entries.len(),
        xp_gained: request.total_gain(),
        penalty: request.pending_penalty,
        streaks: streaks
            .iter()
            .map(|update| StreakResult {
                key: update.key.clone(),
                days: update.days(),
                outcome: update.outcome,
            })
            .collect(),
        grace_used: grace_used.iter().map(|token| token.id).collect(),
        finalized_at: now,
    };

    Ok(DayCommit {
        date,
        entries,
        penalty,
        streaks,
        grace_used,
        receipt,
    })
}

/// Finalize one day against `state` and `store`.
///
/// An identical request for an already finalized date replays the stored
/// receipt. On a store failure the store is asked to revert, `state` is left
/// untouched and the request may be retried.
///
/// # Errors
///
/// Returns [`FinalizeError`]; `Storage` when the store rejected the commit.
pub fn finalize_day<S: ProgressStore>(
    skills: &SkillCatalog,
    state: &mut ProgressState,
    store: &S,
    request: &FinalizeRequest,
    now: NaiveDateTime,
) -> Result<FinalizeOutcome, FinalizeError> {
    let date = request.date;
    if let Some(receipt) = state.finalized.get(&date) {
        if receipt.fingerprint == request.fingerprint() {
            log::debug!("{date} already finalized; replaying receipt");
            return Ok(FinalizeOutcome::Replayed(receipt.clone()));
        }
        return Err(FinalizeError::AlreadyFinalized { date });
    }

    let commit = stage_day(skills, state, request, now)?;
    let mut staged = state.clone();
    staged.apply_commit(&commit)?;

    if let Err(err) = store.commit_day(&commit) {
        log::warn!("commit for {date} failed: {err}; reverting");
        let rolled_back = match store.revert_day(&commit) {
            Ok(()) => true,
            Err(revert_err) => {
                log::error!("revert for {date} failed: {revert_err}");
                false
            }
        };
        return Err(FinalizeError::Storage {
            date,
            rolled_back,
            source: Box::new(err),
        });
    }

    *state = staged;
    log::info!(
        "finalized {date}: {} entries, +{} XP, -{} penalty",
        commit.receipt.entries,
        commit.receipt.xp_gained,
        commit.receipt.penalty
    );
    Ok(FinalizeOutcome::Committed(commit.receipt))
}
