//! Persistence collaborator and the in-memory reference store.
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::achievements::{AwardError, BadgeAward, BadgeAwards};
use crate::campaign::CampaignSettings;
use crate::finalize::DayReceipt;
use crate::grace::{GraceLedger, GraceToken};
use crate::ledger::{ActivityEntry, Ledger, LedgerError, PenaltyEntry};
use crate::streaks::{StreakTracker, StreakUpdate};

/// Everything the engine mutates, as one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgressState {
    pub ledger: Ledger,
    pub streaks: StreakTracker,
    pub badges: BadgeAwards,
    pub grace: GraceLedger,
    /// Idempotency records keyed by finalized date.
    pub finalized: BTreeMap<NaiveDate, DayReceipt>,
    #[serde(default)]
    pub campaign: Option<CampaignSettings>,
}

impl ProgressState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_finalized(&self, date: NaiveDate) -> bool {
        self.finalized.contains_key(&date)
    }

    /// Apply every write of a day commit.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the day already carries a penalty; nothing
    /// is written in that case.
    pub fn apply_commit(&mut self, commit: &DayCommit) -> Result<(), LedgerError> {
        if let Some(penalty) = &commit.penalty {
            self.ledger.append_penalty(penalty.clone())?;
        }
        for entry in &commit.entries {
            self.ledger.append_entry(entry.clone());
        }
        for update in &commit.streaks {
            self.streaks.upsert(update.after.clone());
        }
        for token in &commit.grace_used {
            self.grace.upsert(token.clone());
        }
        self.finalized.insert(commit.date, commit.receipt.clone());
        Ok(())
    }

    /// Undo a commit, fully or partially applied.
    pub fn revert_commit(&mut self, commit: &DayCommit) {
        self.ledger.remove_day(commit.date);
        for update in commit.streaks.iter().rev() {
            self.streaks.restore(update);
        }
        for token in &commit.grace_used {
            if let Err(err) = self.grace.release(token.id) {
                log::warn!("reverting {}: {err}", commit.date);
            }
        }
        self.finalized.remove(&commit.date);
    }
}

/// All writes of one finalized day, handed to the store as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCommit {
    pub date: NaiveDate,
    pub entries: Vec<ActivityEntry>,
    pub penalty: Option<PenaltyEntry>,
    pub streaks: Vec<StreakUpdate>,
    /// Tokens as they look after being spent.
    pub grace_used: Vec<GraceToken>,
    pub receipt: DayReceipt,
}

/// Durable storage used by the tracker.
///
/// Implementations that cannot write a [`DayCommit`] atomically must make
/// [`ProgressStore::revert_day`] undo any part of it that landed.
pub trait ProgressStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    fn load(&self) -> Result<ProgressState, Self::Error>;

    /// Persist one day's writes.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; some writes may have landed.
    fn commit_day(&self, commit: &DayCommit) -> Result<(), Self::Error>;

    /// Undo whatever part of `commit` was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the compensating writes fail.
    fn revert_day(&self, commit: &DayCommit) -> Result<(), Self::Error>;

    /// Persist newly earned badges.
    ///
    /// # Errors
    ///
    /// Returns an error if the awards cannot be written.
    fn record_awards(&self, awards: &[BadgeAward]) -> Result<(), Self::Error>;

    /// Insert or update a grace token by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be written.
    fn upsert_grace_token(&self, token: &GraceToken) -> Result<(), Self::Error>;

    /// Insert or update the campaign settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    fn upsert_campaign(&self, settings: &CampaignSettings) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("injected failure during {operation}")]
    Injected { operation: &'static str },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Award(#[from] AwardError),
}

/// How the next commit should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitFault {
    #[default]
    None,
    /// Fail before writing anything.
    BeforeWrite,
    /// Write the activity entries, then fail.
    AfterPartialWrite,
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: ProgressState,
    commit_fault: CommitFault,
    fail_revert: bool,
    fail_awards: bool,
    commits: usize,
}

/// In-memory store shared by clones, with one-shot fault injection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: ProgressState) -> Self {
        let store = Self::new();
        store.inner.lock().state = state;
        store
    }

    /// Copy of what is currently persisted.
    #[must_use]
    pub fn snapshot(&self) -> ProgressState {
        self.inner.lock().state.clone()
    }

    /// Successful day commits so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.inner.lock().commits
    }

    /// Make the next `commit_day` fail in the given way.
    pub fn fail_next_commit(&self, fault: CommitFault) {
        self.inner.lock().commit_fault = fault;
    }

    /// Make the next `revert_day` fail.
    pub fn fail_next_revert(&self) {
        self.inner.lock().fail_revert = true;
    }

    /// Make the next `record_awards` fail.
    pub fn fail_next_awards(&self) {
        self.inner.lock().fail_awards = true;
    }
}

impl ProgressStore for MemoryStore {
    type Error = MemoryStoreError;

    fn load(&self) -> Result<ProgressState, Self::Error> {
        Ok(self.snapshot())
    }

    fn commit_day(&self, commit: &DayCommit) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock();
        match std::mem::take(&mut inner.commit_fault) {
            CommitFault::None => {}
            CommitFault::BeforeWrite => {
                return Err(MemoryStoreError::Injected {
                    operation: "commit_day",
                });
            }
            CommitFault::AfterPartialWrite => {
                for entry in &commit.entries {
                    inner.state.ledger.append_entry(entry.clone());
                }
                return Err(MemoryStoreError::Injected {
                    operation: "commit_day",
                });
            }
        }
        let mut staged = inner.state.clone();
        staged.apply_commit(commit)?;
        inner.state = staged;
        inner.commits += 1;
        Ok(())
    }

    fn revert_day(&self, commit: &DayCommit) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock();
        if std::mem::take(&mut inner.fail_revert) {
            return Err(MemoryStoreError::Injected {
                operation: "revert_day",
            });
        }
        inner.state.revert_commit(commit);
        Ok(())
    }

    fn record_awards(&self, awards: &[BadgeAward]) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock();
        if std::mem::take(&mut inner.fail_awards) {
            return Err(MemoryStoreError::Injected {
                operation: "record_awards",
            });
        }
        let mut staged = inner.state.badges.clone();
        for award in awards {
            staged.award(&award.code, award.awarded_at)?;
        }
        inner.state.badges = staged;
        Ok(())
    }

    fn upsert_grace_token(&self, token: &GraceToken) -> Result<(), Self::Error> {
        self.inner.lock().state.grace.upsert(token.clone());
        Ok(())
    }

    fn upsert_campaign(&self, settings: &CampaignSettings) -> Result<(), Self::Error> {
        self.inner.lock().state.campaign = Some(*settings);
        Ok(())
    }
}
