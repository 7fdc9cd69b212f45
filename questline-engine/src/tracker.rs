//! Stateful facade tying configuration, state, storage and the clock together.
use chrono::NaiveDate;
use std::sync::Arc;

use crate::achievements::{BadgeAward, evaluate_badges};
use crate::board::{DayBoard, score_day};
use crate::campaign::{CampaignProgress, CampaignSettings, campaign_progress};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::finalize::{FinalizeOutcome, FinalizeRequest, finalize_day};
use crate::generator::{DailyQuestSet, generate_daily_quests};
use crate::grace::GraceToken;
use crate::ledger::ProgressSummary;
use crate::missions::{MissionProgress, weekly_mission_progress};
use crate::scoring::CompletionInput;
use crate::store::{ProgressState, ProgressStore};

/// Single-subject progress tracker. Mutations take `&mut self`.
#[derive(Debug)]
pub struct Tracker<S, C> {
    config: Arc<EngineConfig>,
    state: ProgressState,
    store: S,
    clock: C,
}

impl<S, C> Tracker<S, C>
where
    S: ProgressStore,
    C: Clock,
{
    /// Open a tracker over the state already held by `store`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the state cannot be loaded.
    pub fn open(config: Arc<EngineConfig>, store: S, clock: C) -> Result<Self, EngineError> {
        let state = store
            .load()
            .map_err(|err| EngineError::storage("load", err))?;
        log::debug!(
            "opened tracker with {} entries and {} finalized days",
            state.ledger.entry_count(),
            state.finalized.len()
        );
        Ok(Self {
            config,
            state,
            store,
            clock,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> &ProgressState {
        &self.state
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    #[must_use]
    pub fn daily_quests(&self, date: NaiveDate) -> DailyQuestSet {
        generate_daily_quests(&self.config.catalog, date)
    }

    #[must_use]
    pub fn todays_quests(&self) -> DailyQuestSet {
        self.daily_quests(self.today())
    }

    /// `(days, last_date)` for a streak key.
    #[must_use]
    pub fn get_streak(&self, key: &str) -> (u32, Option<NaiveDate>) {
        self.state.streaks.get_streak(key)
    }

    /// Score inputs against the board for `date` without committing.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for unknown, off-board or duplicate
    /// quests and malformed values.
    pub fn score_day(
        &self,
        date: NaiveDate,
        inputs: &[CompletionInput],
        grace_keys: &[String],
    ) -> Result<DayBoard, EngineError> {
        Ok(score_day(
            &self.config.catalog,
            &self.state.streaks,
            date,
            inputs,
            grace_keys,
        )?)
    }

    /// Commit a day. Identical retries replay the stored receipt.
    ///
    /// # Errors
    ///
    /// See [`crate::finalize::FinalizeError`].
    pub fn finalize_day(&mut self, request: &FinalizeRequest) -> Result<FinalizeOutcome, EngineError> {
        let now = self.clock.now();
        Ok(finalize_day(
            self.config.skills(),
            &mut self.state,
            &self.store,
            request,
            now,
        )?)
    }

    /// Score and finalize in one step.
    ///
    /// # Errors
    ///
    /// Returns the first scoring or finalization error.
    pub fn submit_day(
        &mut self,
        date: NaiveDate,
        inputs: &[CompletionInput],
        grace_keys: &[String],
    ) -> Result<FinalizeOutcome, EngineError> {
        let request = self.score_day(date, inputs, grace_keys)?.into_request();
        self.finalize_day(&request)
    }

    /// Badge codes that would be newly awarded now. Read-only.
    #[must_use]
    pub fn evaluate_badges(&self) -> Vec<String> {
        evaluate_badges(
            &self.config.badges,
            &self.state.ledger,
            &self.state.streaks,
            &self.state.badges,
        )
    }

    /// Evaluate and persist every newly earned badge.
    ///
    /// # Errors
    ///
    /// Returns an inconsistent-state error if a code is somehow already
    /// awarded, or a storage error; nothing is awarded in either case.
    pub fn award_badges(&mut self) -> Result<Vec<BadgeAward>, EngineError> {
        let codes = self.evaluate_badges();
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        let mut staged = self.state.badges.clone();
        let mut awarded = Vec::with_capacity(codes.len());
        for code in &codes {
            awarded.push(staged.award(code, now)?);
        }
        self.store
            .record_awards(&awarded)
            .map_err(|err| EngineError::storage("record_awards", err))?;
        self.state.badges = staged;
        log::info!("awarded badges: {}", codes.join(", "));
        Ok(awarded)
    }

    #[must_use]
    pub fn weekly_missions(&self, date: NaiveDate) -> Vec<MissionProgress> {
        weekly_mission_progress(&self.config.missions, &self.state.ledger, date)
    }

    /// Grant the grace token for the week containing `date`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error when the week already has a token, or
    /// a storage error.
    pub fn grant_grace_token(&mut self, date: NaiveDate) -> Result<GraceToken, EngineError> {
        let mut staged = self.state.grace.clone();
        let token = staged.grant(date)?;
        self.store
            .upsert_grace_token(&token)
            .map_err(|err| EngineError::storage("upsert_grace_token", err))?;
        self.state.grace = staged;
        log::info!("granted grace token {} on {date}", token.id);
        Ok(token)
    }

    #[must_use]
    pub fn available_grace_tokens(&self, date: NaiveDate) -> usize {
        self.state.grace.available_count(date)
    }

    /// Replace the campaign settings.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for bad settings, or a storage error.
    pub fn configure_campaign(&mut self, settings: CampaignSettings) -> Result<(), EngineError> {
        settings.validate()?;
        self.store
            .upsert_campaign(&settings)
            .map_err(|err| EngineError::storage("upsert_campaign", err))?;
        self.state.campaign = Some(settings);
        Ok(())
    }

    /// Progress through the configured campaign, if any.
    #[must_use]
    pub fn campaign_progress(&self, date: NaiveDate) -> Option<CampaignProgress> {
        self.state
            .campaign
            .as_ref()
            .map(|settings| campaign_progress(settings, &self.state.ledger, date))
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        self.state
            .ledger
            .summary(self.config.skills(), &self.state.streaks, self.today())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn tracker() -> Tracker<MemoryStore, FixedClock> {
        let config = Arc::new(EngineConfig::load_from_static().unwrap());
        Tracker::open(config, MemoryStore::new(), FixedClock::on(date(19))).unwrap()
    }

    #[test]
    fn submit_then_award_first_badge() {
        let mut tracker = tracker();
        let outcome = tracker
            .submit_day(date(19), &[CompletionInput::done("piano")], &[])
            .unwrap();
        assert_eq!(outcome.receipt().xp_gained, 50);
        assert_eq!(tracker.evaluate_badges(), vec!["first_quest"]);
        let awarded = tracker.award_badges().unwrap();
        assert_eq!(awarded.len(), 1);
        assert!(tracker.evaluate_badges().is_empty());
        assert!(tracker.award_badges().unwrap().is_empty());
        assert!(tracker.store().snapshot().badges.contains("first_quest"));
    }

    #[test]
    fn failed_award_write_leaves_nothing_awarded() {
        let mut tracker = tracker();
        tracker
            .submit_day(date(19), &[CompletionInput::done("piano")], &[])
            .unwrap();
        tracker.store().fail_next_awards();
        let err = tracker.award_badges().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(tracker.state().badges.is_empty());
        assert_eq!(tracker.award_badges().unwrap().len(), 1);
    }

    #[test]
    fn grace_tokens_and_campaign_persist() {
        let mut tracker = tracker();
        tracker.grant_grace_token(date(19)).unwrap();
        let again = tracker.grant_grace_token(date(21)).unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidInput);
        assert_eq!(tracker.available_grace_tokens(date(21)), 1);

        let bad = CampaignSettings::new(date(1), 0);
        assert_eq!(
            tracker.configure_campaign(bad).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert!(tracker.campaign_progress(date(19)).is_none());
        tracker
            .configure_campaign(CampaignSettings::new(date(1), 30))
            .unwrap();
        let progress = tracker.campaign_progress(date(19)).unwrap();
        assert_eq!(progress.day_number, Some(19));
        assert_eq!(tracker.store().snapshot().grace.iter().count(), 1);
        assert!(tracker.store().snapshot().campaign.is_some());
    }

    #[test]
    fn reopening_restores_state() {
        let mut tracker = tracker();
        tracker
            .submit_day(date(19), &[CompletionInput::done("study")], &[])
            .unwrap();
        let store = tracker.store().clone();
        let config = Arc::new(tracker.config().clone());
        let reopened = Tracker::open(config, store, FixedClock::on(date(20))).unwrap();
        assert_eq!(reopened.state(), tracker.state());
        assert_eq!(reopened.get_streak("study_daily"), (1, Some(date(19))));
        assert_eq!(reopened.todays_quests().date, date(20));
        assert!(reopened.store().snapshot().is_finalized(date(19)));

        let seeded = MemoryStore::with_state(tracker.state().clone());
        let config = Arc::new(tracker.config().clone());
        let restored = Tracker::open(config, seeded, FixedClock::on(date(20))).unwrap();
        assert_eq!(restored.state(), tracker.state());
    }
}
