use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use questline_engine::{
    CampaignPhase, CampaignSettings, CommitFault, CompletionInput, EngineConfig, ErrorKind,
    FinalizeRequest, FixedClock, Intensity, MemoryStore, Tracker, level_for_xp,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a simulated user behaves day to day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Chance each required quest is checked off.
    pub completion_rate: f64,
    /// Chance each optional or rotating quest is checked off.
    pub optional_rate: f64,
    /// Chance the whole day is skipped.
    pub skip_day_rate: f64,
    pub hard_rate: f64,
    /// Claim a grace token every Monday and spend it on bridgeable streaks.
    pub use_grace: bool,
    /// Chance the store fails the first commit attempt of a day.
    pub storage_fault_rate: f64,
}

impl Persona {
    pub const STEADY: Self = Self {
        completion_rate: 1.0,
        optional_rate: 0.5,
        skip_day_rate: 0.0,
        hard_rate: 0.2,
        use_grace: false,
        storage_fault_rate: 0.0,
    };

    pub const CASUAL: Self = Self {
        completion_rate: 0.6,
        optional_rate: 0.2,
        skip_day_rate: 0.15,
        hard_rate: 0.05,
        use_grace: false,
        storage_fault_rate: 0.0,
    };

    pub const IDLE: Self = Self {
        completion_rate: 0.0,
        optional_rate: 0.0,
        skip_day_rate: 1.0,
        hard_rate: 0.0,
        use_grace: false,
        storage_fault_rate: 0.0,
    };
}

pub type Expectation = fn(&SimulationSummary) -> Result<()>;

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub persona: Persona,
    pub start: NaiveDate,
    pub days: u32,
    pub campaign_days: Option<u32>,
    pub expectations: Vec<Expectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(persona: Persona, start: NaiveDate, days: u32) -> Self {
        Self {
            persona,
            start,
            days,
            campaign_days: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_campaign(mut self, length_days: u32) -> Self {
        self.campaign_days = Some(length_days);
        self
    }

    #[must_use]
    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

/// What a simulated season produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub days: u32,
    pub active_days: usize,
    pub total_xp: i64,
    pub total_penalties: i64,
    pub net_xp: i64,
    pub level: u32,
    pub best_streak: u32,
    pub badges: Vec<String>,
    pub missions_completed: usize,
    pub grace_granted: usize,
    pub grace_used: usize,
    pub rollbacks: usize,
    pub replays: usize,
    pub campaign_phase: Option<CampaignPhase>,
    /// Consistency violations noticed while running; empty on a clean run.
    pub invariant_failures: Vec<String>,
}

pub struct SimulationSession {
    tracker: Tracker<MemoryStore, FixedClock>,
    store: MemoryStore,
    rng: ChaCha20Rng,
    plan: SimulationPlan,
    summary: SimulationSummary,
}

impl SimulationSession {
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be opened or the campaign is invalid.
    pub fn new(config: Arc<EngineConfig>, plan: SimulationPlan, seed: u64) -> Result<Self> {
        let store = MemoryStore::new();
        let mut tracker = Tracker::open(config, store.clone(), FixedClock::on(plan.start))?;
        if let Some(length) = plan.campaign_days {
            tracker.configure_campaign(CampaignSettings::new(plan.start, length))?;
        }
        Ok(Self {
            tracker,
            store,
            rng: ChaCha20Rng::seed_from_u64(seed),
            summary: SimulationSummary {
                seed,
                days: plan.days,
                active_days: 0,
                total_xp: 0,
                total_penalties: 0,
                net_xp: 0,
                level: 0,
                best_streak: 0,
                badges: Vec::new(),
                missions_completed: 0,
                grace_granted: 0,
                grace_used: 0,
                rollbacks: 0,
                replays: 0,
                campaign_phase: None,
                invariant_failures: Vec::new(),
            },
            plan,
        })
    }

    /// Play every planned day and summarize.
    ///
    /// # Errors
    ///
    /// Returns the first engine error that is not an expected outcome.
    pub fn run(mut self) -> Result<SimulationSummary> {
        let mut last = self.plan.start;
        for offset in 0..self.plan.days {
            let Some(date) = self.plan.start.checked_add_days(Days::new(u64::from(offset)))
            else {
                break;
            };
            self.play_day(date)?;
            last = date;
        }
        Ok(self.finish(last))
    }

    fn play_day(&mut self, date: NaiveDate) -> Result<()> {
        self.tracker.clock_mut().set_date(date);
        let new_week = date.weekday() == Weekday::Mon || date == self.plan.start;
        if self.plan.persona.use_grace && new_week {
            self.claim_grace(date)?;
        }

        let inputs = self.plan_inputs(date);
        let grace_keys = self.grace_keys(date, &inputs);
        let request = self
            .tracker
            .score_day(date, &inputs, &grace_keys)?
            .into_request();

        if self.rng.gen_bool(self.plan.persona.storage_fault_rate) {
            self.commit_with_fault(&request)?;
        }

        let outcome = self.tracker.finalize_day(&request)?;
        self.summary.grace_used += outcome.receipt().grace_used.len();
        if self.tracker.finalize_day(&request)?.is_replay() {
            self.summary.replays += 1;
        } else {
            self.fail(format!("{date}: identical request was committed twice"));
        }

        for award in self.tracker.award_badges()? {
            self.summary.badges.push(award.code);
        }
        if date.weekday() == Weekday::Sun {
            self.summary.missions_completed += self
                .tracker
                .weekly_missions(date)
                .iter()
                .filter(|mission| mission.completed)
                .count();
        }
        self.check_invariants(date);
        Ok(())
    }

    fn claim_grace(&mut self, date: NaiveDate) -> Result<()> {
        match self.tracker.grant_grace_token(date) {
            Ok(_) => self.summary.grace_granted += 1,
            Err(err) if err.kind() == ErrorKind::InvalidInput => {
                log::debug!("no grace token for {date}: {err}");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    fn plan_inputs(&mut self, date: NaiveDate) -> Vec<CompletionInput> {
        let persona = self.plan.persona;
        if self.rng.gen_bool(persona.skip_day_rate) {
            log::debug!("skipping {date}");
            return Vec::new();
        }
        let board = self.tracker.daily_quests(date);
        let mut inputs = Vec::new();
        for quest in board.iter() {
            let rate = if quest.required {
                persona.completion_rate
            } else {
                persona.optional_rate
            };
            if !self.rng.gen_bool(rate) {
                continue;
            }
            let intensity = if self.rng.gen_bool(persona.hard_rate) {
                Intensity::Hard
            } else {
                Intensity::Standard
            };
            let minutes = self.rng.gen_range(10..=60);
            inputs.push(
                CompletionInput::done(quest.quest_id.clone())
                    .with_minutes(minutes)
                    .with_intensity(intensity),
            );
        }
        inputs
    }

    /// Streak keys worth protecting, at most one per available token.
    fn grace_keys(&self, date: NaiveDate, inputs: &[CompletionInput]) -> Vec<String> {
        if !self.plan.persona.use_grace {
            return Vec::new();
        }
        let available = self.tracker.available_grace_tokens(date);
        let board = self.tracker.daily_quests(date);
        let streaks = &self.tracker.state().streaks;
        let mut keys: Vec<String> = Vec::new();
        for input in inputs {
            let Some(quest) = board.find(&input.quest_id) else {
                continue;
            };
            if streaks.bridgeable(&quest.streak_key, date) && !keys.contains(&quest.streak_key) {
                keys.push(quest.streak_key.clone());
            }
        }
        keys.truncate(available);
        keys
    }

    fn commit_with_fault(&mut self, request: &FinalizeRequest) -> Result<()> {
        let before = self.tracker.state().clone();
        self.store.fail_next_commit(CommitFault::AfterPartialWrite);
        match self.tracker.finalize_day(request) {
            Err(err) if err.kind() == ErrorKind::StorageFailure => {
                self.summary.rollbacks += 1;
                if self.tracker.state() != &before || self.store.snapshot() != before {
                    self.fail(format!("{}: rollback left partial writes", request.date));
                }
                Ok(())
            }
            Err(err) => Err(err.into()),
            Ok(_) => {
                self.fail(format!("{}: injected fault was not surfaced", request.date));
                Ok(())
            }
        }
    }

    fn check_invariants(&mut self, date: NaiveDate) {
        let state = self.tracker.state();
        let mut problems = Vec::new();
        if self.store.snapshot() != *state {
            problems.push(format!("{date}: store diverged from tracker state"));
        }
        let ledger = &state.ledger;
        let receipt_xp: i64 = state.finalized.values().map(|r| r.xp_gained).sum();
        let receipt_penalty: i64 = state.finalized.values().map(|r| r.penalty).sum();
        if ledger.total_xp() != receipt_xp || ledger.total_penalties() != receipt_penalty {
            problems.push(format!("{date}: ledger totals disagree with receipts"));
        }
        if ledger.net_xp() != (ledger.total_xp() - ledger.total_penalties()).max(0) {
            problems.push(format!("{date}: net XP is not floored at zero"));
        }
        if ledger.level().level != level_for_xp(ledger.net_xp()) {
            problems.push(format!("{date}: level disagrees with net XP"));
        }
        for problem in problems {
            self.fail(problem);
        }
    }

    fn fail(&mut self, message: String) {
        log::warn!("{message}");
        self.summary.invariant_failures.push(message);
    }

    fn finish(mut self, last: NaiveDate) -> SimulationSummary {
        let ledger = &self.tracker.state().ledger;
        self.summary.active_days = ledger.active_days().len();
        self.summary.total_xp = ledger.total_xp();
        self.summary.total_penalties = ledger.total_penalties();
        self.summary.net_xp = ledger.net_xp();
        self.summary.level = ledger.level().level;
        self.summary.best_streak = self.tracker.state().streaks.best_overall();
        self.summary.campaign_phase = self
            .tracker
            .campaign_progress(last)
            .map(|progress| progress.phase);
        self.summary
    }
}

/// Run `plan` once with `seed`.
///
/// # Errors
///
/// Returns an error if the engine rejects an operation the plan expected to succeed.
pub fn run_plan(
    config: &Arc<EngineConfig>,
    plan: &SimulationPlan,
    seed: u64,
) -> Result<SimulationSummary> {
    SimulationSession::new(Arc::clone(config), plan.clone(), seed)?.run()
}
