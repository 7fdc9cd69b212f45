//! Questline Engine
//!
//! Deterministic quest scoring and progression core for the Questline
//! habit tracker. This crate turns logged activity into experience, levels,
//! streaks, penalties, badges and campaign progress, without any UI or
//! storage technology.

pub mod achievements;
pub mod board;
pub mod campaign;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod finalize;
pub mod generator;
pub mod grace;
pub mod ledger;
pub mod missions;
pub mod numbers;
pub mod scoring;
pub mod shared;
pub mod skills;
pub mod store;
pub mod streaks;
pub mod tracker;

use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

// Re-export commonly used types
pub use achievements::{Badge, BadgeAward, BadgeAwards, BadgeCatalog, BadgeRule, evaluate_badges};
pub use board::{DayBoard, MissedQuest, score_day};
pub use campaign::{CampaignPhase, CampaignProgress, CampaignSettings, campaign_progress};
pub use catalog::{QuestCatalog, QuestDefinition, QuestPool, prestige_bonus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BADGES_CONFIG, CATALOG_CONFIG, ConfigError, EngineConfig, MISSIONS_CONFIG};
pub use error::{EngineError, ErrorKind};
pub use finalize::{
    CompletedItem, DayReceipt, FinalizeError, FinalizeOutcome, FinalizeRequest, finalize_day,
};
pub use generator::{DailyQuest, DailyQuestSet, QuestSlot, date_seed, generate_daily_quests};
pub use grace::{GraceLedger, GraceToken};
pub use ledger::{
    ActivityEntry, Ledger, LevelProgress, PenaltyEntry, ProgressSummary, level_for_xp,
    week_start, xp_for_level, xp_to_next_level,
};
pub use missions::{MissionCatalog, MissionProgress, WeeklyMission, weekly_mission_progress};
pub use scoring::{
    CompletionInput, GainBreakdown, Intensity, ScoredCompletion, ScoringError, compute_gain,
    duration_multiplier, score_completion, streak_multiplier,
};
pub use shared::SharedTracker;
pub use skills::{Skill, SkillCatalog, SkillCategory};
pub use store::{CommitFault, DayCommit, MemoryStore, ProgressState, ProgressStore};
pub use streaks::{StreakOutcome, StreakState, StreakTracker};
pub use tracker::Tracker;

/// Trait for abstracting configuration loading
/// Hosts that ship their own catalogs provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load configuration data by name ([`CATALOG_CONFIG`], [`BADGES_CONFIG`]
    /// or [`MISSIONS_CONFIG`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;
}

#[derive(Debug, Error)]
pub enum StaticDataError {
    #[error("no bundled configuration named `{0}`")]
    Unknown(String),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// Serves the JSON bundled with this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDataLoader;

impl DataLoader for StaticDataLoader {
    type Error = StaticDataError;

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        let raw = match config_name {
            CATALOG_CONFIG => catalog::DEFAULT_CATALOG_DATA,
            BADGES_CONFIG => achievements::DEFAULT_BADGES_DATA,
            MISSIONS_CONFIG => missions::DEFAULT_MISSIONS_DATA,
            other => return Err(StaticDataError::Unknown(other.to_string())),
        };
        Ok(serde_json::from_str(raw)?)
    }
}

/// Entry point wiring a data loader to a progress store.
pub struct QuestEngine<L, S>
where
    L: DataLoader,
    S: ProgressStore,
{
    data_loader: L,
    store: S,
}

impl<L, S> QuestEngine<L, S>
where
    L: DataLoader,
    S: ProgressStore,
{
    /// Create a new engine with the provided data loader and store
    pub const fn new(data_loader: L, store: S) -> Self {
        Self { data_loader, store }
    }

    /// Load and validate every catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalog cannot be loaded or is invalid.
    pub fn load_config(&self) -> Result<EngineConfig, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
    {
        let catalog: QuestCatalog = self
            .data_loader
            .load_config(CATALOG_CONFIG)
            .map_err(Into::into)?;
        let badges: BadgeCatalog = self
            .data_loader
            .load_config(BADGES_CONFIG)
            .map_err(Into::into)?;
        let missions: MissionCatalog = self
            .data_loader
            .load_config(MISSIONS_CONFIG)
            .map_err(Into::into)?;
        Ok(EngineConfig::from_parts(catalog, badges, missions)?)
    }

    /// Quest board for `date` from the loaded catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn daily_quests(&self, date: chrono::NaiveDate) -> Result<DailyQuestSet, L::Error> {
        let catalog: QuestCatalog = self.data_loader.load_config(CATALOG_CONFIG)?;
        Ok(generate_daily_quests(&catalog, date))
    }

    /// Open a tracker over this engine's store.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or stored state cannot be loaded.
    pub fn open_tracker<C>(&self, clock: C) -> Result<Tracker<S, C>, anyhow::Error>
    where
        C: Clock,
        S: Clone,
        L::Error: Into<anyhow::Error>,
    {
        let config = Arc::new(self.load_config()?);
        Ok(Tracker::open(config, self.store.clone(), clock)?)
    }
}
