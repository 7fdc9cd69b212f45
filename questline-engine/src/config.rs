//! Immutable engine configuration assembled once at startup.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::achievements::BadgeCatalog;
use crate::catalog::QuestCatalog;
use crate::missions::MissionCatalog;
use crate::skills::SkillCatalog;

/// Names understood by [`crate::DataLoader::load_config`].
pub const CATALOG_CONFIG: &str = "catalog";
pub const BADGES_CONFIG: &str = "badges";
pub const MISSIONS_CONFIG: &str = "missions";

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {name} configuration: {source}")]
    Parse {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{what} must not be empty")]
    Empty { what: &'static str },
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("`{owner}` references unknown skill `{skill}`")]
    UnknownSkill { owner: String, skill: String },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: String,
        min: i64,
        value: i64,
    },
    #[error("prestige tiers for `{owner}` must have ascending thresholds and non-negative rewards")]
    PrestigeOrder { owner: String },
    #[error("schedule for `{quest}` has no weekdays")]
    EmptySchedule { quest: String },
    #[error("optional quest `{quest}` cannot carry a penalty")]
    PenaltyOnOptional { quest: String },
    #[error("pool `{pool}` picks {pick} of {size} quests")]
    PoolPick {
        pool: String,
        pick: usize,
        size: usize,
    },
}

/// Catalogs the engine needs, shared read-only by every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub catalog: QuestCatalog,
    pub badges: BadgeCatalog,
    pub missions: MissionCatalog,
}

impl EngineConfig {
    /// Assemble and validate a configuration from its parts.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant across the catalogs.
    pub fn from_parts(
        catalog: QuestCatalog,
        badges: BadgeCatalog,
        missions: MissionCatalog,
    ) -> Result<Self, ConfigError> {
        let cfg = Self {
            catalog,
            badges,
            missions,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate the configuration bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if any bundled JSON is malformed or invalid.
    pub fn load_from_static() -> Result<Self, ConfigError> {
        let catalog = QuestCatalog::load_from_static().map_err(|source| ConfigError::Parse {
            name: CATALOG_CONFIG,
            source,
        })?;
        let badges = BadgeCatalog::load_from_static().map_err(|source| ConfigError::Parse {
            name: BADGES_CONFIG,
            source,
        })?;
        let missions =
            MissionCatalog::load_from_static().map_err(|source| ConfigError::Parse {
                name: MISSIONS_CONFIG,
                source,
            })?;
        Self::from_parts(catalog, badges, missions)
    }

    #[must_use]
    pub const fn skills(&self) -> &SkillCatalog {
        &self.catalog.skills
    }

    /// Check invariants across all catalogs.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.catalog.validate()?;
        self.badges.validate()?;
        self.missions.validate(&self.catalog.skills)?;
        Ok(())
    }
}
