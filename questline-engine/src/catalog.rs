//! Static quest definitions, quest pools and the seeded skill list.
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::ConfigError;
use crate::constants::{
    DRILL_BASELINE_MINUTES, ENDURANCE_BASELINE_MINUTES, GENERAL_BASELINE_MINUTES,
    TARGET_PLACEHOLDER,
};
use crate::skills::SkillCatalog;

pub(crate) const DEFAULT_CATALOG_DATA: &str = include_str!("../data/catalog.json");

/// Duration family deciding how many minutes count before extra time pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationClass {
    /// Roadwork, lifting, mobility.
    Endurance,
    /// Short technical drills.
    Drill,
    #[default]
    General,
}

impl DurationClass {
    #[must_use]
    pub const fn baseline_minutes(self) -> u32 {
        match self {
            Self::Endurance => ENDURANCE_BASELINE_MINUTES,
            Self::Drill => DRILL_BASELINE_MINUTES,
            Self::General => GENERAL_BASELINE_MINUTES,
        }
    }
}

/// Optional extra reward attached to a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BonusRule {
    /// Fixed reward unlocked by a boolean flag supplied with the completion.
    Flag { id: String, label: String, xp: i64 },
    /// Reward per minute logged beyond `over` minutes.
    PerMinute { over: u32, xp: i64 },
}

/// Extra reward granted when an achieved amount meets `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrestigeTier {
    pub threshold: u32,
    pub xp: i64,
}

/// Sum of every tier whose threshold is met. Tiers stack.
#[must_use]
pub fn prestige_bonus(tiers: &[PrestigeTier], achieved: u32) -> i64 {
    tiers
        .iter()
        .filter(|tier| achieved >= tier.threshold)
        .map(|tier| tier.xp)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub amount: u32,
    pub unit: String,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// Extra target amount on a specific weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayBump {
    pub weekday: Weekday,
    pub extra: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// The quest only appears on scheduled weekdays.
    Inject,
    /// The quest always appears but grants its base reward only on scheduled weekdays.
    RewardOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub mode: ScheduleMode,
    pub days: Vec<Weekday>,
}

impl Schedule {
    #[must_use]
    pub fn includes(&self, weekday: Weekday) -> bool {
        self.days.contains(&weekday)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubquestDefinition {
    pub id: String,
    pub label: String,
    pub target: u32,
    pub unit: String,
    pub base_xp: i64,
    #[serde(default)]
    pub prestige: Vec<PrestigeTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDefinition {
    pub id: String,
    pub label: String,
    pub skill: String,
    pub base_xp: i64,
    #[serde(default)]
    pub bonuses: Vec<BonusRule>,
    #[serde(default)]
    pub duration: DurationClass,
    #[serde(default)]
    pub duration_baseline: Option<u32>,
    #[serde(default)]
    pub prestige: Vec<PrestigeTier>,
    #[serde(default)]
    pub prestige_unit: Option<String>,
    #[serde(default)]
    pub subquests: Vec<SubquestDefinition>,
    #[serde(default)]
    pub penalty: i64,
    #[serde(default)]
    pub streak_key: Option<String>,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub weekday_bumps: Vec<WeekdayBump>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

impl QuestDefinition {
    /// Key used for streak continuity; falls back to the quest id.
    #[must_use]
    pub fn streak_key(&self) -> &str {
        self.streak_key.as_deref().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn baseline_minutes(&self) -> u32 {
        self.duration_baseline
            .unwrap_or_else(|| self.duration.baseline_minutes())
    }

    /// Whether the quest belongs on the board for `weekday`.
    #[must_use]
    pub fn appears_on(&self, weekday: Weekday) -> bool {
        match &self.schedule {
            Some(schedule) if schedule.mode == ScheduleMode::Inject => schedule.includes(weekday),
            _ => true,
        }
    }

    /// Whether the base reward is granted on `weekday`. Bonuses are unaffected.
    #[must_use]
    pub fn grants_base_on(&self, weekday: Weekday) -> bool {
        match &self.schedule {
            Some(schedule) if schedule.mode == ScheduleMode::RewardOnly => {
                schedule.includes(weekday)
            }
            _ => true,
        }
    }

    #[must_use]
    pub fn target_on(&self, weekday: Weekday) -> Option<Target> {
        let target = self.target.as_ref()?;
        let extra: u32 = self
            .weekday_bumps
            .iter()
            .filter(|bump| bump.weekday == weekday)
            .map(|bump| bump.extra)
            .sum();
        Some(Target {
            amount: target.amount.saturating_add(extra),
            unit: target.unit.clone(),
        })
    }

    #[must_use]
    pub fn label_on(&self, weekday: Weekday) -> String {
        match self.target_on(weekday) {
            Some(target) => self.label.replace(TARGET_PLACEHOLDER, &target.to_string()),
            None => self.label.clone(),
        }
    }

    #[must_use]
    pub fn flag_bonus(&self, flag: &str) -> Option<i64> {
        self.bonuses.iter().find_map(|rule| match rule {
            BonusRule::Flag { id, xp, .. } if id == flag => Some(*xp),
            _ => None,
        })
    }

    /// Per-minute bonus earned for `minutes` logged.
    #[must_use]
    pub fn per_minute_bonus(&self, minutes: u32) -> i64 {
        self.bonuses
            .iter()
            .map(|rule| match rule {
                BonusRule::PerMinute { over, xp } => i64::from(minutes.saturating_sub(*over)) * xp,
                BonusRule::Flag { .. } => 0,
            })
            .sum()
    }

    #[must_use]
    pub fn subquest(&self, id: &str) -> Option<&SubquestDefinition> {
        self.subquests.iter().find(|sub| sub.id == id)
    }

    fn validate(&self, skills: &SkillCatalog) -> Result<(), ConfigError> {
        if skills.get(&self.skill).is_none() {
            return Err(ConfigError::UnknownSkill {
                owner: self.id.clone(),
                skill: self.skill.clone(),
            });
        }
        if self.base_xp < 0 {
            return Err(ConfigError::MinViolation {
                field: format!("{}.base_xp", self.id),
                min: 0,
                value: self.base_xp,
            });
        }
        if self.penalty < 0 {
            return Err(ConfigError::MinViolation {
                field: format!("{}.penalty", self.id),
                min: 0,
                value: self.penalty,
            });
        }
        validate_prestige(&self.id, &self.prestige)?;
        if let Some(schedule) = &self.schedule
            && schedule.days.is_empty()
        {
            return Err(ConfigError::EmptySchedule {
                quest: self.id.clone(),
            });
        }

        let mut flags = HashSet::new();
        for rule in &self.bonuses {
            match rule {
                BonusRule::Flag { id, xp, .. } => {
                    if !flags.insert(id.as_str()) {
                        return Err(ConfigError::DuplicateId {
                            kind: "bonus flag",
                            id: format!("{}.{id}", self.id),
                        });
                    }
                    if *xp < 0 {
                        return Err(ConfigError::MinViolation {
                            field: format!("{}.{id}.xp", self.id),
                            min: 0,
                            value: *xp,
                        });
                    }
                }
                BonusRule::PerMinute { xp, .. } if *xp < 0 => {
                    return Err(ConfigError::MinViolation {
                        field: format!("{}.per_minute.xp", self.id),
                        min: 0,
                        value: *xp,
                    });
                }
                BonusRule::PerMinute { .. } => {}
            }
        }

        let mut subquest_ids = HashSet::new();
        for sub in &self.subquests {
            if !subquest_ids.insert(sub.id.as_str()) {
                return Err(ConfigError::DuplicateId {
                    kind: "subquest",
                    id: format!("{}.{}", self.id, sub.id),
                });
            }
            if sub.base_xp < 0 {
                return Err(ConfigError::MinViolation {
                    field: format!("{}.{}.base_xp", self.id, sub.id),
                    min: 0,
                    value: sub.base_xp,
                });
            }
            validate_prestige(&format!("{}.{}", self.id, sub.id), &sub.prestige)?;
        }
        Ok(())
    }
}

fn validate_prestige(owner: &str, tiers: &[PrestigeTier]) -> Result<(), ConfigError> {
    let ascending = tiers
        .windows(2)
        .all(|pair| pair[0].threshold < pair[1].threshold);
    if !ascending || tiers.iter().any(|tier| tier.xp < 0) {
        return Err(ConfigError::PrestigeOrder {
            owner: owner.to_string(),
        });
    }
    Ok(())
}

/// Mandatory quests sharing a tier and its required-ness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestTier {
    pub tier: u8,
    pub required: bool,
    pub quests: Vec<QuestDefinition>,
}

/// Named pool from which `pick` optional quests rotate daily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestPool {
    pub id: String,
    pub label: String,
    pub pick: usize,
    pub quests: Vec<QuestDefinition>,
}

/// Where a quest sits in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestOrigin<'a> {
    Tier(u8),
    Pool(&'a str),
}

/// Catalog lookup result.
#[derive(Debug, Clone, Copy)]
pub struct QuestRef<'a> {
    pub quest: &'a QuestDefinition,
    pub required: bool,
    pub origin: QuestOrigin<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QuestCatalog {
    pub skills: SkillCatalog,
    pub tiers: Vec<QuestTier>,
    #[serde(default)]
    pub pools: Vec<QuestPool>,
}

impl QuestCatalog {
    /// Load the catalog from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled JSON is malformed.
    pub fn load_from_static() -> Result<Self, serde_json::Error> {
        Self::from_json(DEFAULT_CATALOG_DATA)
    }

    /// Find a quest by id across tiers and pools.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<QuestRef<'_>> {
        self.iter().find(|entry| entry.quest.id == id)
    }

    /// Iterate every quest in catalog order: tiers first, then pools.
    pub fn iter(&self) -> impl Iterator<Item = QuestRef<'_>> {
        let tiers = self.tiers.iter().flat_map(|tier| {
            tier.quests.iter().map(move |quest| QuestRef {
                quest,
                required: tier.required,
                origin: QuestOrigin::Tier(tier.tier),
            })
        });
        let pools = self.pools.iter().flat_map(|pool| {
            pool.quests.iter().map(move |quest| QuestRef {
                quest,
                required: false,
                origin: QuestOrigin::Pool(pool.id.as_str()),
            })
        });
        tiers.chain(pools)
    }

    #[must_use]
    pub fn pool(&self, id: &str) -> Option<&QuestPool> {
        self.pools.iter().find(|pool| pool.id == id)
    }

    /// Check structural invariants of the catalog.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.skills.is_empty() {
            return Err(ConfigError::Empty { what: "skills" });
        }
        let mut quest_ids = HashSet::new();
        for entry in self.iter() {
            if !quest_ids.insert(entry.quest.id.as_str()) {
                return Err(ConfigError::DuplicateId {
                    kind: "quest",
                    id: entry.quest.id.clone(),
                });
            }
            entry.quest.validate(&self.skills)?;
            if !entry.required && entry.quest.penalty > 0 {
                return Err(ConfigError::PenaltyOnOptional {
                    quest: entry.quest.id.clone(),
                });
            }
        }

        let mut pool_ids = HashSet::new();
        for pool in &self.pools {
            if !pool_ids.insert(pool.id.as_str()) {
                return Err(ConfigError::DuplicateId {
                    kind: "pool",
                    id: pool.id.clone(),
                });
            }
            if pool.pick == 0 || pool.pick > pool.quests.len() {
                return Err(ConfigError::PoolPick {
                    pool: pool.id.clone(),
                    pick: pool.pick,
                    size: pool.quests.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> QuestCatalog {
        QuestCatalog::load_from_static().unwrap()
    }

    #[test]
    fn bundled_catalog_is_valid() {
        let catalog = catalog();
        catalog.validate().unwrap();
        assert_eq!(catalog.skills.len(), 17);
        assert_eq!(catalog.tiers.len(), 4);
        assert!(catalog.find("squash_50").unwrap().required);
        assert!(!catalog.find("piano").unwrap().required);
        assert!(matches!(
            catalog.find("drill_ghosting").unwrap().origin,
            QuestOrigin::Pool("squash_drills")
        ));
    }

    #[test]
    fn prestige_tiers_stack() {
        let quest = catalog().find("squash_50").unwrap().quest.clone();
        assert_eq!(prestige_bonus(&quest.prestige, 99), 0);
        assert_eq!(prestige_bonus(&quest.prestige, 100), 25);
        assert_eq!(prestige_bonus(&quest.prestige, 160), 75);
        assert_eq!(prestige_bonus(&quest.prestige, 400), 175);
    }

    #[test]
    fn weekday_bumps_extend_target_and_label() {
        let quest = catalog().find("roadwork_20").unwrap().quest.clone();
        assert_eq!(quest.target_on(Weekday::Mon).unwrap().amount, 2);
        assert_eq!(quest.target_on(Weekday::Tue).unwrap().amount, 3);
        assert_eq!(quest.label_on(Weekday::Sat), "Roadwork: 3 mi, 20+ minutes");
        assert_eq!(quest.label_on(Weekday::Sun), "Roadwork: 2 mi, 20+ minutes");
    }

    #[test]
    fn schedules_split_injection_from_reward() {
        let catalog = catalog();
        let strength = catalog.find("strength_day").unwrap().quest;
        assert!(strength.appears_on(Weekday::Mon));
        assert!(!strength.appears_on(Weekday::Tue));
        assert!(strength.grants_base_on(Weekday::Tue));

        let squash_match = catalog.find("squash_match").unwrap().quest;
        assert!(squash_match.appears_on(Weekday::Tue));
        assert!(!squash_match.grants_base_on(Weekday::Tue));
        assert!(squash_match.grants_base_on(Weekday::Sun));
    }

    #[test]
    fn baseline_follows_duration_class() {
        let catalog = catalog();
        assert_eq!(catalog.find("roadwork_20").unwrap().quest.baseline_minutes(), 20);
        assert_eq!(catalog.find("rope_10").unwrap().quest.baseline_minutes(), 10);
        assert_eq!(catalog.find("study").unwrap().quest.baseline_minutes(), 30);
        assert_eq!(
            catalog.find("roadwork_20").unwrap().quest.streak_key(),
            "roadwork_daily"
        );
        assert_eq!(catalog.find("piano").unwrap().quest.streak_key(), "piano");
    }

    #[test]
    fn validate_rejects_duplicates_and_bad_pools() {
        let mut dup = catalog();
        let clone = dup.tiers[0].quests[0].clone();
        dup.tiers[1].quests.push(clone);
        assert!(matches!(
            dup.validate(),
            Err(ConfigError::DuplicateId { kind: "quest", .. })
        ));

        let mut pool = catalog();
        pool.pools[0].pick = 99;
        assert!(matches!(pool.validate(), Err(ConfigError::PoolPick { .. })));

        let mut skill = catalog();
        skill.tiers[0].quests[0].skill = "Underwater Basketry".to_string();
        assert!(matches!(skill.validate(), Err(ConfigError::UnknownSkill { .. })));

        let mut prestige = catalog();
        prestige.tiers[0].quests[0].prestige.reverse();
        assert!(matches!(
            prestige.validate(),
            Err(ConfigError::PrestigeOrder { .. })
        ));

        let mut optional = catalog();
        optional.tiers[3].quests[0].penalty = 5;
        assert!(matches!(
            optional.validate(),
            Err(ConfigError::PenaltyOnOptional { .. })
        ));
    }
}
