//! Weekly missions. Progress is recomputed from the ledger on every read.
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::config::ConfigError;
use crate::ledger::{ActivityEntry, Ledger, week_start};
use crate::numbers::percent;
use crate::skills::{SkillCatalog, SkillCategory};

pub(crate) const DEFAULT_MISSIONS_DATA: &str = include_str!("../data/missions.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissionRule {
    /// Entries in the week, optionally filtered by skill or category.
    EntryCount {
        #[serde(default)]
        skill: Option<String>,
        #[serde(default)]
        category: Option<SkillCategory>,
        count: u32,
    },
    XpTotal { xp: i64 },
    /// Distinct days in the week with an entry in `category`.
    ActiveDays { category: SkillCategory, days: u32 },
}

impl MissionRule {
    #[must_use]
    pub fn target(&self) -> i64 {
        match self {
            Self::EntryCount { count, .. } => i64::from(*count),
            Self::XpTotal { xp } => *xp,
            Self::ActiveDays { days, .. } => i64::from(*days),
        }
    }

    fn current<'a>(&self, week: impl Iterator<Item = &'a ActivityEntry>) -> i64 {
        match self {
            Self::EntryCount {
                skill, category, ..
            } => {
                let count = week
                    .filter(|entry| skill.as_ref().is_none_or(|s| &entry.skill == s))
                    .filter(|entry| category.is_none_or(|c| entry.category == c))
                    .count();
                i64::try_from(count).unwrap_or(i64::MAX)
            }
            Self::XpTotal { .. } => week.map(|entry| entry.gain).sum(),
            Self::ActiveDays { category, .. } => {
                let days: BTreeSet<NaiveDate> = week
                    .filter(|entry| entry.category == *category)
                    .map(|entry| entry.day)
                    .collect();
                i64::try_from(days.len()).unwrap_or(i64::MAX)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyMission {
    pub code: String,
    pub label: String,
    pub rule: MissionRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MissionCatalog {
    pub missions: Vec<WeeklyMission>,
}

impl MissionCatalog {
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a mission catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// # Errors
    ///
    /// Returns an error if the bundled JSON is malformed.
    pub fn load_from_static() -> Result<Self, serde_json::Error> {
        Self::from_json(DEFAULT_MISSIONS_DATA)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WeeklyMission> {
        self.missions.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    /// # Errors
    ///
    /// Returns the first duplicate code, unknown skill or non-positive target.
    pub fn validate(&self, skills: &SkillCatalog) -> Result<(), ConfigError> {
        let mut codes = HashSet::new();
        for mission in &self.missions {
            if !codes.insert(mission.code.as_str()) {
                return Err(ConfigError::DuplicateId {
                    kind: "mission",
                    id: mission.code.clone(),
                });
            }
            if let MissionRule::EntryCount {
                skill: Some(skill), ..
            } = &mission.rule
                && skills.get(skill).is_none()
            {
                return Err(ConfigError::UnknownSkill {
                    owner: mission.code.clone(),
                    skill: skill.clone(),
                });
            }
            let target = mission.rule.target();
            if target < 1 {
                return Err(ConfigError::MinViolation {
                    field: format!("{}.target", mission.code),
                    min: 1,
                    value: target,
                });
            }
        }
        Ok(())
    }
}

/// Derived progress of one mission; `completed` is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionProgress {
    pub code: String,
    pub label: String,
    pub week_start: NaiveDate,
    pub current: i64,
    pub target: i64,
    pub completed: bool,
}

impl MissionProgress {
    #[must_use]
    pub fn percent(&self) -> f64 {
        percent(self.current, self.target)
    }
}

/// Progress for every mission over the Monday-aligned week containing `date`,
/// counting entries up to and including `date`.
#[must_use]
pub fn weekly_mission_progress(
    catalog: &MissionCatalog,
    ledger: &Ledger,
    date: NaiveDate,
) -> Vec<MissionProgress> {
    let start = week_start(date);
    let end = start.checked_add_days(Days::new(6)).unwrap_or(date).min(date);
    catalog
        .iter()
        .map(|mission| {
            let current = mission.rule.current(ledger.entries_between(start, end));
            let target = mission.rule.target();
            MissionProgress {
                code: mission.code.clone(),
                label: mission.label.clone(),
                week_start: start,
                current,
                target,
                completed: current >= target,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QuestCatalog;
    use crate::scoring::Intensity;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn entry(d: u32, skill: &str, category: SkillCategory, gain: i64) -> ActivityEntry {
        ActivityEntry {
            day: date(d),
            skill: skill.to_string(),
            category,
            quest_id: "q".to_string(),
            label: skill.to_string(),
            completed_at: date(d).and_hms_opt(9, 0, 0).unwrap(),
            minutes: 20,
            intensity: Intensity::Standard,
            gain,
        }
    }

    fn progress<'a>(rows: &'a [MissionProgress], code: &str) -> &'a MissionProgress {
        rows.iter().find(|row| row.code == code).unwrap()
    }

    #[test]
    fn bundled_missions_are_valid() {
        let catalog = MissionCatalog::load_from_static().unwrap();
        let skills = QuestCatalog::load_from_static().unwrap().skills;
        catalog.validate(&skills).unwrap();
    }

    #[test]
    fn progress_counts_only_current_week() {
        let catalog = MissionCatalog::load_from_static().unwrap();
        let mut ledger = Ledger::new();
        // Sunday before the week of Monday 2026-10-19.
        ledger.append_entry(entry(18, "Roadwork", SkillCategory::Fitness, 500));
        for d in 19..=23 {
            ledger.append_entry(entry(d, "Roadwork", SkillCategory::Fitness, 100));
        }
        ledger.append_entry(entry(20, "Studying / Schoolwork", SkillCategory::Study, 50));
        ledger.append_entry(entry(20, "Language", SkillCategory::Study, 40));
        ledger.append_entry(entry(22, "Language", SkillCategory::Study, 40));

        let rows = weekly_mission_progress(&catalog, &ledger, date(23));
        let roadwork = progress(&rows, "roadwork_5");
        assert_eq!(roadwork.current, 5);
        assert!(roadwork.completed);
        assert_eq!(progress(&rows, "weekly_xp_1500").current, 630);
        assert_eq!(progress(&rows, "study_days_4").current, 2);
        assert!(!progress(&rows, "creative_3").completed);
        assert!(rows.iter().all(|row| row.week_start == date(19)));
    }

    #[test]
    fn progress_is_recomputed_each_read() {
        let catalog = MissionCatalog::load_from_static().unwrap();
        let mut ledger = Ledger::new();
        let first = weekly_mission_progress(&catalog, &ledger, date(21));
        ledger.append_entry(entry(21, "Piano", SkillCategory::Creative, 30));
        let second = weekly_mission_progress(&catalog, &ledger, date(21));
        assert_ne!(first, second);
        assert_eq!(second, weekly_mission_progress(&catalog, &ledger, date(21)));
        assert!((progress(&second, "creative_3").percent() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_mission_skill_is_rejected() {
        let mut catalog = MissionCatalog::load_from_static().unwrap();
        catalog.missions[0].rule = MissionRule::EntryCount {
            skill: Some("Juggling".to_string()),
            category: None,
            count: 1,
        };
        let skills = QuestCatalog::load_from_static().unwrap().skills;
        assert!(matches!(
            catalog.validate(&skills),
            Err(ConfigError::UnknownSkill { .. })
        ));
    }
}
