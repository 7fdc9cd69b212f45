//! Append-only record of completed activity and daily penalties.
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::constants::{ROLLING_WINDOW_DAYS, XP_PER_LEVEL_UNIT};
use crate::numbers::percent;
use crate::scoring::Intensity;
use crate::skills::{SkillCatalog, SkillCategory};
use crate::streaks::{StreakState, StreakTracker};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("a penalty is already recorded for {date}")]
    DuplicatePenalty { date: NaiveDate },
    #[error("penalty amount must be positive (got {amount})")]
    NonPositivePenalty { amount: i64 },
}

/// One committed completion. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Day the entry was finalized for.
    pub day: NaiveDate,
    pub skill: String,
    pub category: SkillCategory,
    pub quest_id: String,
    pub label: String,
    pub completed_at: NaiveDateTime,
    pub minutes: u32,
    pub intensity: Intensity,
    pub gain: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyEntry {
    pub date: NaiveDate,
    pub code: String,
    pub amount: i64,
    pub note: String,
}

/// Monday of the week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// `floor(sqrt(max(0, xp) / 100))`, computed exactly on integers.
#[must_use]
pub fn level_for_xp(xp: i64) -> u32 {
    let units = xp.max(0) / XP_PER_LEVEL_UNIT;
    u32::try_from(units.isqrt()).unwrap_or(u32::MAX)
}

/// `100 * level^2`, the first XP value at which `level` is reached.
#[must_use]
pub fn xp_for_level(level: u32) -> i64 {
    let level = i64::from(level);
    XP_PER_LEVEL_UNIT.saturating_mul(level.saturating_mul(level))
}

/// XP still missing before the next level.
#[must_use]
pub fn xp_to_next_level(xp: i64) -> i64 {
    let next = level_for_xp(xp).saturating_add(1);
    xp_for_level(next) - xp.max(0)
}

/// Position of an XP total on the level curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub xp: i64,
    pub level: u32,
    pub level_floor: i64,
    pub next_level_at: i64,
    pub to_next: i64,
    pub percent: f64,
}

impl LevelProgress {
    #[must_use]
    pub fn for_xp(xp: i64) -> Self {
        let xp = xp.max(0);
        let level = level_for_xp(xp);
        let level_floor = xp_for_level(level);
        let next_level_at = xp_for_level(level.saturating_add(1));
        Self {
            xp,
            level,
            level_floor,
            next_level_at,
            to_next: next_level_at - xp,
            percent: percent(xp - level_floor, next_level_at - level_floor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProgress {
    pub skill: String,
    pub category: SkillCategory,
    pub xp: i64,
    pub level: u32,
}

/// Snapshot of everything the progress view shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total_xp: i64,
    pub total_penalties: i64,
    pub net_xp: i64,
    pub level: LevelProgress,
    /// Every catalog skill, highest XP first.
    pub skills: Vec<SkillProgress>,
    pub streaks: Vec<StreakState>,
    pub recent: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Ledger {
    entries: Vec<ActivityEntry>,
    penalties: Vec<PenaltyEntry>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    #[must_use]
    pub fn penalties(&self) -> &[PenaltyEntry] {
        &self.penalties
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn append_entry(&mut self, entry: ActivityEntry) {
        self.entries.push(entry);
    }

    /// Record the aggregate penalty for a day.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the day already has a penalty or the
    /// amount is not positive.
    pub fn append_penalty(&mut self, penalty: PenaltyEntry) -> Result<(), LedgerError> {
        if penalty.amount <= 0 {
            return Err(LedgerError::NonPositivePenalty {
                amount: penalty.amount,
            });
        }
        if self.penalty_on(penalty.date).is_some() {
            return Err(LedgerError::DuplicatePenalty { date: penalty.date });
        }
        self.penalties.push(penalty);
        Ok(())
    }

    #[must_use]
    pub fn penalty_on(&self, date: NaiveDate) -> Option<&PenaltyEntry> {
        self.penalties.iter().find(|penalty| penalty.date == date)
    }

    /// Drop everything written for `day`. Only used to undo a failed commit.
    pub(crate) fn remove_day(&mut self, day: NaiveDate) {
        self.entries.retain(|entry| entry.day != day);
        self.penalties.retain(|penalty| penalty.date != day);
    }

    #[must_use]
    pub fn total_xp(&self) -> i64 {
        self.entries.iter().map(|entry| entry.gain).sum()
    }

    #[must_use]
    pub fn total_penalties(&self) -> i64 {
        self.penalties.iter().map(|penalty| penalty.amount).sum()
    }

    /// Total XP minus penalties, never below zero.
    #[must_use]
    pub fn net_xp(&self) -> i64 {
        (self.total_xp() - self.total_penalties()).max(0)
    }

    #[must_use]
    pub fn level(&self) -> LevelProgress {
        LevelProgress::for_xp(self.net_xp())
    }

    #[must_use]
    pub fn xp_by_skill(&self) -> BTreeMap<&str, i64> {
        let mut totals = BTreeMap::new();
        for entry in &self.entries {
            *totals.entry(entry.skill.as_str()).or_insert(0) += entry.gain;
        }
        totals
    }

    #[must_use]
    pub fn xp_by_category(&self) -> BTreeMap<SkillCategory, i64> {
        let mut totals = BTreeMap::new();
        for entry in &self.entries {
            *totals.entry(entry.category).or_insert(0) += entry.gain;
        }
        totals
    }

    #[must_use]
    pub fn category_xp(&self, category: SkillCategory) -> i64 {
        self.entries
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.gain)
            .sum()
    }

    /// Entries finalized for days in `start..=end`.
    pub fn entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &ActivityEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.day >= start && entry.day <= end)
    }

    /// XP gained for days in `start..=end`.
    #[must_use]
    pub fn xp_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        self.entries_between(start, end)
            .map(|entry| entry.gain)
            .sum()
    }

    /// XP gained over the `days` days ending on `date`.
    #[must_use]
    pub fn xp_rolling(&self, date: NaiveDate, days: u32) -> i64 {
        if days == 0 {
            return 0;
        }
        let start = date
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        self.xp_between(start, date)
    }

    #[must_use]
    pub fn xp_last_week(&self, date: NaiveDate) -> i64 {
        self.xp_rolling(date, ROLLING_WINDOW_DAYS)
    }

    /// XP gained from Monday of `date`'s week through `date`.
    #[must_use]
    pub fn xp_week_to_date(&self, date: NaiveDate) -> i64 {
        self.xp_between(week_start(date), date)
    }

    /// Entries completed on or after `since`, newest first.
    #[must_use]
    pub fn recent_entries(&self, since: NaiveDate) -> Vec<ActivityEntry> {
        let mut recent: Vec<ActivityEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.completed_at.date() >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        recent
    }

    /// Distinct days with at least one entry.
    #[must_use]
    pub fn active_days(&self) -> BTreeSet<NaiveDate> {
        self.entries.iter().map(|entry| entry.day).collect()
    }

    /// Level and streak overview as of `today`.
    #[must_use]
    pub fn summary(
        &self,
        skills: &SkillCatalog,
        streaks: &StreakTracker,
        today: NaiveDate,
    ) -> ProgressSummary {
        let by_skill = self.xp_by_skill();
        let mut skill_rows: Vec<SkillProgress> = skills
            .iter()
            .map(|skill| {
                let xp = by_skill.get(skill.name.as_str()).copied().unwrap_or(0);
                SkillProgress {
                    skill: skill.name.clone(),
                    category: skill.category,
                    xp,
                    level: level_for_xp(xp),
                }
            })
            .collect();
        skill_rows.sort_by(|a, b| b.xp.cmp(&a.xp));

        let since = today
            .checked_sub_days(Days::new(u64::from(ROLLING_WINDOW_DAYS)))
            .unwrap_or(NaiveDate::MIN);

        ProgressSummary {
            total_xp: self.total_xp(),
            total_penalties: self.total_penalties(),
            net_xp: self.net_xp(),
            level: self.level(),
            skills: skill_rows,
            streaks: streaks.iter().cloned().collect(),
            recent: self.recent_entries(since),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn entry(day: u32, skill: &str, category: SkillCategory, gain: i64) -> ActivityEntry {
        ActivityEntry {
            day: date(day),
            skill: skill.to_string(),
            category,
            quest_id: "q".to_string(),
            label: "Quest".to_string(),
            completed_at: date(day).and_time(NaiveTime::from_hms_opt(18, 0, 0).unwrap()),
            minutes: 0,
            intensity: Intensity::Standard,
            gain,
        }
    }

    fn penalty(day: u32, amount: i64) -> PenaltyEntry {
        PenaltyEntry {
            date: date(day),
            code: "daily_miss".to_string(),
            amount,
            note: "Required quests missed".to_string(),
        }
    }

    #[test]
    fn level_curve_inverts_at_boundaries() {
        for level in 0..1000 {
            assert_eq!(level_for_xp(xp_for_level(level)), level);
            if level > 0 {
                assert_eq!(level_for_xp(xp_for_level(level) - 1), level - 1);
            }
        }
        assert_eq!(level_for_xp(-50), 0);
        assert_eq!(xp_to_next_level(0), 100);
        assert_eq!(xp_to_next_level(150), 250);
    }

    #[test]
    fn net_xp_never_negative() {
        let mut ledger = Ledger::new();
        ledger.append_entry(entry(1, "Roadwork", SkillCategory::Fitness, 300));
        ledger.append_penalty(penalty(1, 400)).unwrap();
        assert_eq!(ledger.total_xp(), 300);
        assert_eq!(ledger.total_penalties(), 400);
        assert_eq!(ledger.net_xp(), 0);
        assert_eq!(ledger.level().level, 0);
    }

    #[test]
    fn one_penalty_per_day() {
        let mut ledger = Ledger::new();
        ledger.append_penalty(penalty(2, 30)).unwrap();
        assert_eq!(
            ledger.append_penalty(penalty(2, 10)),
            Err(LedgerError::DuplicatePenalty { date: date(2) })
        );
        assert_eq!(
            ledger.append_penalty(penalty(3, 0)),
            Err(LedgerError::NonPositivePenalty { amount: 0 })
        );
    }

    #[test]
    fn windows_are_inclusive() {
        let mut ledger = Ledger::new();
        // 2026-10-19 is a Monday.
        for day in 15..=21 {
            ledger.append_entry(entry(day, "Piano", SkillCategory::Creative, 10));
        }
        assert_eq!(ledger.xp_between(date(15), date(17)), 30);
        assert_eq!(ledger.xp_rolling(date(21), 7), 70);
        assert_eq!(ledger.xp_rolling(date(21), 0), 0);
        assert_eq!(ledger.xp_last_week(date(21)), 70);
        assert_eq!(ledger.xp_week_to_date(date(21)), 30);
        assert_eq!(week_start(date(25)), date(19));
        assert_eq!(week_start(date(19)), date(19));
        assert_eq!(ledger.active_days().len(), 7);
    }

    #[test]
    fn per_skill_and_category_totals() {
        let mut ledger = Ledger::new();
        ledger.append_entry(entry(1, "Roadwork", SkillCategory::Fitness, 70));
        ledger.append_entry(entry(1, "Jump Rope", SkillCategory::Fitness, 40));
        ledger.append_entry(entry(2, "Roadwork", SkillCategory::Fitness, 50));
        ledger.append_entry(entry(2, "Piano", SkillCategory::Creative, 25));
        assert_eq!(ledger.xp_by_skill()["Roadwork"], 120);
        assert_eq!(ledger.category_xp(SkillCategory::Fitness), 160);
        assert_eq!(ledger.xp_by_category()[&SkillCategory::Creative], 25);
    }

    #[test]
    fn remove_day_undoes_a_commit() {
        let mut ledger = Ledger::new();
        ledger.append_entry(entry(1, "Roadwork", SkillCategory::Fitness, 70));
        let before = ledger.clone();
        ledger.append_entry(entry(2, "Piano", SkillCategory::Creative, 25));
        ledger.append_penalty(penalty(2, 15)).unwrap();
        ledger.remove_day(date(2));
        assert_eq!(ledger, before);
    }

    #[test]
    fn level_progress_reports_percent() {
        let progress = LevelProgress::for_xp(250);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.level_floor, 100);
        assert_eq!(progress.next_level_at, 400);
        assert_eq!(progress.to_next, 150);
        assert!((progress.percent - 50.0).abs() < 1e-9);
    }
}
