//! Fixed-length campaigns culminating in a boss day.
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_CAMPAIGN_DAYS, MAX_CAMPAIGN_DAYS};
use crate::ledger::Ledger;
use crate::numbers::{percent, usize_to_u32};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CampaignError {
    #[error("campaign length must be between 1 and {max} days (got {value})")]
    LengthOutOfRange { value: u32, max: u32 },
    #[error("boss date {boss} falls outside the campaign {start}..={end}")]
    BossOutsideCampaign {
        boss: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSettings {
    pub start: NaiveDate,
    pub length_days: u32,
    /// Defaults to the last campaign day.
    #[serde(default)]
    pub boss_date: Option<NaiveDate>,
}

impl CampaignSettings {
    #[must_use]
    pub const fn new(start: NaiveDate, length_days: u32) -> Self {
        Self {
            start,
            length_days,
            boss_date: None,
        }
    }

    #[must_use]
    pub const fn starting(start: NaiveDate) -> Self {
        Self::new(start, DEFAULT_CAMPAIGN_DAYS)
    }

    #[must_use]
    pub const fn with_boss_date(mut self, boss: NaiveDate) -> Self {
        self.boss_date = Some(boss);
        self
    }

    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(u64::from(self.length_days.saturating_sub(1))))
            .unwrap_or(NaiveDate::MAX)
    }

    #[must_use]
    pub fn boss_day(&self) -> NaiveDate {
        self.boss_date.unwrap_or_else(|| self.end_date())
    }

    /// # Errors
    ///
    /// Returns [`CampaignError`] for an out-of-range length or a boss date
    /// outside the campaign.
    pub fn validate(&self) -> Result<(), CampaignError> {
        if self.length_days == 0 || self.length_days > MAX_CAMPAIGN_DAYS {
            return Err(CampaignError::LengthOutOfRange {
                value: self.length_days,
                max: MAX_CAMPAIGN_DAYS,
            });
        }
        let end = self.end_date();
        if let Some(boss) = self.boss_date
            && (boss < self.start || boss > end)
        {
            return Err(CampaignError::BossOutsideCampaign {
                boss,
                start: self.start,
                end,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignPhase {
    NotStarted,
    Active,
    BossDay,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignProgress {
    pub settings: CampaignSettings,
    pub phase: CampaignPhase,
    /// 1-based day within the campaign; `None` outside it.
    pub day_number: Option<u32>,
    pub days_remaining: u32,
    /// Negative once the boss day has passed.
    pub days_to_boss: i64,
    pub xp_earned: i64,
    pub active_days: u32,
    pub percent_elapsed: f64,
}

/// Progress through `settings` as of `date`, counting ledger entries from
/// the campaign start through `date` (or the end date, if earlier).
#[must_use]
pub fn campaign_progress(
    settings: &CampaignSettings,
    ledger: &Ledger,
    date: NaiveDate,
) -> CampaignProgress {
    let start = settings.start;
    let end = settings.end_date();
    let boss = settings.boss_day();

    let phase = if date < start {
        CampaignPhase::NotStarted
    } else if date == boss {
        CampaignPhase::BossDay
    } else if date > end {
        CampaignPhase::Complete
    } else {
        CampaignPhase::Active
    };

    let day_number = (start..=end)
        .contains(&date)
        .then(|| u32::try_from((date - start).num_days() + 1).unwrap_or(u32::MAX));
    let elapsed = match phase {
        CampaignPhase::NotStarted => 0,
        CampaignPhase::Complete => settings.length_days,
        CampaignPhase::Active | CampaignPhase::BossDay => day_number.unwrap_or(0),
    };
    let days_remaining = settings.length_days.saturating_sub(elapsed);

    let window_end = date.min(end);
    let (xp_earned, active_days) = if date < start {
        (0, 0)
    } else {
        let days: std::collections::BTreeSet<NaiveDate> = ledger
            .entries_between(start, window_end)
            .map(|entry| entry.day)
            .collect();
        (ledger.xp_between(start, window_end), usize_to_u32(days.len()))
    };

    CampaignProgress {
        settings: *settings,
        phase,
        day_number,
        days_remaining,
        days_to_boss: (boss - date).num_days(),
        xp_earned,
        active_days,
        percent_elapsed: percent(i64::from(elapsed), i64::from(settings.length_days)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ActivityEntry;
    use crate::scoring::Intensity;
    use crate::skills::SkillCategory;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    #[test]
    fn default_length_and_boss_day() {
        let settings = CampaignSettings::starting(date(1, 1));
        assert_eq!(settings.length_days, 90);
        assert_eq!(settings.end_date(), date(3, 31));
        assert_eq!(settings.boss_day(), date(3, 31));
        settings.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_settings() {
        assert!(matches!(
            CampaignSettings::new(date(1, 1), 0).validate(),
            Err(CampaignError::LengthOutOfRange { .. })
        ));
        assert!(matches!(
            CampaignSettings::new(date(1, 1), 10)
                .with_boss_date(date(2, 1))
                .validate(),
            Err(CampaignError::BossOutsideCampaign { .. })
        ));
    }

    #[test]
    fn phases_follow_the_calendar() {
        let settings = CampaignSettings::new(date(10, 1), 30).with_boss_date(date(10, 25));
        let ledger = Ledger::new();
        let phase = |d| campaign_progress(&settings, &ledger, d).phase;
        assert_eq!(phase(date(9, 30)), CampaignPhase::NotStarted);
        assert_eq!(phase(date(10, 1)), CampaignPhase::Active);
        assert_eq!(phase(date(10, 25)), CampaignPhase::BossDay);
        assert_eq!(phase(date(10, 28)), CampaignPhase::Active);
        assert_eq!(phase(date(11, 1)), CampaignPhase::Complete);

        let mid = campaign_progress(&settings, &ledger, date(10, 10));
        assert_eq!(mid.day_number, Some(10));
        assert_eq!(mid.days_remaining, 20);
        assert_eq!(mid.days_to_boss, 15);
    }

    #[test]
    fn xp_counts_only_campaign_days() {
        let settings = CampaignSettings::new(date(10, 5), 10);
        let mut ledger = Ledger::new();
        for d in [3, 5, 6, 6, 20] {
            ledger.append_entry(ActivityEntry {
                day: date(10, d),
                skill: "Piano".to_string(),
                category: SkillCategory::Creative,
                quest_id: "piano".to_string(),
                label: "Piano".to_string(),
                completed_at: date(10, d).and_hms_opt(19, 0, 0).unwrap(),
                minutes: 20,
                intensity: Intensity::Standard,
                gain: 50,
            });
        }
        let progress = campaign_progress(&settings, &ledger, date(10, 30));
        assert_eq!(progress.phase, CampaignPhase::Complete);
        assert_eq!(progress.xp_earned, 150);
        assert_eq!(progress.active_days, 2);
        assert_eq!(progress.days_remaining, 0);
        assert!((progress.percent_elapsed - 100.0).abs() < f64::EPSILON);
    }
}
