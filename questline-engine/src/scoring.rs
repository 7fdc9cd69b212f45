//! Experience gain for a single completed activity.
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::catalog::{QuestCatalog, prestige_bonus};
use crate::constants::{
    INTENSITY_EASY, INTENSITY_HARD, INTENSITY_MAX, INTENSITY_STANDARD, MAX_LOGGED_MINUTES,
    MINUTES_PER_DURATION_STEP, STREAK_CAP_DAYS, STREAK_STEP_PER_DAY,
};
use crate::numbers::{i64_to_f64, round_half_even_to_i64};

/// Caller mistakes detected before any state is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("unknown intensity `{0}` (expected easy, standard, hard or max)")]
    UnknownIntensity(String),
    #[error("minutes must be between 0 and {max} (got {value})")]
    MinutesOutOfRange { value: i64, max: i64 },
    #[error("{field} must not be negative (got {value})")]
    NegativeReward { field: &'static str, value: i64 },
    #[error("unknown quest `{0}`")]
    UnknownQuest(String),
    #[error("quest `{quest}` has no bonus flag `{flag}`")]
    UnknownBonusFlag { quest: String, flag: String },
    #[error("quest `{quest}` has no subquest `{subquest}`")]
    UnknownSubquest { quest: String, subquest: String },
    #[error("quest `{quest}` is not on the board for {date}")]
    NotScheduled { quest: String, date: NaiveDate },
    #[error("quest `{quest}` was submitted more than once")]
    DuplicateInput { quest: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Easy,
    #[default]
    Standard,
    Hard,
    Max,
}

impl Intensity {
    pub const ALL: &'static [Self] = &[Self::Easy, Self::Standard, Self::Hard, Self::Max];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Standard => "standard",
            Self::Hard => "hard",
            Self::Max => "max",
        }
    }

    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Easy => INTENSITY_EASY,
            Self::Standard => INTENSITY_STANDARD,
            Self::Hard => INTENSITY_HARD,
            Self::Max => INTENSITY_MAX,
        }
    }
}

impl FromStr for Intensity {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|intensity| intensity.key().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ScoringError::UnknownIntensity(trimmed.to_string()))
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// `1.0 + 0.1 * min(days, 5)`: +10% per streak day, capped at +50%.
#[must_use]
pub fn streak_multiplier(streak_days: u32) -> f64 {
    1.0 + STREAK_STEP_PER_DAY * f64::from(streak_days.min(STREAK_CAP_DAYS))
}

/// `1.0 + max(0, minutes - baseline) / 60`.
#[must_use]
pub fn duration_multiplier(minutes: u32, baseline_minutes: u32) -> f64 {
    1.0 + f64::from(minutes.saturating_sub(baseline_minutes)) / MINUTES_PER_DURATION_STEP
}

fn checked_minutes(minutes: i64) -> Result<u32, ScoringError> {
    if !(0..=MAX_LOGGED_MINUTES).contains(&minutes) {
        return Err(ScoringError::MinutesOutOfRange {
            value: minutes,
            max: MAX_LOGGED_MINUTES,
        });
    }
    u32::try_from(minutes).map_err(|_| ScoringError::MinutesOutOfRange {
        value: minutes,
        max: MAX_LOGGED_MINUTES,
    })
}

/// Experience for one completed activity, rounded half-to-even.
///
/// # Errors
///
/// Returns [`ScoringError`] for negative rewards or minutes outside a day.
pub fn compute_gain(
    base_reward: i64,
    bonus: i64,
    intensity: Intensity,
    streak_days: u32,
    minutes: i64,
    baseline_minutes: u32,
) -> Result<i64, ScoringError> {
    Ok(GainBreakdown::compute(
        base_reward,
        bonus,
        intensity,
        streak_days,
        minutes,
        baseline_minutes,
    )?
    .gain)
}

/// Every factor that went into a gain, for display next to the result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainBreakdown {
    pub base: i64,
    pub bonus: i64,
    pub intensity_mult: f64,
    pub streak_mult: f64,
    pub duration_mult: f64,
    pub gain: i64,
}

impl GainBreakdown {
    /// # Errors
    ///
    /// Returns [`ScoringError`] for negative rewards or minutes outside a day.
    pub fn compute(
        base_reward: i64,
        bonus: i64,
        intensity: Intensity,
        streak_days: u32,
        minutes: i64,
        baseline_minutes: u32,
    ) -> Result<Self, ScoringError> {
        if base_reward < 0 {
            return Err(ScoringError::NegativeReward {
                field: "base_reward",
                value: base_reward,
            });
        }
        if bonus < 0 {
            return Err(ScoringError::NegativeReward {
                field: "bonus",
                value: bonus,
            });
        }
        let minutes = checked_minutes(minutes)?;

        let intensity_mult = intensity.multiplier();
        let streak_mult = streak_multiplier(streak_days);
        let duration_mult = duration_multiplier(minutes, baseline_minutes);
        let raw = i64_to_f64(base_reward + bonus) * intensity_mult * streak_mult * duration_mult;

        Ok(Self {
            base: base_reward,
            bonus,
            intensity_mult,
            streak_mult,
            duration_mult,
            gain: round_half_even_to_i64(raw),
        })
    }
}

/// Achieved amount for one subquest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubquestInput {
    pub id: String,
    #[serde(default)]
    pub achieved: u32,
}

/// Raw per-quest input supplied by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionInput {
    pub quest_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub intensity: Intensity,
    /// Optional bonus flags that were met (e.g. `pr`, `combo`).
    #[serde(default)]
    pub flags: SmallVec<[String; 2]>,
    /// Achieved amount checked against the quest's prestige tiers.
    #[serde(default)]
    pub achieved: Option<u32>,
    #[serde(default)]
    pub subquests: Vec<SubquestInput>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
}

impl CompletionInput {
    /// Input for a quest marked complete with default minutes and intensity.
    #[must_use]
    pub fn done(quest_id: impl Into<String>) -> Self {
        Self {
            completed: true,
            ..Self::skipped(quest_id)
        }
    }

    /// Input for a quest left unchecked.
    #[must_use]
    pub fn skipped(quest_id: impl Into<String>) -> Self {
        Self {
            quest_id: quest_id.into(),
            completed: false,
            minutes: 0,
            intensity: Intensity::Standard,
            flags: SmallVec::new(),
            achieved: None,
            subquests: Vec::new(),
            completed_at: None,
        }
    }

    #[must_use]
    pub const fn with_minutes(mut self, minutes: i64) -> Self {
        self.minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_intensity(mut self, intensity: Intensity) -> Self {
        self.intensity = intensity;
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    #[must_use]
    pub const fn with_achieved(mut self, achieved: u32) -> Self {
        self.achieved = Some(achieved);
        self
    }

    #[must_use]
    pub fn with_subquest(mut self, id: impl Into<String>, achieved: u32) -> Self {
        self.subquests.push(SubquestInput {
            id: id.into(),
            achieved,
        });
        self
    }
}

/// A completed quest with its computed gain, ready for finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCompletion {
    pub quest_id: String,
    pub label: String,
    pub skill: String,
    pub streak_key: String,
    pub minutes: u32,
    pub intensity: Intensity,
    pub breakdown: GainBreakdown,
    pub completed_at: Option<NaiveDateTime>,
}

impl ScoredCompletion {
    #[must_use]
    pub const fn gain(&self) -> i64 {
        self.breakdown.gain
    }
}

/// Score one input against the catalog.
///
/// Returns `Ok(None)` for inputs not marked complete; partial credit is not
/// modeled. A subquest is credited when its achieved amount meets its
/// target, and prestige tiers stack on top.
///
/// # Errors
///
/// Returns [`ScoringError`] for unknown quests, flags or subquests and for
/// out-of-range minutes, even when the input is not marked complete.
pub fn score_completion(
    catalog: &QuestCatalog,
    date: NaiveDate,
    input: &CompletionInput,
    streak_days: u32,
) -> Result<Option<ScoredCompletion>, ScoringError> {
    let entry = catalog
        .find(&input.quest_id)
        .ok_or_else(|| ScoringError::UnknownQuest(input.quest_id.clone()))?;
    let quest = entry.quest;
    let minutes = checked_minutes(input.minutes)?;

    let mut bonus = 0_i64;
    for flag in &input.flags {
        bonus += quest
            .flag_bonus(flag)
            .ok_or_else(|| ScoringError::UnknownBonusFlag {
                quest: quest.id.clone(),
                flag: flag.clone(),
            })?;
    }
    bonus += quest.per_minute_bonus(minutes);
    if let Some(achieved) = input.achieved {
        bonus += prestige_bonus(&quest.prestige, achieved);
    }
    for sub_input in &input.subquests {
        let sub = quest
            .subquest(&sub_input.id)
            .ok_or_else(|| ScoringError::UnknownSubquest {
                quest: quest.id.clone(),
                subquest: sub_input.id.clone(),
            })?;
        if sub_input.achieved >= sub.target {
            bonus += sub.base_xp + prestige_bonus(&sub.prestige, sub_input.achieved);
        }
    }

    if !input.completed {
        return Ok(None);
    }

    let weekday = date.weekday();
    let base = if quest.grants_base_on(weekday) {
        quest.base_xp
    } else {
        0
    };
    let breakdown = GainBreakdown::compute(
        base,
        bonus,
        input.intensity,
        streak_days,
        i64::from(minutes),
        quest.baseline_minutes(),
    )?;

    log::debug!(
        "scored {} on {date}: base {base} bonus {bonus} x{:.2} x{:.2} x{:.2} = {}",
        quest.id,
        breakdown.intensity_mult,
        breakdown.streak_mult,
        breakdown.duration_mult,
        breakdown.gain
    );

    Ok(Some(ScoredCompletion {
        quest_id: quest.id.clone(),
        label: quest.label_on(weekday),
        skill: quest.skill.clone(),
        streak_key: quest.streak_key().to_string(),
        minutes,
        intensity: input.intensity,
        breakdown,
        completed_at: input.completed_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> QuestCatalog {
        QuestCatalog::load_from_static().unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn plain_completion_keeps_base_reward() {
        assert_eq!(
            compute_gain(50, 0, Intensity::Standard, 0, 0, 20).unwrap(),
            50
        );
    }

    #[test]
    fn all_multipliers_compose() {
        // 50 * 1.25 * 1.3 * 1.5 = 121.875
        assert_eq!(compute_gain(50, 0, Intensity::Hard, 3, 50, 20).unwrap(), 122);
    }

    #[test]
    fn streak_multiplier_saturates() {
        let mut previous = 0.0;
        for days in 0..20 {
            let mult = streak_multiplier(days);
            assert!(mult >= previous);
            previous = mult;
        }
        assert!((streak_multiplier(5) - 1.5).abs() < 1e-9);
        assert!((streak_multiplier(500) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn duration_below_baseline_is_neutral() {
        assert!((duration_multiplier(5, 20) - 1.0).abs() < f64::EPSILON);
        assert!((duration_multiplier(80, 20) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn intensity_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Intensity>().unwrap(), Intensity::Hard);
        assert_eq!(" max ".parse::<Intensity>().unwrap(), Intensity::Max);
        assert_eq!(
            "brutal".parse::<Intensity>(),
            Err(ScoringError::UnknownIntensity("brutal".to_string()))
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(matches!(
            compute_gain(50, 0, Intensity::Easy, 0, -1, 20),
            Err(ScoringError::MinutesOutOfRange { .. })
        ));
        assert!(matches!(
            compute_gain(-5, 0, Intensity::Easy, 0, 0, 20),
            Err(ScoringError::NegativeReward { .. })
        ));
    }

    #[test]
    fn unchecked_quests_score_nothing() {
        let scored =
            score_completion(&catalog(), monday(), &CompletionInput::skipped("study"), 3).unwrap();
        assert!(scored.is_none());
    }

    #[test]
    fn unknown_ids_fail_before_completion_check() {
        let catalog = catalog();
        assert_eq!(
            score_completion(&catalog, monday(), &CompletionInput::skipped("nope"), 0),
            Err(ScoringError::UnknownQuest("nope".to_string()))
        );
        let bad_flag = CompletionInput::done("study").with_flag("pr");
        assert!(matches!(
            score_completion(&catalog, monday(), &bad_flag, 0),
            Err(ScoringError::UnknownBonusFlag { .. })
        ));
    }

    #[test]
    fn roadwork_pays_per_minute_and_duration() {
        let input = CompletionInput::done("roadwork_20").with_minutes(30);
        let scored = score_completion(&catalog(), monday(), &input, 0)
            .unwrap()
            .unwrap();
        // (50 + 10) * 1.0 * 1.0 * (1 + 10/60) = 70
        assert_eq!(scored.breakdown.bonus, 10);
        assert_eq!(scored.gain(), 70);
        assert_eq!(scored.streak_key, "roadwork_daily");
    }

    #[test]
    fn squash_prestige_and_drill_baseline() {
        let input = CompletionInput::done("squash_50")
            .with_minutes(10)
            .with_achieved(150);
        let scored = score_completion(&catalog(), monday(), &input, 0)
            .unwrap()
            .unwrap();
        assert_eq!(scored.breakdown.bonus, 75);
        assert_eq!(scored.gain(), 125);
    }

    #[test]
    fn subquests_credit_only_when_target_met() {
        let catalog = catalog();
        let met = CompletionInput::done("drill_ghosting")
            .with_subquest("corner_touches", 95)
            .with_subquest("split_steps", 10);
        let scored = score_completion(&catalog, monday(), &met, 0).unwrap().unwrap();
        // base 15 + corner touches 10 + prestige 10; split steps short of target
        assert_eq!(scored.gain(), 35);

        let unknown = CompletionInput::done("drill_ghosting").with_subquest("lunges", 5);
        assert!(matches!(
            score_completion(&catalog, monday(), &unknown, 0),
            Err(ScoringError::UnknownSubquest { .. })
        ));
    }

    #[test]
    fn reward_only_days_keep_bonuses() {
        let catalog = catalog();
        let input = CompletionInput::done("squash_match").with_flag("win");
        let weekday = score_completion(&catalog, monday(), &input, 0)
            .unwrap()
            .unwrap();
        assert_eq!(weekday.breakdown.base, 0);
        assert_eq!(weekday.gain(), 20);

        let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
        let weekend = score_completion(&catalog, saturday, &input, 0)
            .unwrap()
            .unwrap();
        assert_eq!(weekend.gain(), 80);
    }

    #[test]
    fn completion_input_deserializes_with_defaults() {
        let input: CompletionInput =
            serde_json::from_str(r#"{"quest_id":"rope_10","completed":true,"intensity":"hard","flags":["combo"]}"#)
                .unwrap();
        assert_eq!(input.intensity, Intensity::Hard);
        assert_eq!(input.minutes, 0);
        assert_eq!(input.flags.as_slice(), ["combo".to_string()]);

        let bad: Result<CompletionInput, _> =
            serde_json::from_str(r#"{"quest_id":"rope_10","intensity":"brutal"}"#);
        assert!(bad.is_err());
    }
}
