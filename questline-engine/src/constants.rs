//! Centralized balance and tuning constants for Questline scoring.
//!
//! These values define the deterministic math for the progression engine.
//! Keeping them together ensures that balance can only be adjusted via
//! code changes reviewed in version control, rather than through the
//! bundled JSON catalog.

// Intensity multipliers ----------------------------------------------------
pub(crate) const INTENSITY_EASY: f64 = 0.8;
pub(crate) const INTENSITY_STANDARD: f64 = 1.0;
pub(crate) const INTENSITY_HARD: f64 = 1.25;
pub(crate) const INTENSITY_MAX: f64 = 1.5;

// Streak tuning ------------------------------------------------------------
pub(crate) const STREAK_STEP_PER_DAY: f64 = 0.1;
pub(crate) const STREAK_CAP_DAYS: u32 = 5;
/// Missed days a single grace token can bridge.
pub(crate) const GRACE_BRIDGE_MISSED_DAYS: i64 = 1;

// Duration tuning ----------------------------------------------------------
pub(crate) const MINUTES_PER_DURATION_STEP: f64 = 60.0;
pub(crate) const ENDURANCE_BASELINE_MINUTES: u32 = 20;
pub(crate) const DRILL_BASELINE_MINUTES: u32 = 10;
pub(crate) const GENERAL_BASELINE_MINUTES: u32 = 30;
pub(crate) const MAX_LOGGED_MINUTES: i64 = 24 * 60;

// Level curve --------------------------------------------------------------
pub(crate) const XP_PER_LEVEL_UNIT: i64 = 100;

// Ledger -------------------------------------------------------------------
pub(crate) const DAILY_MISS_PENALTY_CODE: &str = "daily_miss";
pub(crate) const DAILY_MISS_PENALTY_NOTE: &str = "Required quests missed";
pub(crate) const ROLLING_WINDOW_DAYS: u32 = 7;

// Campaign -----------------------------------------------------------------
pub(crate) const DEFAULT_CAMPAIGN_DAYS: u32 = 90;
pub(crate) const MAX_CAMPAIGN_DAYS: u32 = 3_650;

// Generation ---------------------------------------------------------------
pub(crate) const TARGET_PLACEHOLDER: &str = "{target}";
