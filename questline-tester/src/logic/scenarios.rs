use anyhow::{Result, ensure};
use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use super::simulation::{Persona, SimulationPlan, SimulationSummary};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("unknown scenario `{0}`")]
    Unknown(String),
    #[error("invalid scenario filter: {0}")]
    Filter(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub key: &'static str,
    pub description: &'static str,
    pub plan: SimulationPlan,
}

const SCENARIOS: &[(&str, &str)] = &[
    ("steady", "Every required quest done daily; no penalties"),
    ("casual", "Partial completion with skipped days; net XP stays floored"),
    ("grace", "Skipped days bridged with weekly grace tokens"),
    ("flaky-storage", "Store fails after partial writes; every day rolls back cleanly"),
    ("idle", "Nothing logged; only penalties accrue"),
    ("campaign", "Full 90-day campaign through the boss day"),
];

#[must_use]
pub fn list_scenarios() -> &'static [(&'static str, &'static str)] {
    SCENARIOS
}

fn no_invariant_failures(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.invariant_failures.is_empty(),
        "invariants violated: {}",
        summary.invariant_failures.join("; ")
    );
    Ok(())
}

fn every_replay_detected(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.replays == usize::try_from(summary.days).unwrap_or(usize::MAX),
        "only {} of {} replays were recognized",
        summary.replays,
        summary.days
    );
    Ok(())
}

fn no_penalties(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.total_penalties == 0,
        "expected no penalties, got {}",
        summary.total_penalties
    );
    Ok(())
}

fn unbroken_streak(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.best_streak == summary.days,
        "best streak {} is shorter than {} days",
        summary.best_streak,
        summary.days
    );
    Ok(())
}

fn net_xp_floored(summary: &SimulationSummary) -> Result<()> {
    ensure!(summary.net_xp >= 0, "net XP went negative: {}", summary.net_xp);
    ensure!(
        summary.net_xp == (summary.total_xp - summary.total_penalties).max(0),
        "net XP {} does not match {} - {}",
        summary.net_xp,
        summary.total_xp,
        summary.total_penalties
    );
    Ok(())
}

fn grace_within_budget(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.grace_used <= summary.grace_granted,
        "spent {} grace tokens but only {} were granted",
        summary.grace_used,
        summary.grace_granted
    );
    ensure!(summary.grace_granted > 0, "no grace tokens were granted");
    Ok(())
}

fn all_faults_recovered(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.rollbacks == usize::try_from(summary.days).unwrap_or(usize::MAX),
        "{} rollbacks for {} days",
        summary.rollbacks,
        summary.days
    );
    Ok(())
}

fn nothing_earned(summary: &SimulationSummary) -> Result<()> {
    ensure!(summary.total_xp == 0, "idle run earned {} XP", summary.total_xp);
    ensure!(summary.badges.is_empty(), "idle run earned badges");
    ensure!(summary.level == 0, "idle run reached level {}", summary.level);
    Ok(())
}

fn campaign_reached_boss(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.campaign_phase == Some(questline_engine::CampaignPhase::BossDay),
        "campaign ended in {:?}",
        summary.campaign_phase
    );
    ensure!(
        summary.badges.iter().any(|code| code == "streak_30"),
        "a 90-day run should earn the 30-day streak badge"
    );
    Ok(())
}

fn build(key: &'static str, description: &'static str, start: NaiveDate, days: u32) -> TestScenario {
    let plan = match key {
        "steady" => SimulationPlan::new(Persona::STEADY, start, days)
            .expect(no_penalties)
            .expect(unbroken_streak),
        "casual" => SimulationPlan::new(Persona::CASUAL, start, days).expect(net_xp_floored),
        "grace" => SimulationPlan::new(
            Persona {
                skip_day_rate: 0.2,
                use_grace: true,
                ..Persona::STEADY
            },
            start,
            days,
        )
        .expect(grace_within_budget),
        "flaky-storage" => SimulationPlan::new(
            Persona {
                storage_fault_rate: 1.0,
                ..Persona::CASUAL
            },
            start,
            days,
        )
        .expect(all_faults_recovered)
        .expect(net_xp_floored),
        "idle" => SimulationPlan::new(Persona::IDLE, start, days).expect(nothing_earned),
        _ => SimulationPlan::new(Persona::STEADY, start, 90)
            .with_campaign(90)
            .expect(campaign_reached_boss),
    };
    TestScenario {
        key,
        description,
        plan: plan
            .expect(no_invariant_failures)
            .expect(every_replay_detected),
    }
}

/// Resolve scenario names (or `all`) and an optional regex filter.
///
/// # Errors
///
/// Returns [`SelectionError`] for unknown names or a malformed filter.
pub fn select_scenarios(
    names: &[String],
    filter: Option<&str>,
    start: NaiveDate,
    days: u32,
) -> Result<Vec<TestScenario>, SelectionError> {
    let filter = filter.map(Regex::new).transpose()?;
    let wants_all = names.is_empty() || names.iter().any(|name| name == "all");

    let mut selected = Vec::new();
    if wants_all {
        selected.extend(SCENARIOS.iter().copied());
    } else {
        for name in names {
            let lower = name.to_lowercase();
            let entry = SCENARIOS
                .iter()
                .find(|(key, _)| *key == lower)
                .ok_or_else(|| SelectionError::Unknown(name.clone()))?;
            selected.push(*entry);
        }
    }

    Ok(selected
        .into_iter()
        .filter(|(key, _)| filter.as_ref().is_none_or(|re| re.is_match(key)))
        .map(|(key, description)| build(key, description, start, days))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn keys(scenarios: &[TestScenario]) -> Vec<&'static str> {
        scenarios.iter().map(|scenario| scenario.key).collect()
    }

    #[test]
    fn all_expands_every_scenario() {
        let all = select_scenarios(&["all".to_string()], None, monday(), 7).unwrap();
        assert_eq!(all.len(), list_scenarios().len());
    }

    #[test]
    fn filter_narrows_selection() {
        let picked = select_scenarios(&[], Some("^(steady|idle)$"), monday(), 7).unwrap();
        assert_eq!(keys(&picked), vec!["steady", "idle"]);
    }

    #[test]
    fn named_scenarios_keep_order() {
        let picked = select_scenarios(
            &["IDLE".to_string(), "steady".to_string()],
            None,
            monday(),
            7,
        )
        .unwrap();
        assert_eq!(keys(&picked), vec!["idle", "steady"]);
    }

    #[test]
    fn unknown_name_and_bad_filter_are_rejected() {
        assert!(matches!(
            select_scenarios(&["marathon".to_string()], None, monday(), 7),
            Err(SelectionError::Unknown(_))
        ));
        assert!(matches!(
            select_scenarios(&[], Some("("), monday(), 7),
            Err(SelectionError::Filter(_))
        ));
    }

    #[test]
    fn campaign_scenario_runs_full_length() {
        let picked = select_scenarios(&["campaign".to_string()], None, monday(), 7).unwrap();
        assert_eq!(picked[0].plan.days, 90);
        assert_eq!(picked[0].plan.campaign_days, Some(90));
    }
}
