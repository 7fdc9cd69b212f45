//! A scored day: the board, what was completed and what is still owed.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::QuestCatalog;
use crate::finalize::{CompletedItem, FinalizeRequest};
use crate::generator::{DailyQuestSet, generate_daily_quests};
use crate::scoring::{CompletionInput, ScoredCompletion, ScoringError, score_completion};
use crate::streaks::StreakTracker;

/// Required quest left unchecked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedQuest {
    pub quest_id: String,
    pub label: String,
    pub penalty: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBoard {
    pub quests: DailyQuestSet,
    pub scored: Vec<ScoredCompletion>,
    pub missed: Vec<MissedQuest>,
    pub pending_penalty: i64,
    pub grace_keys: Vec<String>,
}

impl DayBoard {
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.quests.date
    }

    /// XP the checked quests would earn if finalized now.
    #[must_use]
    pub fn potential_xp(&self) -> i64 {
        self.scored.iter().map(ScoredCompletion::gain).sum()
    }

    #[must_use]
    pub fn into_request(self) -> FinalizeRequest {
        FinalizeRequest {
            date: self.quests.date,
            items: self.scored.into_iter().map(CompletedItem::from).collect(),
            pending_penalty: self.pending_penalty,
            grace_keys: self.grace_keys,
        }
    }
}

/// Score every input for `date` against that day's board.
///
/// Streak multipliers use the streak alive on `date`; keys listed in
/// `grace_keys` also count a streak that one grace token would bridge.
///
/// # Errors
///
/// Returns [`ScoringError`] for inputs naming quests that are unknown, not
/// on the board, or submitted twice.
pub fn score_day(
    catalog: &QuestCatalog,
    streaks: &StreakTracker,
    date: NaiveDate,
    inputs: &[CompletionInput],
    grace_keys: &[String],
) -> Result<DayBoard, ScoringError> {
    let quests = generate_daily_quests(catalog, date);

    let mut seen = HashSet::new();
    let mut scored = Vec::new();
    for input in inputs {
        if catalog.find(&input.quest_id).is_none() {
            return Err(ScoringError::UnknownQuest(input.quest_id.clone()));
        }
        let Some(quest) = quests.find(&input.quest_id) else {
            return Err(ScoringError::NotScheduled {
                quest: input.quest_id.clone(),
                date,
            });
        };
        if !seen.insert(input.quest_id.as_str()) {
            return Err(ScoringError::DuplicateInput {
                quest: input.quest_id.clone(),
            });
        }
        let key = quest.streak_key.as_str();
        let streak_days = if grace_keys.iter().any(|wanted| wanted == key) {
            streaks.active_days_with_grace(key, date)
        } else {
            streaks.active_days(key, date)
        };
        if let Some(completion) = score_completion(catalog, date, input, streak_days)? {
            scored.push(completion);
        }
    }

    let completed: HashSet<&str> = scored
        .iter()
        .map(|completion| completion.quest_id.as_str())
        .collect();
    let missed: Vec<MissedQuest> = quests
        .required()
        .filter(|quest| !completed.contains(quest.quest_id.as_str()))
        .map(|quest| MissedQuest {
            quest_id: quest.quest_id.clone(),
            label: quest.label.clone(),
            penalty: quest.penalty,
        })
        .collect();
    let pending_penalty = missed.iter().map(|quest| quest.penalty).sum();

    log::debug!(
        "scored {date}: {} completed, {} missed, pending penalty {pending_penalty}",
        scored.len(),
        missed.len()
    );

    Ok(DayBoard {
        quests,
        scored,
        missed,
        pending_penalty,
        grace_keys: grace_keys.to_vec(),
    })
}
