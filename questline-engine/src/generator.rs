//! Deterministic daily quest boards derived from a calendar date.
use chrono::{Datelike, NaiveDate, Weekday};
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use smallvec::SmallVec;
use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::catalog::{QuestCatalog, QuestDefinition, QuestPool, Target};

/// Where a quest on the board came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestSlot {
    Mandatory { tier: u8 },
    Rotating { pool: String },
}

/// A quest as it appears on one day's board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuest {
    pub quest_id: String,
    pub label: String,
    pub skill: String,
    pub required: bool,
    pub penalty: i64,
    pub streak_key: String,
    pub target: Option<Target>,
    /// False when a reward-only schedule withholds the base reward today.
    pub grants_base: bool,
    pub slot: QuestSlot,
}

impl DailyQuest {
    fn from_definition(
        quest: &QuestDefinition,
        weekday: Weekday,
        required: bool,
        slot: QuestSlot,
    ) -> Self {
        Self {
            quest_id: quest.id.clone(),
            label: quest.label_on(weekday),
            skill: quest.skill.clone(),
            required,
            penalty: if required { quest.penalty } else { 0 },
            streak_key: quest.streak_key().to_string(),
            target: quest.target_on(weekday),
            grants_base: quest.grants_base_on(weekday),
            slot,
        }
    }
}

/// Quests drawn from a single pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPick {
    pub pool: String,
    pub label: String,
    pub quests: SmallVec<[DailyQuest; 2]>,
}

/// Mandatory and rotating quests for a date. Regenerable at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuestSet {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub mandatory: Vec<DailyQuest>,
    pub rotating: Vec<PoolPick>,
}

impl DailyQuestSet {
    /// Every quest on the board, mandatory first.
    pub fn iter(&self) -> impl Iterator<Item = &DailyQuest> {
        self.mandatory
            .iter()
            .chain(self.rotating.iter().flat_map(|pick| pick.quests.iter()))
    }

    #[must_use]
    pub fn find(&self, quest_id: &str) -> Option<&DailyQuest> {
        self.iter().find(|quest| quest.quest_id == quest_id)
    }

    pub fn required(&self) -> impl Iterator<Item = &DailyQuest> {
        self.iter().filter(|quest| quest.required)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mandatory.is_empty() && self.rotating.iter().all(|pick| pick.quests.is_empty())
    }

    /// Ids of the rotating selection in board order.
    #[must_use]
    pub fn rotating_ids(&self) -> Vec<&str> {
        self.rotating
            .iter()
            .flat_map(|pick| pick.quests.iter().map(|quest| quest.quest_id.as_str()))
            .collect()
    }

    /// Stable digest of the board contents, used to compare previews.
    #[must_use]
    pub fn digest(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(self.date.to_string().as_bytes());
        for quest in self.iter() {
            hasher.write(quest.quest_id.as_bytes());
            hasher.write(quest.label.as_bytes());
            hasher.write_u8(u8::from(quest.required));
        }
        hasher.finish()
    }
}

/// Integer seed for a date in `YYYYMMDD` form.
#[must_use]
pub fn date_seed(date: NaiveDate) -> u64 {
    let year = u64::try_from(date.year()).unwrap_or(0);
    year * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day())
}

/// Independent stream seed per pool so adding a pool never reshuffles the others.
fn derive_pool_seed(date_seed: u64, pool_id: &str) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&date_seed.to_le_bytes()) else {
        return date_seed;
    };
    mac.update(pool_id.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

fn pick_from_pool(pool: &QuestPool, date: NaiveDate, weekday: Weekday) -> PoolPick {
    let amount = pool.pick.min(pool.quests.len());
    let mut rng = ChaCha20Rng::seed_from_u64(derive_pool_seed(date_seed(date), &pool.id));
    let mut indices = rand::seq::index::sample(&mut rng, pool.quests.len(), amount).into_vec();
    indices.sort_unstable();

    let quests = indices
        .into_iter()
        .filter_map(|idx| pool.quests.get(idx))
        .map(|quest| {
            DailyQuest::from_definition(
                quest,
                weekday,
                false,
                QuestSlot::Rotating {
                    pool: pool.id.clone(),
                },
            )
        })
        .collect();

    PoolPick {
        pool: pool.id.clone(),
        label: pool.label.clone(),
        quests,
    }
}

/// Build the quest board for `date`. Pure in `catalog` and `date`.
#[must_use]
pub fn generate_daily_quests(catalog: &QuestCatalog, date: NaiveDate) -> DailyQuestSet {
    let weekday = date.weekday();

    let mandatory: Vec<DailyQuest> = catalog
        .tiers
        .iter()
        .flat_map(|tier| {
            tier.quests
                .iter()
                .filter(move |quest| quest.appears_on(weekday))
                .map(move |quest| {
                    DailyQuest::from_definition(
                        quest,
                        weekday,
                        tier.required,
                        QuestSlot::Mandatory { tier: tier.tier },
                    )
                })
        })
        .collect();

    let rotating: Vec<PoolPick> = catalog
        .pools
        .iter()
        .filter(|pool| !pool.quests.is_empty())
        .map(|pool| pick_from_pool(pool, date, weekday))
        .collect();

    log::debug!(
        "generated board for {date} ({weekday}): {} mandatory, {} rotating",
        mandatory.len(),
        rotating.iter().map(|pick| pick.quests.len()).sum::<usize>()
    );

    DailyQuestSet {
        date,
        weekday,
        mandatory,
        rotating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> QuestCatalog {
        QuestCatalog::load_from_static().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_seed_is_yyyymmdd() {
        assert_eq!(date_seed(date(2026, 10, 19)), 20_261_019);
        assert_eq!(date_seed(date(2025, 1, 2)), 20_250_102);
    }

    #[test]
    fn same_date_yields_same_board() {
        let catalog = catalog();
        let day = date(2026, 10, 19);
        let first = generate_daily_quests(&catalog, day);
        let _other = generate_daily_quests(&catalog, date(2026, 10, 20));
        let second = generate_daily_quests(&catalog, day);
        assert_eq!(first, second);
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn pools_yield_requested_pick_counts() {
        let catalog = catalog();
        let board = generate_daily_quests(&catalog, date(2026, 10, 21));
        assert_eq!(board.rotating.len(), catalog.pools.len());
        for (pick, pool) in board.rotating.iter().zip(&catalog.pools) {
            assert_eq!(pick.quests.len(), pool.pick);
            let mut ids: Vec<_> = pick.quests.iter().map(|q| q.quest_id.clone()).collect();
            ids.dedup();
            assert_eq!(ids.len(), pool.pick);
            assert!(pick.quests.iter().all(|q| !q.required && q.penalty == 0));
        }
    }

    #[test]
    fn strength_only_injected_on_lift_days() {
        let catalog = catalog();
        // 2026-10-19 is a Monday.
        let monday = generate_daily_quests(&catalog, date(2026, 10, 19));
        let tuesday = generate_daily_quests(&catalog, date(2026, 10, 20));
        assert_eq!(monday.weekday, Weekday::Mon);
        assert!(monday.find("strength_day").is_some());
        assert!(tuesday.find("strength_day").is_none());
        assert_eq!(
            tuesday.find("roadwork_20").unwrap().target.as_ref().unwrap().amount,
            3
        );
        assert_eq!(
            monday.find("roadwork_20").unwrap().target.as_ref().unwrap().amount,
            2
        );
    }

    #[test]
    fn reward_only_schedule_marks_base_reward() {
        let catalog = catalog();
        let weekday_board = generate_daily_quests(&catalog, date(2026, 10, 21));
        let weekend_board = generate_daily_quests(&catalog, date(2026, 10, 24));
        assert!(!weekday_board.find("squash_match").unwrap().grants_base);
        assert!(weekend_board.find("squash_match").unwrap().grants_base);
    }

    #[test]
    fn rotation_varies_across_a_month() {
        let catalog = catalog();
        let start = date(2026, 1, 1);
        let distinct: std::collections::HashSet<Vec<String>> = (0..31)
            .filter_map(|offset| start.checked_add_days(chrono::Days::new(offset)))
            .map(|day| {
                generate_daily_quests(&catalog, day)
                    .rotating_ids()
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn pool_seeds_are_independent() {
        let seed = date_seed(date(2026, 5, 5));
        assert_ne!(
            derive_pool_seed(seed, "mind"),
            derive_pool_seed(seed, "creative")
        );
        assert_eq!(derive_pool_seed(seed, "mind"), derive_pool_seed(seed, "mind"));
    }
}
