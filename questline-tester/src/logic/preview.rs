use anyhow::Result;
use colored::Colorize;
use questline_engine::{DailyQuest, DailyQuestSet, QuestSlot};
use std::io::Write;

fn slot_label(quest: &DailyQuest) -> String {
    match &quest.slot {
        QuestSlot::Mandatory { tier } => format!("tier {tier}"),
        QuestSlot::Rotating { pool } => format!("pool {pool}"),
    }
}

fn reward_note(quest: &DailyQuest) -> &'static str {
    if quest.grants_base { "" } else { " (bonus only today)" }
}

pub fn write_console_boards<W: Write + ?Sized>(
    writer: &mut W,
    boards: &[DailyQuestSet],
) -> Result<()> {
    for board in boards {
        writeln!(
            writer,
            "{}",
            format!("📅 {} ({})", board.date, board.weekday).bright_cyan().bold()
        )?;
        for quest in board.iter() {
            let marker = if quest.required {
                "●".red()
            } else {
                "○".normal()
            };
            let target = quest
                .target
                .as_ref()
                .map(|target| format!(" [{target}]"))
                .unwrap_or_default();
            writeln!(
                writer,
                "  {marker} {:<45} {:<10} {}{target}{}",
                quest.label,
                slot_label(quest),
                quest.skill.dimmed(),
                reward_note(quest)
            )?;
        }
        let at_stake: i64 = board.required().map(|quest| quest.penalty).sum();
        writeln!(writer, "  Penalty at stake: {}", at_stake.to_string().yellow())?;
        writeln!(writer)?;
    }
    Ok(())
}

pub fn write_json_boards<W: Write + ?Sized>(writer: &mut W, boards: &[DailyQuestSet]) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(boards)?)?;
    Ok(())
}

pub fn write_markdown_boards<W: Write + ?Sized>(
    writer: &mut W,
    boards: &[DailyQuestSet],
) -> Result<()> {
    writeln!(writer, "# Questline Quest Boards\n")?;
    for board in boards {
        writeln!(writer, "## {} ({})\n", board.date, board.weekday)?;
        writeln!(writer, "| Quest | Skill | Slot | Required | Penalty |")?;
        writeln!(writer, "|---|---|---|---|---|")?;
        for quest in board.iter() {
            writeln!(
                writer,
                "| {}{} | {} | {} | {} | {} |",
                quest.label,
                reward_note(quest),
                quest.skill,
                slot_label(quest),
                if quest.required { "yes" } else { "no" },
                quest.penalty
            )?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use questline_engine::{EngineConfig, generate_daily_quests};

    fn boards() -> Vec<DailyQuestSet> {
        let cfg = EngineConfig::load_from_static().unwrap();
        // Tuesday then Saturday.
        [20, 24]
            .into_iter()
            .map(|d| generate_daily_quests(&cfg.catalog, NaiveDate::from_ymd_opt(2026, 10, d).unwrap()))
            .collect()
    }

    #[test]
    fn markdown_has_a_table_per_day() {
        let mut buf = Vec::new();
        write_markdown_boards(&mut buf, &boards()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("## 2026-10-20 (Tue)"));
        assert!(text.contains("## 2026-10-24 (Sat)"));
        assert_eq!(text.matches("| Quest | Skill |").count(), 2);
    }

    #[test]
    fn json_round_trips() {
        let boards = boards();
        let mut buf = Vec::new();
        write_json_boards(&mut buf, &boards).unwrap();
        let parsed: Vec<DailyQuestSet> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, boards);
    }

    #[test]
    fn console_flags_reward_only_days() {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        write_console_boards(&mut buf, &boards()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("bonus only today"));
        assert!(text.contains("Penalty at stake"));
    }
}
