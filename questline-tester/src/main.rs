mod logic;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use questline_engine::{Clock, EngineConfig, SystemClock, generate_daily_quests};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use logic::{LogicTester, ScenarioResult, list_scenarios, select_scenarios};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Simulate seasons against the engine and check expectations
    Simulate,
    /// Print the generated quest boards
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "questline-tester", version)]
#[command(about = "Deterministic simulation harness and quest board preview for Questline")]
struct Args {
    /// What to run
    #[arg(long, value_enum, default_value_t = RunMode::Simulate)]
    mode: RunMode,

    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// Regex matched against scenario names
    #[arg(long)]
    filter: Option<String>,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Iterations per scenario and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Days to simulate, or boards to preview
    #[arg(long, default_value_t = 28)]
    days: u32,

    /// First simulated or previewed date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    if args.report == ReportFormat::Console {
        announce_banner();
    }

    let config = Arc::new(
        EngineConfig::load_from_static().context("bundled catalogs failed to load")?,
    );
    let start = args.start.unwrap_or_else(|| SystemClock.today());

    match args.mode {
        RunMode::Preview => write_preview(&args, &config, start),
        RunMode::Simulate => {
            let start_time = Instant::now();
            let results = run_simulations(&args, &config, start)?;
            write_reports(&args, &results, start_time)?;
            if results.iter().any(|r| !r.passed) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:15} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🗡️  Questline Tester".bright_cyan().bold());
    println!("{}", "====================".cyan());
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_seeds(raw: &str) -> Result<Vec<u64>> {
    split_csv(raw)
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed `{token}`"))
        })
        .collect()
}

fn run_simulations(
    args: &Args,
    config: &Arc<EngineConfig>,
    start: NaiveDate,
) -> Result<Vec<ScenarioResult>> {
    let seeds = parse_seeds(&args.seeds)?;
    let scenarios = select_scenarios(
        &split_csv(&args.scenarios),
        args.filter.as_deref(),
        start,
        args.days,
    )?;
    if scenarios.is_empty() {
        log::warn!("no scenarios matched the selection");
    }

    if args.report == ReportFormat::Console {
        println!("{}", "🧠 Running Simulations".bright_yellow().bold());
        println!("{}", "-".repeat(30).yellow());
    }

    let tester = LogicTester::new(Arc::clone(config), args.verbose);
    Ok(scenarios
        .iter()
        .flat_map(|scenario| tester.run_scenario(scenario, &seeds, args.iterations))
        .collect())
}

fn write_preview(args: &Args, config: &EngineConfig, start: NaiveDate) -> Result<()> {
    let boards: Vec<_> = (0..args.days.max(1))
        .filter_map(|offset| start.checked_add_days(Days::new(u64::from(offset))))
        .map(|date| generate_daily_quests(&config.catalog, date))
        .collect();

    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report {
        ReportFormat::Console => logic::preview::write_console_boards(&mut output_target, &boards)?,
        ReportFormat::Json => logic::preview::write_json_boards(&mut output_target, &boards)?,
        ReportFormat::Markdown => {
            logic::preview::write_markdown_boards(&mut output_target, &boards)?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => logic::reports::generate_json_report(&mut output_target, results)?,
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Questline Simulation Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(&mut output_target, results, duration)?;
            }
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "questline-main-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn base_args() -> Args {
        Args {
            mode: RunMode::Simulate,
            scenarios: "steady".to_string(),
            filter: None,
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            days: 7,
            start: NaiveDate::from_ymd_opt(2026, 10, 19),
            report: ReportFormat::Json,
            verbose: false,
            output: None,
        }
    }

    fn config() -> Arc<EngineConfig> {
        Arc::new(EngineConfig::load_from_static().unwrap())
    }

    #[test]
    fn parses_seed_lists() {
        assert_eq!(parse_seeds("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_seeds("1,abc").is_err());
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" a ,, b"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let mut args = base_args();
        args.list_scenarios = true;
        let path = temp_path("list");
        args.output = Some(path.clone());
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Available scenarios:"));
        assert!(content.contains("flaky-storage"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn simulations_respect_filter() {
        let mut args = base_args();
        args.scenarios = "all".to_string();
        args.filter = Some("^idle$".to_string());
        let start = args.start.unwrap();
        let results = run_simulations(&args, &config(), start).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].scenario_name, "idle");
        assert!(results[0].passed, "{:?}", results[0].failures);
    }

    #[test]
    fn write_reports_emits_json_output() {
        let mut args = base_args();
        let path = temp_path("json");
        args.output = Some(path.clone());
        let start = args.start.unwrap();
        let results = run_simulations(&args, &config(), start).unwrap();
        write_reports(&args, &results, Instant::now()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].passed);
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let mut args = base_args();
        args.report = ReportFormat::Markdown;
        let path = temp_path("md");
        args.output = Some(path.clone());
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("_No scenarios executed._"));
    }

    #[test]
    fn preview_writes_one_board_per_day() {
        let mut args = base_args();
        args.mode = RunMode::Preview;
        args.days = 3;
        let path = temp_path("preview");
        args.output = Some(path.clone());
        let start = args.start.unwrap();
        write_preview(&args, &config(), start).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let boards: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(boards.len(), 3);
        assert_eq!(boards[0]["date"], "2026-10-19");
    }
}
