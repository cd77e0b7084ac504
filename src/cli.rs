//! Command-line interface for the market characterization toolkit.

use sextant::backtest::WalkForward;
use sextant::config::AnalyzerConfig;
use sextant::data::{load_csv, resample, save_csv, DataConfig, DataQuality, ResampleRule};
use sextant::error::Result;
use sextant::periods::{PeriodAggregator, PeriodReport};
use sextant::report;
use sextant::significance::{PeriodSignificance, SignificanceTester};
use sextant::timeframe::TimeframeAnalyzer;
use sextant::trend::{TrendDetector, TrendReport, WindowReport};
use sextant::types::Bar;
use sextant::PeriodType;

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Sextant - market characterization for OHLCV series.
#[derive(Parser)]
#[command(name = "sextant")]
#[command(version)]
#[command(about = "Timeframe screening and time-of-day trend analysis for OHLCV data")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank candidate timeframes by cost/volatility trade-off
    Timeframes {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Path to TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also run the walk-forward backtest on each ranked timeframe
        #[arg(short = 'w', long)]
        walk_forward: bool,
    },

    /// Detect trend windows and their calendar concentration
    Trends {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Path to TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Window size (minutes) used for period aggregation; defaults to
        /// the first configured window
        #[arg(short = 'W', long)]
        window: Option<u32>,
    },

    /// Run the full pipeline and optionally export a report bundle
    Analyze {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Path to TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory to write CSV/JSON/Markdown exports into
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Resample a CSV file to a coarser bar size
    Resample {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Target bar size label, e.g. 5m, 1h, 1d
        #[arg(short, long)]
        rule: String,

        /// Output CSV path
        #[arg(short = 'O', long)]
        out: PathBuf,
    },

    /// Validate a data file and report gaps and coverage
    Validate {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Generate an example configuration file
    Init {
        /// Output path for config file
        #[arg(short = 'O', long, default_value = "sextant.toml")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl Cli {
    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Timeframes {
            data,
            config,
            walk_forward,
        } => run_timeframes(data, config, *walk_forward, cli.output),

        Commands::Trends {
            data,
            config,
            window,
        } => run_trends(data, config, *window, cli.output),

        Commands::Analyze {
            data,
            config,
            export,
        } => run_analyze(data, config, export.as_deref()),

        Commands::Resample { data, rule, out } => run_resample(data, rule, out),

        Commands::Validate { data } => validate_data(data),

        Commands::Init { output } => init_config(output),
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => AnalyzerConfig::load(path),
        None => Ok(AnalyzerConfig::default()),
    }
}

fn load_bars(path: &PathBuf) -> Result<Vec<Bar>> {
    info!("Loading data from: {}", path.display());
    load_csv(path, &DataConfig::default())
}

fn run_timeframes(
    data_path: &PathBuf,
    config_path: &Option<PathBuf>,
    walk_forward: bool,
    output: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path)?;
    let bars = load_bars(data_path)?;

    let tf_report = TimeframeAnalyzer::new(&config).analyze(&bars)?;

    match output {
        OutputFormat::Text => println!("{}", report::timeframe_table(&tf_report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tf_report)?),
        OutputFormat::Csv => print!("{}", report::timeframes_csv(&tf_report)),
    }

    if walk_forward {
        let wf = WalkForward::new(&config);
        for row in &tf_report.rows {
            let rule = ResampleRule::from_label(&row.timeframe)?;
            let closes: Vec<f64> = resample(&bars, rule).iter().map(|b| b.close).collect();
            let wf_report = wf.run(&closes, row.bars_per_year);
            match output {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&wf_report)?)
                }
                _ => println!("{}", report::walkforward_table(&row.timeframe, &wf_report)),
            }
        }
    }

    Ok(())
}

/// The window report used for period aggregation: the requested size, or
/// the first one that produced records.
fn pick_window<'a>(trend: &'a TrendReport, requested: Option<u32>) -> Option<&'a WindowReport> {
    match requested {
        Some(minutes) => trend.windows.iter().find(|w| w.window_minutes == minutes),
        None => trend.windows.iter().find(|w| !w.records.is_empty()),
    }
}

fn run_trends(
    data_path: &PathBuf,
    config_path: &Option<PathBuf>,
    window: Option<u32>,
    output: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path)?;
    let bars = load_bars(data_path)?;

    let trend_report = TrendDetector::new(&config).detect(&bars)?;
    let (periods, significance) = aggregate_and_test(&config, &trend_report, window)?;

    match output {
        OutputFormat::Text | OutputFormat::Csv => {
            if let Some(periods) = &periods {
                println!("{}", report::period_tables(periods));
                println!("{}", report::heatmap_ascii(periods));
            } else {
                println!("No trend windows available for period aggregation");
            }
            for skip in &trend_report.skipped {
                println!("not evaluated: {}m ({})", skip.window_minutes, skip.reason);
            }
            if !significance.is_empty() {
                println!("{}", report::significance_table(&significance));
            }
        }
        OutputFormat::Json => {
            let combined = serde_json::json!({
                "trend": trend_report,
                "periods": periods,
                "significance": significance,
            });
            println!("{}", serde_json::to_string_pretty(&combined)?);
        }
    }

    Ok(())
}

fn aggregate_and_test(
    config: &AnalyzerConfig,
    trend: &TrendReport,
    window: Option<u32>,
) -> Result<(Option<PeriodReport>, Vec<PeriodSignificance>)> {
    let Some(window_report) = pick_window(trend, window) else {
        return Ok((None, Vec::new()));
    };

    let periods = PeriodAggregator::new(config).aggregate(&window_report.records)?;

    let tester = SignificanceTester::new(config);
    let mut significance = Vec::new();
    for period_type in [PeriodType::Hour, PeriodType::Weekday, PeriodType::Month] {
        significance.push(tester.evaluate(&window_report.records, period_type)?);
    }

    Ok((Some(periods), significance))
}

fn run_analyze(
    data_path: &PathBuf,
    config_path: &Option<PathBuf>,
    export: Option<&std::path::Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let bars = load_bars(data_path)?;

    let tf_report = TimeframeAnalyzer::new(&config).analyze(&bars)?;
    println!("{}", report::timeframe_table(&tf_report));

    let wf = WalkForward::new(&config);
    for row in &tf_report.rows {
        let rule = ResampleRule::from_label(&row.timeframe)?;
        let closes: Vec<f64> = resample(&bars, rule).iter().map(|b| b.close).collect();
        let wf_report = wf.run(&closes, row.bars_per_year);
        if !wf_report.folds.is_empty() {
            println!("{}", report::walkforward_table(&row.timeframe, &wf_report));
        }
    }

    let trend_report = TrendDetector::new(&config).detect(&bars)?;
    let (periods, significance) = aggregate_and_test(&config, &trend_report, None)?;
    if let Some(periods) = &periods {
        println!("{}", report::period_tables(periods));
        println!("{}", report::heatmap_ascii(periods));
    }
    if !significance.is_empty() {
        println!("{}", report::significance_table(&significance));
    }

    if let Some(dir) = export {
        fs::create_dir_all(dir)?;
        report::export_timeframes_csv(&tf_report, dir.join("timeframes.csv"))?;
        report::export_json(&tf_report, dir.join("timeframes.json"))?;
        report::export_json(&trend_report, dir.join("trend.json"))?;
        if let Some(periods) = &periods {
            report::export_json(periods, dir.join("periods.json"))?;
        }
        report::export_json(&significance, dir.join("significance.json"))?;
        report::export_markdown(
            dir.join("report.md"),
            &tf_report,
            Some(&trend_report),
            periods.as_ref(),
            &significance,
        )?;
        println!("Exported report bundle to {}", dir.display());
    }

    Ok(())
}

fn run_resample(data_path: &PathBuf, rule: &str, out: &PathBuf) -> Result<()> {
    let rule = ResampleRule::from_label(rule)?;
    let bars = load_bars(data_path)?;
    let resampled = resample(&bars, rule);
    save_csv(out, &resampled)?;
    println!(
        "Resampled {} bars to {} {} bars: {}",
        bars.len(),
        resampled.len(),
        rule,
        out.display()
    );
    Ok(())
}

fn validate_data(data_path: &PathBuf) -> Result<()> {
    println!("Validating data file: {}", data_path.display());

    let bars = load_csv(data_path, &DataConfig::default())?;
    let quality = DataQuality::assess(&bars)?;

    println!("\nData Summary:");
    println!("  Rows: {}", quality.total_bars);
    println!("  Start: {}", quality.start);
    println!("  End: {}", quality.end);
    println!("  Bar spacing: {}s", quality.bar_spacing_secs);
    println!("  Coverage: {:.1}%", quality.coverage() * 100.0);
    println!("  Gaps: {}", quality.gaps.len());
    for gap in quality.gaps.iter().take(10) {
        println!("    {} -> {} ({} bars)", gap.from, gap.to, gap.missing_bars);
    }
    if quality.gaps.len() > 10 {
        println!("    ... and {} more", quality.gaps.len() - 10);
    }

    println!("\nValidation: PASSED");
    Ok(())
}

fn init_config(output: &PathBuf) -> Result<()> {
    let example = AnalyzerConfig::example();
    fs::write(output, example)?;
    println!("Created example configuration file: {}", output.display());
    println!("\nEdit this file to customize the analysis, then run:");
    println!("  sextant analyze -d data.csv -c {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_timeframes() {
        let cli = Cli::try_parse_from(["sextant", "timeframes", "-d", "test.csv", "-w"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_trends_with_window() {
        let cli = Cli::try_parse_from(["sextant", "trends", "-d", "test.csv", "-W", "240"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::try_parse_from(["sextant", "init"]);
        assert!(cli.is_ok());
    }
}
