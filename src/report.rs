//! Report rendering and export.
//!
//! Turns analysis results into console tables, CSV, JSON and Markdown.

use crate::backtest::WalkForwardReport;
use crate::error::Result;
use crate::periods::{PeriodAggregate, PeriodReport, WEEKDAY_NAMES};
use crate::significance::PeriodSignificance;
use crate::timeframe::{TimeframeReport, TimeframeRow};
use crate::trend::TrendReport;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_infinite() => "inf".to_string(),
        Some(v) => format!("{:.prec$}", v, prec = precision),
        None => "-".to_string(),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "-".to_string(),
    }
}

/// Console table of the ranked timeframe rows, plus the skipped ones with
/// their reasons.
pub fn timeframe_table(report: &TimeframeReport) -> String {
    let mut builder = Builder::new();
    builder.push_record([
        "Timeframe", "Bars", "ATR %", "Cost/ATR", "Pass", "Ann vol", "VR", "Efficiency",
        "AC(1)", "Half-life", "Skew", "Kurtosis",
    ]);
    for row in &report.rows {
        builder.push_record([
            row.timeframe.clone(),
            row.n_bars.to_string(),
            fmt_pct(row.avg_atr_pct),
            fmt_opt(row.cost_atr_ratio, 3),
            match row.cost_pass {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => "-".to_string(),
            },
            fmt_pct(row.ann_volatility),
            fmt_opt(row.variance_ratio, 3),
            fmt_opt(row.market_efficiency, 3),
            fmt_opt(row.autocorr_lag1, 3),
            row.half_life
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string()),
            fmt_opt(row.skewness, 3),
            fmt_opt(row.kurtosis, 3),
        ]);
    }
    let mut out = builder.build().with(Style::rounded()).to_string();
    if !report.skipped.is_empty() {
        out.push('\n');
        for skip in &report.skipped {
            out.push_str(&format!("not evaluated: {} ({})\n", skip.timeframe, skip.reason));
        }
    }
    out
}

/// Console table of walk-forward fold results for one timeframe.
pub fn walkforward_table(timeframe: &str, report: &WalkForwardReport) -> String {
    let mut builder = Builder::new();
    builder.push_record([
        "Fold", "Strategy", "Train Sharpe", "Test Sharpe", "Ann %", "Max DD %", "Hit %",
        "Trades/yr",
    ]);
    for fold in &report.folds {
        builder.push_record([
            fold.fold.to_string(),
            fold.strategy.to_string(),
            format!("{:.2}", fold.train_sharpe),
            fmt_opt(fold.test.sharpe, 2),
            fmt_pct(fold.test.ann_return),
            format!("{:.2}", fold.test.max_drawdown * 100.0),
            fmt_pct(fold.test.hit_rate),
            format!("{:.1}", fold.test.trades_per_year),
        ]);
    }
    builder.push_record([
        "avg".to_string(),
        String::new(),
        String::new(),
        fmt_opt(report.avg_sharpe, 2),
        fmt_pct(report.avg_ann_return),
        report
            .avg_max_drawdown
            .map(|d| format!("{:.2}", d * 100.0))
            .unwrap_or_else(|| "-".to_string()),
        fmt_pct(report.avg_hit_rate),
        report
            .avg_trades_per_year
            .map(|t| format!("{:.1}", t))
            .unwrap_or_else(|| "-".to_string()),
    ]);
    format!(
        "Walk-forward ({})\n{}",
        timeframe,
        builder.build().with(Style::rounded())
    )
}

fn period_rows(builder: &mut Builder, aggregates: &[PeriodAggregate], label: &dyn Fn(u32) -> String) {
    for agg in aggregates {
        builder.push_record([
            label(agg.period_value),
            agg.n_windows.to_string(),
            format!("{:.1}%", agg.trend_share * 100.0),
            format!("{:.1}%", agg.range_share * 100.0),
            fmt_opt(agg.mean_score, 1),
            fmt_pct(agg.mean_return),
            format!("{:.1}%", agg.positive_share * 100.0),
            fmt_opt(agg.mean_adx, 1),
        ]);
    }
}

/// Console tables for the hour/weekday/month breakdowns.
pub fn period_tables(report: &PeriodReport) -> String {
    let header = [
        "Period", "Windows", "Trend", "Range", "Score", "Return", "Pos %", "ADX",
    ];
    let mut out = format!(
        "Period breakdown ({}m windows, {})\n",
        report.window_minutes, report.timezone
    );

    let mut hours = Builder::new();
    hours.push_record(header);
    period_rows(&mut hours, &report.hours, &|v| format!("{:02}:00", v));
    out.push_str(&hours.build().with(Style::rounded()).to_string());
    out.push('\n');

    let mut weekdays = Builder::new();
    weekdays.push_record(header);
    period_rows(&mut weekdays, &report.weekdays, &|v| {
        WEEKDAY_NAMES[v as usize].to_string()
    });
    out.push_str(&weekdays.build().with(Style::rounded()).to_string());
    out.push('\n');

    if !report.months.is_empty() {
        let mut months = Builder::new();
        months.push_record(header);
        period_rows(&mut months, &report.months, &|v| format!("M{:02}", v));
        out.push_str(&months.build().with(Style::rounded()).to_string());
        out.push('\n');
    }

    let d = &report.direction.overall;
    out.push_str(&format!(
        "Trend direction: {} long ({:.1}%) / {} short ({:.1}%)\n",
        d.long_count,
        d.long_share * 100.0,
        d.short_count,
        d.short_share * 100.0
    ));
    out
}

/// ASCII weekday-by-hour heatmap of trend concentration. Darker glyphs
/// mark a higher share of trend-labeled windows; dots are empty cells.
pub fn heatmap_ascii(report: &PeriodReport) -> String {
    const RAMP: [char; 5] = [' ', '.', ':', '*', '#'];
    let mut out = String::from("      ");
    for hour in 0..24 {
        out.push_str(&format!("{:>2}", hour % 24));
    }
    out.push('\n');
    for (day, name) in WEEKDAY_NAMES.iter().enumerate() {
        out.push_str(&format!("{:<5} ", name));
        for hour in 0..24 {
            let glyph = if report.heatmap.counts[day][hour] == 0 {
                '·'
            } else {
                let share = report.heatmap.trend_share[day][hour];
                let level = ((share * (RAMP.len() - 1) as f64).round() as usize)
                    .min(RAMP.len() - 1);
                RAMP[level]
            };
            out.push(' ');
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

/// Console table of significance results across period types.
pub fn significance_table(results: &[PeriodSignificance]) -> String {
    let mut builder = Builder::new();
    builder.push_record(["Grouping", "Groups", "Chi2 p", "ANOVA p", "KW p", "Score CI"]);
    for result in results {
        let p = |t: &Option<crate::significance::TestResult>| match t {
            Some(t) => format!("{:.4}{}", t.p_value, if t.significant { "*" } else { "" }),
            None => "-".to_string(),
        };
        builder.push_record([
            result.period_type.to_string(),
            result.n_groups.to_string(),
            p(&result.chi_square),
            p(&result.anova),
            p(&result.kruskal_wallis),
            result
                .score_ci
                .as_ref()
                .map(|ci| format!("[{:.1}, {:.1}]", ci.lower, ci.upper))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Timeframe rows as CSV text, header included.
pub fn timeframes_csv(report: &TimeframeReport) -> String {
    let mut out = String::from(
        "timeframe,minutes,n_bars,bars_per_year,avg_atr_pct,cost_atr_ratio,cost_pass,ann_volatility,variance_ratio,market_efficiency,autocorr_lag1,half_life,skewness,kurtosis\n",
    );
    for row in &report.rows {
        out.push_str(&timeframe_csv_row(row));
        out.push('\n');
    }
    out
}

/// Export timeframe rows to CSV.
pub fn export_timeframes_csv(report: &TimeframeReport, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write!(writer, "{}", timeframes_csv(report))?;
    Ok(())
}

fn timeframe_csv_row(row: &TimeframeRow) -> String {
    let opt = |v: Option<f64>| v.map(|v| format!("{:.6}", v)).unwrap_or_default();
    format!(
        "{},{},{},{:.2},{},{},{},{},{},{},{},{},{},{}",
        row.timeframe,
        row.minutes,
        row.n_bars,
        row.bars_per_year,
        opt(row.avg_atr_pct),
        opt(row.cost_atr_ratio),
        row.cost_pass
            .map(|p| p.to_string())
            .unwrap_or_default(),
        opt(row.ann_volatility),
        opt(row.variance_ratio),
        opt(row.market_efficiency),
        opt(row.autocorr_lag1),
        row.half_life.map(|h| h.to_string()).unwrap_or_default(),
        opt(row.skewness),
        opt(row.kurtosis),
    )
}

/// Pretty-printed JSON export of any serializable report.
pub fn export_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Markdown summary combining all analysis stages that ran.
pub fn export_markdown(
    path: impl AsRef<Path>,
    timeframes: &TimeframeReport,
    trend: Option<&TrendReport>,
    periods: Option<&PeriodReport>,
    significance: &[PeriodSignificance],
) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    writeln!(w, "# Market Characterization Report\n")?;
    writeln!(w, "## Timeframes\n")?;
    writeln!(
        w,
        "| Timeframe | Bars | ATR % | Cost/ATR | Pass | VR | AC(1) | Half-life |"
    )?;
    writeln!(w, "|---|---|---|---|---|---|---|---|")?;
    for row in &timeframes.rows {
        writeln!(
            w,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            row.timeframe,
            row.n_bars,
            fmt_pct(row.avg_atr_pct),
            fmt_opt(row.cost_atr_ratio, 3),
            match row.cost_pass {
                Some(true) => "yes",
                Some(false) => "no",
                None => "-",
            },
            fmt_opt(row.variance_ratio, 3),
            fmt_opt(row.autocorr_lag1, 3),
            row.half_life
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string()),
        )?;
    }
    for skip in &timeframes.skipped {
        writeln!(w, "\n*{}: not evaluated ({})*", skip.timeframe, skip.reason)?;
    }

    if let Some(trend) = trend {
        writeln!(w, "\n## Trend Windows\n")?;
        writeln!(w, "| Window | Records | Trend | Range | Unclear |")?;
        writeln!(w, "|---|---|---|---|---|")?;
        for window in &trend.windows {
            let n = window.records.len();
            let count = |label| {
                window
                    .records
                    .iter()
                    .filter(|r| r.label == label)
                    .count()
            };
            use crate::types::TrendLabel;
            writeln!(
                w,
                "| {}m | {} | {} | {} | {} |",
                window.window_minutes,
                n,
                count(TrendLabel::Trend),
                count(TrendLabel::Range),
                count(TrendLabel::Unclear),
            )?;
        }
        for skip in &trend.skipped {
            writeln!(
                w,
                "\n*{}m: not evaluated ({})*",
                skip.window_minutes, skip.reason
            )?;
        }
    }

    if let Some(periods) = periods {
        writeln!(w, "\n## Period Breakdown ({})\n", periods.timezone)?;
        writeln!(w, "| Hour | Windows | Trend share | Mean score |")?;
        writeln!(w, "|---|---|---|---|")?;
        for agg in &periods.hours {
            writeln!(
                w,
                "| {:02}:00 | {} | {:.1}% | {} |",
                agg.period_value,
                agg.n_windows,
                agg.trend_share * 100.0,
                fmt_opt(agg.mean_score, 1),
            )?;
        }
        writeln!(w, "\n```text\n{}```", heatmap_ascii(periods))?;
    }

    if !significance.is_empty() {
        writeln!(w, "\n## Significance\n")?;
        writeln!(w, "| Grouping | Chi2 p | ANOVA p | KW p |")?;
        writeln!(w, "|---|---|---|---|")?;
        for result in significance {
            let p = |t: &Option<crate::significance::TestResult>| {
                t.as_ref()
                    .map(|t| format!("{:.4}", t.p_value))
                    .unwrap_or_else(|| "-".to_string())
            };
            writeln!(
                w,
                "| {} | {} | {} | {} |",
                result.period_type,
                p(&result.chi_square),
                p(&result.anova),
                p(&result.kruskal_wallis),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeframe::SkippedTimeframe;

    fn sample_row() -> TimeframeRow {
        TimeframeRow {
            timeframe: "1h".to_string(),
            minutes: 60,
            n_bars: 5000,
            bars_per_year: 8760.0,
            avg_atr_pct: Some(0.004),
            cost_atr_ratio: Some(0.3),
            cost_pass: Some(false),
            ann_volatility: Some(0.45),
            variance_ratio: Some(1.05),
            market_efficiency: Some(1.0 / 1.05),
            autocorr_lag1: Some(-0.02),
            half_life: None,
            skewness: Some(0.1),
            kurtosis: Some(3.5),
        }
    }

    #[test]
    fn test_timeframe_table_includes_skips() {
        let report = TimeframeReport {
            rows: vec![sample_row()],
            skipped: vec![SkippedTimeframe {
                timeframe: "1w".to_string(),
                n_bars: 40,
                required: 156,
                reason: "40 bars of history, 156 required".to_string(),
            }],
        };
        let table = timeframe_table(&report);
        assert!(table.contains("1h"));
        assert!(table.contains("not evaluated: 1w (40 bars of history, 156 required)"));
        assert!(table.contains("0.40%"));
    }

    #[test]
    fn test_fmt_opt_handles_undefined_and_infinite() {
        assert_eq!(fmt_opt(None, 2), "-");
        assert_eq!(fmt_opt(Some(f64::INFINITY), 2), "inf");
        assert_eq!(fmt_opt(Some(1.2345), 2), "1.23");
    }

    #[test]
    fn test_csv_row_empty_fields_for_undefined() {
        let mut row = sample_row();
        row.avg_atr_pct = None;
        row.cost_pass = None;
        let line = timeframe_csv_row(&row);
        // Undefined metrics leave their columns empty instead of faking 0.
        assert!(line.contains(",,"));
        assert!(line.starts_with("1h,60,5000,8760.00,"));
    }

    #[test]
    fn test_json_export_roundtrip() {
        let report = TimeframeReport {
            rows: vec![sample_row()],
            skipped: vec![],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        export_json(&report, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"timeframe\": \"1h\""));
    }
}
