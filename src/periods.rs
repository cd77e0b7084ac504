//! Calendar-period aggregation of trend classifications.
//!
//! Groups trend window records by hour of day, weekday and month in a
//! target timezone, and summarizes long/short direction splits among the
//! trend-labeled windows.

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::stats;
use crate::trend::TrendWindowRecord;
use crate::types::{TrendDirection, TrendLabel};
use chrono::{Datelike, Timelike};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Hour,
    /// 0 = Monday through 6 = Sunday.
    Weekday,
    /// 1 = January through 12 = December.
    Month,
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodType::Hour => write!(f, "hour"),
            PeriodType::Weekday => write!(f, "weekday"),
            PeriodType::Month => write!(f, "month"),
        }
    }
}

pub const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Summary of all windows falling into one calendar bucket.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodAggregate {
    pub period_type: PeriodType,
    pub period_value: u32,
    pub n_windows: usize,
    pub trend_count: usize,
    pub range_count: usize,
    pub unclear_count: usize,
    pub trend_share: f64,
    pub range_share: f64,
    pub unclear_share: f64,
    pub mean_score: Option<f64>,
    pub std_score: Option<f64>,
    pub mean_return: Option<f64>,
    pub std_return: Option<f64>,
    /// Share of windows with a positive cumulative return.
    pub positive_share: f64,
    /// Share of windows with a negative cumulative return.
    pub negative_share: f64,
    pub mean_adx: Option<f64>,
    pub mean_r_squared: Option<f64>,
}

/// Long/short split among trend-labeled windows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectionStats {
    pub long_count: usize,
    pub short_count: usize,
    pub long_share: f64,
    pub short_share: f64,
}

impl DirectionStats {
    fn from_counts(long_count: usize, short_count: usize) -> Self {
        let total = long_count + short_count;
        let (long_share, short_share) = if total > 0 {
            (
                long_count as f64 / total as f64,
                short_count as f64 / total as f64,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            long_count,
            short_count,
            long_share,
            short_share,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionBreakdown {
    pub overall: DirectionStats,
    /// (hour, stats) pairs for hours containing trend windows.
    pub by_hour: Vec<(u32, DirectionStats)>,
    pub by_weekday: Vec<(u32, DirectionStats)>,
}

/// Weekday-by-hour trend concentration. Row 0 is Monday.
#[derive(Debug, Clone, Serialize)]
pub struct TrendHeatmap {
    /// Proportion of trend-labeled windows per cell; 0 where a cell has no
    /// windows at all (see `counts`).
    pub trend_share: Vec<Vec<f64>>,
    pub counts: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodReport {
    pub timezone: String,
    pub window_minutes: u32,
    pub hours: Vec<PeriodAggregate>,
    pub weekdays: Vec<PeriodAggregate>,
    pub months: Vec<PeriodAggregate>,
    pub direction: DirectionBreakdown,
    pub heatmap: TrendHeatmap,
}

/// Direction of a trend-labeled window, from the regression slope.
pub fn direction_of(record: &TrendWindowRecord) -> TrendDirection {
    if record.slope > 0.0 {
        TrendDirection::Long
    } else {
        TrendDirection::Short
    }
}

pub struct PeriodAggregator<'a> {
    config: &'a AnalyzerConfig,
}

impl<'a> PeriodAggregator<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Aggregate the records of one window size across the three calendar
    /// breakdowns. Hour / weekday / month groupings are independent, not a
    /// joint breakdown; only the heatmap crosses weekday with hour.
    pub fn aggregate(&self, records: &[TrendWindowRecord]) -> Result<PeriodReport> {
        let tz = self.config.timezone()?;
        let window_minutes = records.first().map(|r| r.window_minutes).unwrap_or(0);

        // Local calendar coordinates per record, computed once.
        let coords: Vec<(u32, u32, u32)> = records
            .iter()
            .map(|r| {
                let local = r.timestamp.with_timezone(&tz);
                (local.hour(), local.weekday().num_days_from_monday(), local.month())
            })
            .collect();

        let group = |period_type: PeriodType,
                     values: std::ops::Range<u32>,
                     pick: &dyn Fn(&(u32, u32, u32)) -> u32|
         -> Vec<PeriodAggregate> {
            values
                .filter_map(|value| {
                    let members: Vec<&TrendWindowRecord> = records
                        .iter()
                        .zip(&coords)
                        .filter(|(_, c)| pick(c) == value)
                        .map(|(r, _)| r)
                        .collect();
                    if members.is_empty() {
                        None
                    } else {
                        Some(summarize(period_type, value, &members))
                    }
                })
                .collect()
        };

        let hours = group(PeriodType::Hour, 0..24, &|c| c.0);
        let weekdays = group(PeriodType::Weekday, 0..7, &|c| c.1);
        let months = group(PeriodType::Month, 1..13, &|c| c.2);

        let direction = self.direction_breakdown(records, &coords);
        let heatmap = self.heatmap(records, &coords);

        info!(
            "Aggregated {} records in {}: {} active hours, {} weekdays, {} months",
            records.len(),
            tz,
            hours.len(),
            weekdays.len(),
            months.len()
        );

        Ok(PeriodReport {
            timezone: self.config.periods.timezone.clone(),
            window_minutes,
            hours,
            weekdays,
            months,
            direction,
            heatmap,
        })
    }

    fn direction_breakdown(
        &self,
        records: &[TrendWindowRecord],
        coords: &[(u32, u32, u32)],
    ) -> DirectionBreakdown {
        let mut overall = (0usize, 0usize);
        let mut by_hour = vec![(0usize, 0usize); 24];
        let mut by_weekday = vec![(0usize, 0usize); 7];

        for (record, &(hour, weekday, _)) in records.iter().zip(coords) {
            if record.label != TrendLabel::Trend {
                continue;
            }
            let slot = match direction_of(record) {
                TrendDirection::Long => 0,
                TrendDirection::Short => 1,
            };
            let bump = |pair: &mut (usize, usize)| {
                if slot == 0 {
                    pair.0 += 1;
                } else {
                    pair.1 += 1;
                }
            };
            bump(&mut overall);
            bump(&mut by_hour[hour as usize]);
            bump(&mut by_weekday[weekday as usize]);
        }

        let collect = |slots: Vec<(usize, usize)>| -> Vec<(u32, DirectionStats)> {
            slots
                .into_iter()
                .enumerate()
                .filter(|(_, (l, s))| l + s > 0)
                .map(|(i, (l, s))| (i as u32, DirectionStats::from_counts(l, s)))
                .collect()
        };

        DirectionBreakdown {
            overall: DirectionStats::from_counts(overall.0, overall.1),
            by_hour: collect(by_hour),
            by_weekday: collect(by_weekday),
        }
    }

    fn heatmap(
        &self,
        records: &[TrendWindowRecord],
        coords: &[(u32, u32, u32)],
    ) -> TrendHeatmap {
        let mut counts = vec![vec![0usize; 24]; 7];
        let mut trends = vec![vec![0usize; 24]; 7];
        for (record, &(hour, weekday, _)) in records.iter().zip(coords) {
            counts[weekday as usize][hour as usize] += 1;
            if record.label == TrendLabel::Trend {
                trends[weekday as usize][hour as usize] += 1;
            }
        }
        let trend_share = counts
            .iter()
            .zip(&trends)
            .map(|(count_row, trend_row)| {
                count_row
                    .iter()
                    .zip(trend_row)
                    .map(|(&c, &t)| if c > 0 { t as f64 / c as f64 } else { 0.0 })
                    .collect()
            })
            .collect();
        TrendHeatmap {
            trend_share,
            counts,
        }
    }
}

fn summarize(
    period_type: PeriodType,
    period_value: u32,
    members: &[&TrendWindowRecord],
) -> PeriodAggregate {
    let n = members.len();
    let count_label = |label: TrendLabel| members.iter().filter(|r| r.label == label).count();
    let trend_count = count_label(TrendLabel::Trend);
    let range_count = count_label(TrendLabel::Range);
    let unclear_count = count_label(TrendLabel::Unclear);

    let scores: Vec<f64> = members.iter().map(|r| r.trend_score).collect();
    let returns: Vec<f64> = members.iter().map(|r| r.cumulative_return).collect();
    let adx: Vec<f64> = members.iter().map(|r| r.adx).collect();
    let r2: Vec<f64> = members.iter().map(|r| r.r_squared).collect();

    let positive = returns.iter().filter(|r| **r > 0.0).count();
    let negative = returns.iter().filter(|r| **r < 0.0).count();

    PeriodAggregate {
        period_type,
        period_value,
        n_windows: n,
        trend_count,
        range_count,
        unclear_count,
        trend_share: trend_count as f64 / n as f64,
        range_share: range_count as f64 / n as f64,
        unclear_share: unclear_count as f64 / n as f64,
        mean_score: stats::mean(&scores),
        std_score: stats::std_dev(&scores),
        mean_return: stats::mean(&returns),
        std_return: stats::std_dev(&returns),
        positive_share: positive as f64 / n as f64,
        negative_share: negative as f64 / n as f64,
        mean_adx: stats::mean(&adx),
        mean_r_squared: stats::mean(&r2),
    }
}
