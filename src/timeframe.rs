//! Per-timeframe market characterization.
//!
//! Resamples a base series to each configured timeframe and computes the
//! volatility, cost and memory statistics that decide whether the timeframe
//! is worth trading at all. Timeframes with too little history are recorded
//! as skipped rather than silently dropped.

use crate::config::AnalyzerConfig;
use crate::data::{self, ResampleRule};
use crate::error::Result;
use crate::stats;
use crate::types::Bar;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// Minutes in a (non-leap) year; bars per year = this / bar width.
const MINUTES_PER_YEAR: f64 = 525_600.0;

/// Characterization of a single timeframe. Metrics that cannot be computed
/// from the available data are None, never a placeholder number.
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeRow {
    pub timeframe: String,
    pub minutes: u32,
    pub n_bars: usize,
    pub bars_per_year: f64,
    /// Mean ATR divided by close, as a fraction.
    pub avg_atr_pct: Option<f64>,
    /// Round-trip cost divided by the average ATR fraction.
    pub cost_atr_ratio: Option<f64>,
    /// Whether the cost ratio clears the configured bar (strictly below).
    pub cost_pass: Option<bool>,
    /// Return standard deviation scaled to a year.
    pub ann_volatility: Option<f64>,
    /// Variance ratio of log returns at horizon q.
    pub variance_ratio: Option<f64>,
    /// Reciprocal of the variance ratio.
    pub market_efficiency: Option<f64>,
    pub autocorr_lag1: Option<f64>,
    /// Lag at which the return autocorrelation has halved.
    pub half_life: Option<usize>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

/// A timeframe that was not characterized, with the reason on record.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedTimeframe {
    pub timeframe: String,
    pub n_bars: usize,
    pub required: usize,
    /// Human-readable explanation carried into every export.
    pub reason: String,
}

/// Output of a characterization run: ranked rows plus the skip list.
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeReport {
    pub rows: Vec<TimeframeRow>,
    pub skipped: Vec<SkippedTimeframe>,
}

/// Variance ratio of log returns at aggregation horizon `q`.
///
/// Compares the variance of rolling q-bar return sums against q times the
/// one-bar variance; 1 for a random walk, above 1 for trending series,
/// below 1 for mean-reverting ones. Undefined below q + 2 observations or
/// when the one-bar variance is zero.
pub fn variance_ratio(returns: &[f64], q: usize) -> Option<f64> {
    if q < 2 || returns.len() < q + 2 {
        return None;
    }
    let var_1 = stats::variance(returns)?;
    if var_1 <= 0.0 {
        return None;
    }
    let sums: Vec<f64> = returns.windows(q).map(|w| w.iter().sum()).collect();
    let var_q = stats::variance(&sums)?;
    Some(var_q / (q as f64 * var_1))
}

/// First lag at which the return autocorrelation falls to half its lag-1
/// magnitude.
///
/// Works on demeaned returns with the normalized-sum estimator
/// rho_k = sum(r[t] * r[t-k]) / sum(r^2). Undefined without at least
/// `max_lag + 5` observations, when lag-1 autocorrelation is effectively
/// zero, or when no lag up to `max_lag` reaches the halfway point.
pub fn half_life(returns: &[f64], max_lag: usize) -> Option<usize> {
    if max_lag < 2 || returns.len() < max_lag + 5 {
        return None;
    }
    let m = stats::mean(returns)?;
    let r: Vec<f64> = returns.iter().map(|x| x - m).collect();
    let denom: f64 = r.iter().map(|x| x * x).sum();
    if denom <= 0.0 {
        return None;
    }

    let rho = |k: usize| -> f64 {
        r[k..].iter().zip(&r).map(|(a, b)| a * b).sum::<f64>() / denom
    };

    let rho_1 = rho(1);
    if rho_1.abs() < 1e-6 {
        return None;
    }
    let target = 0.5 * rho_1.abs();

    for k in 2..=max_lag {
        if rho(k).abs() <= target {
            return Some(k);
        }
    }
    None
}

/// Runs the per-timeframe characterization.
pub struct TimeframeAnalyzer<'a> {
    config: &'a AnalyzerConfig,
}

impl<'a> TimeframeAnalyzer<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Characterize every configured timeframe of the base series.
    /// Timeframes run in parallel; the output rows are ranked.
    pub fn analyze(&self, bars: &[Bar]) -> Result<TimeframeReport> {
        info!(
            "Characterizing {} timeframes over {} base bars",
            self.config.analysis.timeframes.len(),
            bars.len()
        );

        let outcomes: Vec<Outcome> = self
            .config
            .analysis
            .timeframes
            .par_iter()
            .map(|label| self.analyze_one(label, bars))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Row(row) => rows.push(row),
                Outcome::Skipped(s) => skipped.push(s),
            }
        }

        rank_rows(&mut rows);
        Ok(TimeframeReport { rows, skipped })
    }

    fn analyze_one(&self, label: &str, bars: &[Bar]) -> Result<Outcome> {
        let rule = ResampleRule::from_label(label)?;
        let minutes = rule.minutes();
        let resampled = data::resample(bars, rule);

        let required = self.config.analysis.min_bars_for(minutes);
        if resampled.len() < required {
            debug!(
                "Skipping {}: {} bars, {} required",
                label,
                resampled.len(),
                required
            );
            return Ok(Outcome::Skipped(SkippedTimeframe {
                timeframe: label.to_string(),
                n_bars: resampled.len(),
                required,
                reason: format!(
                    "{} bars of history, {} required",
                    resampled.len(),
                    required
                ),
            }));
        }

        let returns = data::log_returns(&resampled);
        let atr = data::atr_series(&resampled, self.config.analysis.atr_period);

        let atr_pcts: Vec<f64> = resampled
            .iter()
            .zip(&atr)
            .filter_map(|(bar, a)| match a {
                Some(a) if bar.close > 0.0 => Some(a / bar.close),
                _ => None,
            })
            .collect();
        let avg_atr_pct = stats::mean(&atr_pcts).filter(|v| *v > 0.0);

        let one_way = self
            .config
            .costs
            .one_way_cost(self.config.analysis.market_type);
        let cost_atr_ratio = avg_atr_pct.map(|a| 2.0 * one_way / a);
        let cost_pass = cost_atr_ratio.map(|r| r < self.config.costs.cost_atr_max);

        let vr = variance_ratio(&returns, self.config.analysis.vr_q);
        let market_efficiency = vr.filter(|v| *v > 0.0).map(|v| 1.0 / v);

        let bars_per_year = MINUTES_PER_YEAR / minutes as f64;
        Ok(Outcome::Row(TimeframeRow {
            timeframe: label.to_string(),
            minutes,
            n_bars: resampled.len(),
            bars_per_year,
            avg_atr_pct,
            cost_atr_ratio,
            cost_pass,
            ann_volatility: stats::std_dev(&returns).map(|s| s * bars_per_year.sqrt()),
            variance_ratio: vr,
            market_efficiency,
            autocorr_lag1: stats::autocorrelation(&returns, 1),
            half_life: half_life(&returns, self.config.analysis.half_life_max_lag),
            skewness: stats::skewness(&returns),
            kurtosis: stats::excess_kurtosis(&returns),
        }))
    }
}

enum Outcome {
    Row(TimeframeRow),
    Skipped(SkippedTimeframe),
}

/// Order rows best-first: passing timeframes before failing ones, then by
/// ascending cost ratio, then by descending variance ratio. Rows with an
/// undefined key sort after rows where it is defined.
pub fn rank_rows(rows: &mut [TimeframeRow]) {
    rows.sort_by(|a, b| {
        let pass_rank = |r: &TimeframeRow| match r.cost_pass {
            Some(true) => 0,
            Some(false) => 1,
            None => 2,
        };
        pass_rank(a)
            .cmp(&pass_rank(b))
            .then_with(|| cmp_option(a.cost_atr_ratio, b.cost_atr_ratio, false))
            .then_with(|| cmp_option(a.variance_ratio, b.variance_ratio, true))
    });
}

/// Compare optional floats with None last; `descending` flips the order of
/// defined values.
fn cmp_option(a: Option<f64>, b: Option<f64>, descending: bool) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
