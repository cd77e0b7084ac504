//! Rolling trend detection.
//!
//! Each configured window size W first resamples the base series to
//! W-minute bars, then slides a W-bar trailing window over that series. A
//! composite score is built from the regression fit of log prices, ADX,
//! directional consistency and the range-to-volatility ratio, and the
//! window is classified as trending, ranging or unclear.

use crate::config::AnalyzerConfig;
use crate::data::{self, DataQuality, ResampleRule};
use crate::error::{AnalysisError, Result};
use crate::stats;
use crate::types::{Bar, TrendLabel};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Classification cut-offs. The defaults are policy constants tuned against
/// the simple-mean ADX in [`adx_series`]; changing one without the other
/// shifts the label boundaries.
#[derive(Debug, Clone, Serialize)]
pub struct TrendThresholds {
    /// Minimum score for the trend label.
    pub trend_score_min: f64,
    /// Minimum |t-statistic| of the regression slope for the trend label.
    pub trend_t_stat_min: f64,
    /// Maximum score for the range label.
    pub range_score_max: f64,
    /// Maximum ADX for the range label.
    pub range_adx_max: f64,
    /// Range label requires |cumulative return| below this multiple of the
    /// realized window volatility.
    pub range_ret_vol_max: f64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            trend_score_min: 60.0,
            trend_t_stat_min: 2.0,
            range_score_max: 40.0,
            range_adx_max: 18.0,
            range_ret_vol_max: 0.8,
        }
    }
}

/// One classified rolling window, anchored at its final bar.
#[derive(Debug, Clone, Serialize)]
pub struct TrendWindowRecord {
    pub window_minutes: u32,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub trend_score: f64,
    pub r_squared: f64,
    pub slope: f64,
    pub slope_t_stat: f64,
    pub adx: f64,
    pub direction_consistency: f64,
    pub range_vol_ratio: f64,
    pub cumulative_return: f64,
    pub realized_volatility: f64,
    pub label: TrendLabel,
}

/// A window size that could not be evaluated, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedWindow {
    pub window_minutes: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub window_minutes: u32,
    /// Rolling span in bars of the resampled series.
    pub window_bars: usize,
    pub records: Vec<TrendWindowRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub windows: Vec<WindowReport>,
    pub skipped: Vec<SkippedWindow>,
}

/// ADX over the full series using simple rolling means for the True Range,
/// directional movement and DX smoothing. Entry i is defined once enough
/// history exists (roughly two smoothing periods).
pub fn adx_series(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    let mut out = vec![None; n];
    if period == 0 || n < 2 * period + 1 {
        return out;
    }

    // Per-bar TR and +DM/-DM, aligned so index i describes the move into
    // bar i (index 0 unused).
    let mut tr = vec![0.0; n];
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let prev = &bars[i - 1];
        let cur = &bars[i];
        tr[i] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    // DX from rolling-mean DI values.
    let mut dx = vec![None; n];
    let mut tr_sum: f64 = tr[1..=period].iter().sum();
    let mut plus_sum: f64 = plus_dm[1..=period].iter().sum();
    let mut minus_sum: f64 = minus_dm[1..=period].iter().sum();
    for i in period..n {
        if i > period {
            tr_sum += tr[i] - tr[i - period];
            plus_sum += plus_dm[i] - plus_dm[i - period];
            minus_sum += minus_dm[i] - minus_dm[i - period];
        }
        if tr_sum > 0.0 {
            let plus_di = 100.0 * plus_sum / tr_sum;
            let minus_di = 100.0 * minus_sum / tr_sum;
            let di_sum = plus_di + minus_di;
            if di_sum > 0.0 {
                dx[i] = Some(100.0 * (plus_di - minus_di).abs() / di_sum);
            } else {
                dx[i] = Some(0.0);
            }
        }
    }

    // ADX is the rolling mean of the last `period` defined DX values.
    for i in (2 * period - 1)..n {
        let window: Vec<f64> = dx[i + 1 - period..=i].iter().flatten().copied().collect();
        if window.len() == period {
            out[i] = stats::mean(&window);
        }
    }
    out
}

/// Detects rolling trend windows across the configured window sizes.
pub struct TrendDetector<'a> {
    config: &'a AnalyzerConfig,
    thresholds: TrendThresholds,
}

impl<'a> TrendDetector<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        Self {
            config,
            thresholds: TrendThresholds::default(),
        }
    }

    pub fn with_thresholds(config: &'a AnalyzerConfig, thresholds: TrendThresholds) -> Self {
        Self { config, thresholds }
    }

    /// Classify every rolling window of every configured size. Window sizes
    /// that do not fit the series' bar spacing are reported as skipped.
    pub fn detect(&self, bars: &[Bar]) -> Result<TrendReport> {
        if bars.len() < 2 {
            return Err(AnalysisError::NoData);
        }
        let quality = DataQuality::assess(bars)?;
        let bar_minutes = (quality.bar_spacing_secs / 60).max(1) as u32;

        let outcomes: Vec<std::result::Result<WindowReport, SkippedWindow>> = self
            .config
            .trend
            .windows
            .par_iter()
            .map(|&window_minutes| self.detect_window(bars, window_minutes, bar_minutes))
            .collect();

        let mut windows = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(report) => windows.push(report),
                Err(skip) => {
                    warn!(
                        "Window {}m not evaluated: {}",
                        skip.window_minutes, skip.reason
                    );
                    skipped.push(skip);
                }
            }
        }
        info!(
            "Trend detection complete: {} window sizes, {} skipped",
            windows.len(),
            skipped.len()
        );
        Ok(TrendReport { windows, skipped })
    }

    /// Resamples the base series to `window_minutes`-wide bars and slides a
    /// `window_minutes`-bar trailing window over the result, so a 60-minute
    /// window means 60 hourly bars. Returns and ADX come from the same
    /// resampled series.
    fn detect_window(
        &self,
        bars: &[Bar],
        window_minutes: u32,
        bar_minutes: u32,
    ) -> std::result::Result<WindowReport, SkippedWindow> {
        if window_minutes == 0 || window_minutes % bar_minutes != 0 {
            return Err(SkippedWindow {
                window_minutes,
                reason: format!("not a multiple of the {}m bar spacing", bar_minutes),
            });
        }
        let resampled = data::resample(bars, ResampleRule::Minute(window_minutes));
        let window_bars = window_minutes as usize;
        if resampled.len() <= window_bars {
            return Err(SkippedWindow {
                window_minutes,
                reason: format!(
                    "needs more than {} resampled bars, have {}",
                    window_bars,
                    resampled.len()
                ),
            });
        }

        let returns = data::simple_returns(&resampled);
        let adx = adx_series(&resampled, self.config.trend.adx_period);

        let mut records = Vec::with_capacity(resampled.len() - window_bars);
        for i in window_bars..resampled.len() {
            let window = &resampled[i - window_bars..=i];
            if let Some(record) = self.classify_window(
                window,
                &returns[i - window_bars..=i],
                adx[i].unwrap_or(0.0),
                window_minutes,
            ) {
                records.push(record);
            }
        }
        debug!(
            "Window {}m: {} records over {} resampled bars",
            window_minutes,
            records.len(),
            resampled.len()
        );
        Ok(WindowReport {
            window_minutes,
            window_bars,
            records,
        })
    }

    fn classify_window(
        &self,
        window: &[Bar],
        window_returns: &[Option<f64>],
        adx: f64,
        window_minutes: u32,
    ) -> Option<TrendWindowRecord> {
        let last = window.last()?;
        if window.iter().any(|b| b.close <= 0.0) {
            return None;
        }

        let log_closes: Vec<f64> = window.iter().map(|b| b.close.ln()).collect();
        let fit = stats::linear_fit(&log_closes)?;
        // A residual-free fit with a nonzero slope is an exact trend.
        let slope_t_stat = if window.len() < 3 {
            0.0
        } else if fit.std_err > 0.0 {
            fit.slope.abs() / fit.std_err
        } else if fit.slope.abs() > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let rets: Vec<f64> = window_returns.iter().flatten().copied().collect();
        if rets.is_empty() {
            return None;
        }
        let positive = rets.iter().filter(|r| **r > 0.0).count();
        let negative = rets.iter().filter(|r| **r < 0.0).count();
        let direction_consistency = positive.max(negative) as f64 / rets.len() as f64;

        let cumulative_return: f64 = rets.iter().sum();
        let realized_volatility = rets.iter().map(|r| r * r).sum::<f64>().sqrt();

        let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range_vol_ratio = if realized_volatility > 0.0 {
            (high - low) / realized_volatility
        } else {
            0.0
        };

        let trend_score = (35.0 * fit.r_squared
            + 25.0 * adx.min(50.0) / 50.0
            + 20.0 * direction_consistency
            + 20.0 * (range_vol_ratio / 3.0).min(1.0))
        .min(100.0);

        // Trend takes precedence when both predicates hold.
        let t = &self.thresholds;
        let label = if trend_score >= t.trend_score_min && slope_t_stat >= t.trend_t_stat_min {
            TrendLabel::Trend
        } else if trend_score <= t.range_score_max
            && adx <= t.range_adx_max
            && cumulative_return.abs() <= t.range_ret_vol_max * realized_volatility
        {
            TrendLabel::Range
        } else {
            TrendLabel::Unclear
        };

        Some(TrendWindowRecord {
            window_minutes,
            timestamp: last.timestamp,
            close: last.close,
            trend_score,
            r_squared: fit.r_squared,
            slope: fit.slope,
            slope_t_stat,
            adx,
            direction_consistency,
            range_vol_ratio,
            cumulative_return,
            realized_volatility,
            label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(minute: i64, close: f64) -> Bar {
        let ts = Utc.timestamp_opt(minute * 60, 0).unwrap();
        Bar::new(ts, close, close * 1.001, close * 0.999, close, 1.0)
    }

    fn drift_bars(n: usize) -> Vec<Bar> {
        let mut close = 100.0;
        (0..n)
            .map(|i| {
                close *= 1.0001;
                bar(i as i64, close)
            })
            .collect()
    }

    fn chop_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + if i % 2 == 0 { 0.01 } else { -0.01 };
                bar(i as i64, close)
            })
            .collect()
    }

    fn config_with_windows(windows: Vec<u32>) -> AnalyzerConfig {
        let mut config = AnalyzerConfig::default();
        config.trend.windows = windows;
        config
    }

    #[test]
    fn test_adx_strong_trend_vs_chop() {
        let trending = drift_bars(200);
        let adx_trend = adx_series(&trending, 14);
        let last_trend = adx_trend.last().unwrap().unwrap();
        // One-sided movement drives DX to 100.
        assert!(last_trend > 80.0);

        let choppy = chop_bars(200);
        let adx_chop = adx_series(&choppy, 14);
        let last_chop = adx_chop.last().unwrap().unwrap();
        assert!(last_chop < last_trend);
    }

    #[test]
    fn test_adx_short_series_undefined() {
        let bars = drift_bars(20);
        let adx = adx_series(&bars, 14);
        assert!(adx.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_deterministic_drift_classifies_trend() {
        let bars = drift_bars(400);
        let config = config_with_windows(vec![5]);
        let report = TrendDetector::new(&config).detect(&bars).unwrap();
        assert_eq!(report.windows.len(), 1);
        let records = &report.windows[0].records;
        assert!(!records.is_empty());
        for r in records {
            // Noise-free drift: near-perfect fit, fully one-sided.
            assert!(r.r_squared > 0.99);
            assert!((r.direction_consistency - 1.0).abs() < 1e-12);
            assert!(r.slope > 0.0);
            assert_eq!(r.label, TrendLabel::Trend);
        }
    }

    #[test]
    fn test_score_bounds() {
        let bars = chop_bars(400);
        let config = config_with_windows(vec![5, 10]);
        let report = TrendDetector::new(&config).detect(&bars).unwrap();
        assert_eq!(report.windows.len(), 2);
        for window in &report.windows {
            for r in &window.records {
                assert!((0.0..=100.0).contains(&r.trend_score));
            }
        }
    }

    #[test]
    fn test_short_series_window_skipped_with_reason() {
        // 100 minutes resample to two 90m bars, far short of the 90-bar
        // rolling span.
        let bars = drift_bars(100);
        let config = config_with_windows(vec![5, 90]);
        let report = TrendDetector::new(&config).detect(&bars).unwrap();
        assert_eq!(report.windows.len(), 1);
        assert_eq!(report.windows[0].window_minutes, 5);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].window_minutes, 90);
        assert!(report.skipped[0].reason.contains("resampled bars"));
    }

    #[test]
    fn test_window_off_the_bar_grid_is_skipped() {
        // Hourly bars cannot back a 90-minute window.
        let bars: Vec<Bar> = (0..50).map(|i| bar(i * 60, 100.0 + i as f64)).collect();
        let config = config_with_windows(vec![90]);
        let report = TrendDetector::new(&config).detect(&bars).unwrap();
        assert!(report.windows.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("multiple"));
    }

    #[test]
    fn test_hourly_window_runs_on_hourly_bars() {
        // Ten days of minute data resample to 240 hourly bars; a 60-minute
        // window slides 60 of those, leaving 180 records stamped on the
        // hourly grid.
        let bars = drift_bars(14_400);
        let config = config_with_windows(vec![60]);
        let report = TrendDetector::new(&config).detect(&bars).unwrap();
        assert_eq!(report.windows.len(), 1);
        let window = &report.windows[0];
        assert_eq!(window.window_bars, 60);
        assert_eq!(window.records.len(), 180);
        for r in &window.records {
            assert_eq!(r.timestamp.timestamp() % 3600, 0);
        }
        assert_eq!(window.records[0].timestamp.timestamp(), 60 * 3600);
        assert_eq!(
            window.records.last().unwrap().timestamp.timestamp(),
            239 * 3600
        );
    }

    #[test]
    fn test_trend_precedence_over_range() {
        // Thresholds arranged so both predicates pass; trend must win.
        let bars = drift_bars(400);
        let config = config_with_windows(vec![5]);
        let thresholds = TrendThresholds {
            trend_score_min: 0.0,
            trend_t_stat_min: 0.0,
            range_score_max: 100.0,
            range_adx_max: 100.0,
            range_ret_vol_max: 1000.0,
        };
        let report = TrendDetector::with_thresholds(&config, thresholds)
            .detect(&bars)
            .unwrap();
        for r in &report.windows[0].records {
            assert_eq!(r.label, TrendLabel::Trend);
        }
    }
}
