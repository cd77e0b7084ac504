//! Property-based tests using proptest for fuzzing and invariant testing.
//!
//! These tests verify that:
//! 1. OHLC constraints survive resampling for any input series
//! 2. Trend scores and classifications stay within their contracts
//! 3. Cost accounting and rank statistics hold under random inputs

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use sextant::backtest::{self, Strategy as TradingStrategy};
use sextant::config::AnalyzerConfig;
use sextant::data::{resample, ResampleRule};
use sextant::significance::benjamini_hochberg;
use sextant::stats;
use sextant::trend::TrendDetector;
use sextant::types::{Bar, TrendLabel};

// ============================================================================
// Generators
// ============================================================================

/// A gapless minute-bar series from a bounded random walk of closes.
fn minute_bar_series(max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(-0.02..0.02f64, 2..max_len).prop_map(|steps| {
        let mut close = 100.0;
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let open = close;
                close = (close * (1.0 + step)).max(1.0);
                let high = open.max(close) * 1.001;
                let low = open.min(close) * 0.999;
                Bar::new(
                    Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
                    open,
                    high,
                    low,
                    close,
                    1000.0,
                )
            })
            .collect()
    })
}

fn p_value_vec() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..=1.0f64, 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // ========================================================================
    // Resampling Invariants
    // ========================================================================

    #[test]
    fn resample_preserves_ohlc_constraints(bars in minute_bar_series(300), width in 2..30u32) {
        let out = resample(&bars, ResampleRule::Minute(width));
        for bar in &out {
            prop_assert!(bar.low <= bar.open && bar.open <= bar.high);
            prop_assert!(bar.low <= bar.close && bar.close <= bar.high);
            prop_assert!(bar.low <= bar.high);
        }
    }

    #[test]
    fn resample_bounds_come_from_source(bars in minute_bar_series(300), width in 2..30u32) {
        let out = resample(&bars, ResampleRule::Minute(width));
        let src_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let src_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        for bar in &out {
            prop_assert!(bar.high <= src_high + 1e-9);
            prop_assert!(bar.low >= src_low - 1e-9);
        }
        prop_assert!(out.len() <= bars.len());
    }

    #[test]
    fn resample_timestamps_are_right_aligned(bars in minute_bar_series(300), width in 2..30u32) {
        let rule = ResampleRule::Minute(width);
        let out = resample(&bars, rule);
        for bar in &out {
            prop_assert_eq!(bar.timestamp.timestamp() % rule.seconds(), 0);
        }
        // Output stays sorted and strictly increasing.
        for pair in out.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn resample_identity_at_native_width(bars in minute_bar_series(200)) {
        // One-minute buckets over one-minute bars change nothing but the
        // label alignment, and these inputs are already aligned.
        let out = resample(&bars, ResampleRule::Minute(1));
        prop_assert_eq!(out.len(), bars.len());
        for (a, b) in out.iter().zip(&bars) {
            prop_assert!((a.close - b.close).abs() < 1e-12);
            prop_assert!((a.volume - b.volume).abs() < 1e-12);
        }
    }

    // ========================================================================
    // Trend Detection Invariants
    // ========================================================================

    #[test]
    fn trend_scores_stay_bounded(bars in minute_bar_series(200)) {
        let mut config = AnalyzerConfig::default();
        config.trend.windows = vec![5];
        let Ok(report) = TrendDetector::new(&config).detect(&bars) else {
            return Ok(());
        };
        for window in &report.windows {
            for record in &window.records {
                prop_assert!((0.0..=100.0).contains(&record.trend_score));
                prop_assert!((0.0..=1.0).contains(&record.r_squared) || record.r_squared <= 1.0 + 1e-9);
                prop_assert!((0.0..=1.0).contains(&record.direction_consistency));
                prop_assert!(matches!(
                    record.label,
                    TrendLabel::Trend | TrendLabel::Range | TrendLabel::Unclear
                ));
            }
        }
    }

    // ========================================================================
    // Backtest Cost Accounting
    // ========================================================================

    #[test]
    fn positions_are_ternary(closes in prop::collection::vec(50.0..150.0f64, 10..100)) {
        let pos = backtest::positions(&closes, TradingStrategy::MaCross { fast: 3, slow: 8 });
        prop_assert_eq!(pos.len(), closes.len());
        prop_assert!(pos.iter().all(|p| (-1..=1).contains(p)));

        let pos = backtest::positions(&closes, TradingStrategy::RsiReversion { period: 5 });
        prop_assert!(pos.iter().all(|p| (-1..=1).contains(p)));
    }

    #[test]
    fn costs_only_reduce_returns(
        closes in prop::collection::vec(50.0..150.0f64, 10..100),
        cost in 0.0..0.01f64
    ) {
        let pos = backtest::positions(&closes, TradingStrategy::MaCross { fast: 3, slow: 8 });
        let free = backtest::net_returns(&closes, &pos, 0.0);
        let paid = backtest::net_returns(&closes, &pos, cost);
        for (f, p) in free.iter().zip(&paid) {
            prop_assert!(p <= f, "cost must never increase a bar's return");
        }
        // Total cost equals turnover times the one-way rate.
        let turnover: f64 = pos
            .windows(2)
            .map(|w| (w[1] as i32 - w[0] as i32).abs() as f64)
            .sum();
        let paid_total: f64 = paid.iter().sum();
        let free_total: f64 = free.iter().sum();
        prop_assert!((free_total - paid_total - turnover * cost).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_is_non_positive(
        net in prop::collection::vec(-0.05..0.05f64, 2..200)
    ) {
        let pos = vec![1i8; net.len() + 1];
        let metrics = backtest::compute_metrics(&net, &pos, 8760.0);
        prop_assert!(metrics.max_drawdown <= 0.0);
        prop_assert!(metrics.max_drawdown >= -1.0);
        prop_assert!(metrics.trades_per_year >= 0.0);
    }

    // ========================================================================
    // Statistics Invariants
    // ========================================================================

    #[test]
    fn ranks_sum_to_triangular_number(data in prop::collection::vec(-100.0..100.0f64, 1..50)) {
        let ranks = stats::rank_with_ties(&data);
        let n = data.len() as f64;
        let sum: f64 = ranks.iter().sum();
        prop_assert!((sum - n * (n + 1.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn percentile_stays_within_bounds(
        mut data in prop::collection::vec(-100.0..100.0f64, 1..50),
        p in 0.0..=1.0f64
    ) {
        data.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let v = stats::percentile_sorted(&data, p).unwrap();
        prop_assert!(v >= data[0] - 1e-9 && v <= data[data.len() - 1] + 1e-9);
    }

    #[test]
    fn benjamini_hochberg_outputs_valid_probabilities(ps in p_value_vec()) {
        let corrected = benjamini_hochberg(&ps, 0.05);
        prop_assert_eq!(corrected.adjusted.len(), ps.len());
        for (&raw, &adj) in ps.iter().zip(&corrected.adjusted) {
            prop_assert!((0.0..=1.0).contains(&adj));
            // Correction never makes a p-value smaller.
            prop_assert!(adj >= raw - 1e-12);
        }
    }
}

// ============================================================================
// Non-proptest Property Verification
// ============================================================================

#[test]
fn verify_variance_ratio_exceeds_one_for_pure_trend() {
    use sextant::timeframe::variance_ratio;
    // Constant positive returns: q-sums scale variance superlinearly.
    let returns: Vec<f64> = (0..500).map(|i| 0.001 + (i % 7) as f64 * 1e-6).collect();
    for q in 2..6 {
        let vr = variance_ratio(&returns, q).unwrap();
        assert!(vr > 1.0, "VR({}) = {} should exceed 1 for a trend", q, vr);
    }
}

#[test]
fn verify_resample_volume_conservation_on_exact_multiple() {
    // 120 aligned minute bars into 10-minute buckets: nothing is dropped.
    // Stamps start at t=60 so the final bar closes the last bucket exactly.
    let bars: Vec<Bar> = (0..120)
        .map(|i| {
            Bar::new(
                Utc.timestamp_opt((i + 1) * 60, 0).unwrap(),
                100.0,
                101.0,
                99.0,
                100.5,
                10.0,
            )
        })
        .collect();
    let out = resample(&bars, ResampleRule::Minute(10));
    assert_eq!(out.len(), 12);
    let total: f64 = out.iter().map(|b| b.volume).sum();
    assert!((total - 1200.0).abs() < 1e-9);
}
