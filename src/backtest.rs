//! Walk-forward strategy evaluation.
//!
//! A deliberately small strategy set (moving-average crossover and RSI
//! reversion) is grid-searched on each training window and the winner is
//! scored on the following out-of-sample window. The point is not to find a
//! tradable edge but to measure whether a timeframe rewards simple signals
//! after costs.

use crate::config::AnalyzerConfig;
use crate::stats;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

/// Folds with a training window shorter than this are skipped.
const MIN_TRAIN_BARS: usize = 200;
/// Folds with a test window shorter than this are skipped.
const MIN_TEST_BARS: usize = 100;

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

/// A candidate strategy parameterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// Long when the fast moving average is above the slow one.
    MaCross { fast: usize, slow: usize },
    /// Long oversold, short overbought.
    RsiReversion { period: usize },
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::MaCross { fast, slow } => write!(f, "ma({}/{})", fast, slow),
            Strategy::RsiReversion { period } => write!(f, "rsi({})", period),
        }
    }
}

/// Simple moving average aligned to the input; entry i is defined once
/// `period` values exist.
fn sma_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }
    let mut sum: f64 = closes[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// RSI from simple rolling means of up and down moves.
fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }
    let ups: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();
    let downs: Vec<f64> = closes.windows(2).map(|w| (w[0] - w[1]).max(0.0)).collect();

    let mut up_sum: f64 = ups[..period].iter().sum();
    let mut down_sum: f64 = downs[..period].iter().sum();
    for i in period..closes.len() {
        if i > period {
            up_sum += ups[i - 1] - ups[i - period - 1];
            down_sum += downs[i - 1] - downs[i - period - 1];
        }
        let rs = (up_sum / period as f64) / (down_sum / period as f64 + 1e-12);
        out[i] = Some(100.0 - 100.0 / (1.0 + rs));
    }
    out
}

/// Target position per bar: +1, -1 or 0 (flat wherever the signal is
/// undefined).
pub fn positions(closes: &[f64], strategy: Strategy) -> Vec<i8> {
    match strategy {
        Strategy::MaCross { fast, slow } => {
            let fast_ma = sma_series(closes, fast);
            let slow_ma = sma_series(closes, slow);
            fast_ma
                .iter()
                .zip(&slow_ma)
                .map(|(f, s)| match (f, s) {
                    (Some(f), Some(s)) if f > s => 1,
                    (Some(f), Some(s)) if f < s => -1,
                    _ => 0,
                })
                .collect()
        }
        Strategy::RsiReversion { period } => rsi_series(closes, period)
            .iter()
            .map(|r| match r {
                Some(r) if *r < RSI_OVERSOLD => 1,
                Some(r) if *r > RSI_OVERBOUGHT => -1,
                _ => 0,
            })
            .collect(),
    }
}

/// Net per-bar returns: the previous bar's position earns this bar's simple
/// return, and every unit of position change pays the one-way cost. The
/// output is aligned to bars 1..n.
pub fn net_returns(closes: &[f64], positions: &[i8], one_way_cost: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len().saturating_sub(1));
    for t in 1..closes.len() {
        let ret = if closes[t - 1] != 0.0 {
            closes[t] / closes[t - 1] - 1.0
        } else {
            0.0
        };
        let turnover = (positions[t] as i32 - positions[t - 1] as i32).abs() as f64;
        out.push(positions[t - 1] as f64 * ret - turnover * one_way_cost);
    }
    out
}

/// Performance summary of one return stream.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestMetrics {
    pub sharpe: Option<f64>,
    pub ann_return: Option<f64>,
    /// Largest peak-to-trough equity drop, as a non-positive fraction.
    pub max_drawdown: f64,
    /// Gross profit over gross loss; +inf with gains and no losses, None
    /// with neither.
    pub profit_factor: Option<f64>,
    /// Share of nonzero-return bars that gained. None when every bar was
    /// flat.
    pub hit_rate: Option<f64>,
    pub trades_per_year: f64,
    /// Mean position change per bar, in position units.
    pub avg_turnover: f64,
    pub n_bars: usize,
}

/// Score a net return stream. `positions` must cover the same bars plus the
/// bar before the first return.
pub fn compute_metrics(net: &[f64], positions: &[i8], bars_per_year: f64) -> BacktestMetrics {
    let n = net.len();

    let sharpe = match (stats::mean(net), stats::std_dev(net)) {
        (Some(m), Some(s)) if s > 0.0 => Some(m / s * bars_per_year.sqrt()),
        _ => None,
    };

    let mut equity = 1.0f64;
    let mut peak = 1.0f64;
    let mut max_drawdown = 0.0f64;
    for r in net {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        if peak > 0.0 {
            max_drawdown = max_drawdown.min(equity / peak - 1.0);
        }
    }

    let ann_return = if n > 0 && equity > 0.0 {
        Some(equity.powf(bars_per_year / n as f64) - 1.0)
    } else {
        None
    };

    let gross_profit: f64 = net.iter().filter(|r| **r > 0.0).sum();
    let gross_loss: f64 = -net.iter().filter(|r| **r < 0.0).sum::<f64>();
    let profit_factor = if gross_loss > 0.0 {
        Some(gross_profit / gross_loss)
    } else if gross_profit > 0.0 {
        Some(f64::INFINITY)
    } else {
        None
    };

    let wins = net.iter().filter(|r| **r > 0.0).count();
    let losses = net.iter().filter(|r| **r < 0.0).count();
    let hit_rate = if wins + losses > 0 {
        Some(wins as f64 / (wins + losses) as f64)
    } else {
        None
    };

    let turnover: i64 = positions
        .windows(2)
        .map(|w| (w[1] as i64 - w[0] as i64).abs())
        .sum();
    let (trades_per_year, avg_turnover) = if n > 0 {
        (
            turnover as f64 / 2.0 * bars_per_year / n as f64,
            turnover as f64 / n as f64,
        )
    } else {
        (0.0, 0.0)
    };

    BacktestMetrics {
        sharpe,
        ann_return,
        max_drawdown,
        profit_factor,
        hit_rate,
        trades_per_year,
        avg_turnover,
        n_bars: n,
    }
}

/// One out-of-sample fold.
#[derive(Debug, Clone, Serialize)]
pub struct FoldResult {
    pub fold: usize,
    /// Grid winner on the training window.
    pub strategy: Strategy,
    pub train_sharpe: f64,
    pub test: BacktestMetrics,
}

/// Walk-forward output: per-fold results and their averages.
#[derive(Debug, Clone, Serialize)]
pub struct WalkForwardReport {
    pub folds: Vec<FoldResult>,
    pub avg_sharpe: Option<f64>,
    pub avg_ann_return: Option<f64>,
    pub avg_max_drawdown: Option<f64>,
    pub avg_hit_rate: Option<f64>,
    pub avg_trades_per_year: Option<f64>,
}

/// Runs the walk-forward evaluation for one close series.
pub struct WalkForward<'a> {
    config: &'a AnalyzerConfig,
    one_way_cost: f64,
}

impl<'a> WalkForward<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        let one_way_cost = config.costs.one_way_cost(config.analysis.market_type);
        Self {
            config,
            one_way_cost,
        }
    }

    /// All candidate strategies. Crossover pairs where the slow period does
    /// not exceed the fast one are dropped.
    fn grid(&self) -> Vec<Strategy> {
        let bt = &self.config.backtest;
        let mut grid = Vec::new();
        for &fast in &bt.fast_periods {
            for &slow in &bt.slow_periods {
                if slow > fast {
                    grid.push(Strategy::MaCross { fast, slow });
                }
            }
        }
        for &period in &bt.rsi_periods {
            grid.push(Strategy::RsiReversion { period });
        }
        grid
    }

    /// Highest-Sharpe strategy on a window. None when no candidate produces
    /// a defined Sharpe ratio.
    fn best_on(&self, closes: &[f64], bars_per_year: f64) -> Option<(Strategy, f64)> {
        self.grid()
            .par_iter()
            .filter_map(|&strategy| {
                let pos = positions(closes, strategy);
                let net = net_returns(closes, &pos, self.one_way_cost);
                let metrics = compute_metrics(&net, &pos, bars_per_year);
                metrics.sharpe.map(|s| (strategy, s))
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Run the walk-forward over a close series. Windows advance by the
    /// test length; folds that are too short to be meaningful are skipped.
    pub fn run(&self, closes: &[f64], bars_per_year: f64) -> WalkForwardReport {
        let n = closes.len();
        let train_len = (n as f64 * self.config.backtest.train_ratio) as usize;
        let test_len = (n as f64 * self.config.backtest.test_ratio) as usize;

        let mut folds = Vec::new();
        let mut start = 0;
        let mut fold_idx = 0;
        while start + train_len + test_len <= n {
            fold_idx += 1;
            if train_len < MIN_TRAIN_BARS || test_len < MIN_TEST_BARS {
                debug!(
                    "Skipping fold {}: train {} / test {} below minimums",
                    fold_idx, train_len, test_len
                );
                start += test_len.max(1);
                continue;
            }

            let train = &closes[start..start + train_len];
            if let Some((strategy, train_sharpe)) = self.best_on(train, bars_per_year) {
                // Signals see the whole window so the test region starts
                // with warmed-up indicators; only test returns are scored.
                let window = &closes[start..start + train_len + test_len];
                let pos = positions(window, strategy);
                let net = net_returns(window, &pos, self.one_way_cost);
                let test_net = &net[net.len() - test_len..];
                let test_pos = &pos[pos.len() - test_len - 1..];
                let test = compute_metrics(test_net, test_pos, bars_per_year);

                folds.push(FoldResult {
                    fold: fold_idx,
                    strategy,
                    train_sharpe,
                    test,
                });
            } else {
                debug!("Skipping fold {}: no strategy produced a Sharpe", fold_idx);
            }

            start += test_len;
        }

        let avg = |f: &dyn Fn(&FoldResult) -> Option<f64>| -> Option<f64> {
            let vals: Vec<f64> = folds.iter().filter_map(|r| f(r)).collect();
            stats::mean(&vals)
        };

        WalkForwardReport {
            avg_sharpe: avg(&|r| r.test.sharpe),
            avg_ann_return: avg(&|r| r.test.ann_return),
            avg_max_drawdown: avg(&|r| Some(r.test.max_drawdown)),
            avg_hit_rate: avg(&|r| r.test.hit_rate),
            avg_trades_per_year: avg(&|r| Some(r.test.trades_per_year)),
            folds,
        }
    }
}
