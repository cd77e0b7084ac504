//! Analyzer configuration.
//!
//! All knobs live in one TOML file so a run can be reproduced exactly.
//! The config is read once at startup and treated as immutable afterwards.

use crate::data::ResampleRule;
use crate::error::{AnalysisError, Result};
use crate::types::MarketType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete analyzer configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Timeframe characterization settings.
    #[serde(default)]
    pub analysis: AnalysisSettings,
    /// Trading cost settings.
    #[serde(default)]
    pub costs: CostSettings,
    /// Walk-forward backtest settings.
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Trend detection settings.
    #[serde(default)]
    pub trend: TrendSettings,
    /// Time-of-day / day-of-week aggregation settings.
    #[serde(default)]
    pub periods: PeriodSettings,
}

/// Timeframe characterization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Timeframes to characterize, as labels like "5m" or "4h".
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,
    /// Market type, used for default fees.
    #[serde(default)]
    pub market_type: MarketType,
    /// ATR lookback in bars.
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Aggregation horizon q for the variance ratio.
    #[serde(default = "default_vr_q")]
    pub vr_q: usize,
    /// Largest lag probed when estimating the autocorrelation half-life.
    #[serde(default = "default_half_life_max_lag")]
    pub half_life_max_lag: usize,
    /// Scale the minimum bar requirement with the timeframe. When false,
    /// `fixed_min_bars` applies to every timeframe.
    #[serde(default = "default_true")]
    pub dynamic_min_bars: bool,
    /// Minimum bar count used when `dynamic_min_bars` is off, and the
    /// fallback for timeframes without a history rule.
    #[serde(default = "default_fixed_min_bars")]
    pub fixed_min_bars: usize,
}

fn default_timeframes() -> Vec<String> {
    ["1m", "5m", "15m", "1h", "4h", "1d", "1w"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_atr_period() -> usize {
    14
}
fn default_vr_q() -> usize {
    4
}
fn default_half_life_max_lag() -> usize {
    100
}
fn default_true() -> bool {
    true
}
fn default_fixed_min_bars() -> usize {
    1500
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            timeframes: default_timeframes(),
            market_type: MarketType::default(),
            atr_period: 14,
            vr_q: 4,
            half_life_max_lag: 100,
            dynamic_min_bars: true,
            fixed_min_bars: 1500,
        }
    }
}

/// Days of history a timeframe needs for its statistics to settle.
/// Coarser bars need proportionally more calendar time.
const MIN_HISTORY_DAYS: &[(u32, u64)] = &[
    (1, 30),
    (5, 60),
    (15, 90),
    (60, 180),
    (240, 365),
    (1440, 730),
    (10080, 1095),
];

impl AnalysisSettings {
    /// Minimum number of bars required before a timeframe is characterized.
    /// Dynamic mode converts a per-width history requirement into bars,
    /// floored at 100 so tiny tables never pass.
    pub fn min_bars_for(&self, bar_minutes: u32) -> usize {
        if !self.dynamic_min_bars || bar_minutes == 0 {
            return self.fixed_min_bars;
        }
        match MIN_HISTORY_DAYS.iter().find(|(m, _)| *m == bar_minutes) {
            Some((_, days)) => {
                let bars = days * 1440 / bar_minutes as u64;
                (bars as usize).max(100)
            }
            None => self.fixed_min_bars,
        }
    }
}

/// Trading cost settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSettings {
    /// Taker fee as a fraction. Defaults to the market type's standard fee.
    #[serde(default)]
    pub taker_fee: Option<f64>,
    /// Maker fee as a fraction. Defaults to the market type's standard fee.
    #[serde(default)]
    pub maker_fee: Option<f64>,
    /// Whether trades are assumed to cross the spread (taker).
    #[serde(default = "default_true")]
    pub use_taker: bool,
    /// Slippage per side, in basis points.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: f64,
    /// Cost-to-ATR ratio a timeframe must stay strictly below to pass.
    #[serde(default = "default_cost_atr_max")]
    pub cost_atr_max: f64,
}

fn default_slippage_bps() -> f64 {
    2.0
}
fn default_cost_atr_max() -> f64 {
    0.25
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            taker_fee: None,
            maker_fee: None,
            use_taker: true,
            slippage_bps: 2.0,
            cost_atr_max: 0.25,
        }
    }
}

impl CostSettings {
    /// Total one-way cost as a fraction: fee plus slippage.
    pub fn one_way_cost(&self, market: MarketType) -> f64 {
        let fee = if self.use_taker {
            self.taker_fee.unwrap_or_else(|| market.default_taker_fee())
        } else {
            self.maker_fee.unwrap_or_else(|| market.default_maker_fee())
        };
        fee + self.slippage_bps / 10_000.0
    }
}

/// Walk-forward backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Fast periods in the moving-average crossover grid.
    #[serde(default = "default_fast_periods")]
    pub fast_periods: Vec<usize>,
    /// Slow periods in the moving-average crossover grid.
    #[serde(default = "default_slow_periods")]
    pub slow_periods: Vec<usize>,
    /// Lookbacks in the RSI reversion grid.
    #[serde(default = "default_rsi_periods")]
    pub rsi_periods: Vec<usize>,
    /// Fraction of the series used to fit each fold.
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    /// Fraction of the series evaluated out-of-sample per fold.
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
}

fn default_fast_periods() -> Vec<usize> {
    vec![5, 10, 20]
}
fn default_slow_periods() -> Vec<usize> {
    vec![20, 50, 100]
}
fn default_rsi_periods() -> Vec<usize> {
    vec![7, 14, 21]
}
fn default_train_ratio() -> f64 {
    0.6
}
fn default_test_ratio() -> f64 {
    0.2
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            fast_periods: default_fast_periods(),
            slow_periods: default_slow_periods(),
            rsi_periods: default_rsi_periods(),
            train_ratio: 0.6,
            test_ratio: 0.2,
        }
    }
}

/// Trend detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSettings {
    /// Window sizes in minutes.
    #[serde(default = "default_trend_windows")]
    pub windows: Vec<u32>,
    /// ADX lookback in bars.
    #[serde(default = "default_adx_period")]
    pub adx_period: usize,
}

fn default_trend_windows() -> Vec<u32> {
    vec![60, 240, 1440]
}
fn default_adx_period() -> usize {
    14
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            windows: default_trend_windows(),
            adx_period: 14,
        }
    }
}

/// Time-period aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSettings {
    /// IANA timezone the hour/weekday buckets are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Bootstrap replicates for confidence intervals.
    #[serde(default = "default_bootstrap_reps")]
    pub bootstrap_reps: usize,
    /// Seed for the bootstrap RNG. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Significance level for hypothesis tests.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_bootstrap_reps() -> usize {
    1000
}
fn default_alpha() -> f64 {
    0.05
}

impl Default for PeriodSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            bootstrap_reps: 1000,
            seed: None,
            alpha: 0.05,
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: AnalyzerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AnalysisError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        for label in &self.analysis.timeframes {
            ResampleRule::from_label(label)?;
        }
        if self.analysis.atr_period == 0 {
            return Err(AnalysisError::Config("atr_period must be positive".into()));
        }
        if self.analysis.vr_q < 2 {
            return Err(AnalysisError::Config("vr_q must be at least 2".into()));
        }
        if self.analysis.half_life_max_lag < 2 {
            return Err(AnalysisError::Config(
                "half_life_max_lag must be at least 2".into(),
            ));
        }
        if let Some(fee) = self.costs.taker_fee {
            if fee < 0.0 {
                return Err(AnalysisError::Config("taker_fee must be >= 0".into()));
            }
        }
        if let Some(fee) = self.costs.maker_fee {
            if fee < 0.0 {
                return Err(AnalysisError::Config("maker_fee must be >= 0".into()));
            }
        }
        if self.costs.slippage_bps < 0.0 {
            return Err(AnalysisError::Config("slippage_bps must be >= 0".into()));
        }
        if !(self.backtest.train_ratio > 0.0 && self.backtest.train_ratio < 1.0) {
            return Err(AnalysisError::Config("train_ratio must be in (0, 1)".into()));
        }
        if !(self.backtest.test_ratio > 0.0 && self.backtest.test_ratio < 1.0) {
            return Err(AnalysisError::Config("test_ratio must be in (0, 1)".into()));
        }
        if self.backtest.train_ratio + self.backtest.test_ratio > 1.0 {
            return Err(AnalysisError::Config(
                "train_ratio + test_ratio must not exceed 1".into(),
            ));
        }
        if self.backtest.fast_periods.is_empty() || self.backtest.slow_periods.is_empty() {
            return Err(AnalysisError::Config(
                "moving-average grids must not be empty".into(),
            ));
        }
        if self.trend.windows.is_empty() || self.trend.windows.contains(&0) {
            return Err(AnalysisError::Config(
                "trend windows must be positive and non-empty".into(),
            ));
        }
        if self.trend.adx_period == 0 {
            return Err(AnalysisError::Config("adx_period must be positive".into()));
        }
        self.periods
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| AnalysisError::UnknownTimezone(self.periods.timezone.clone()))?;
        if self.periods.bootstrap_reps == 0 {
            return Err(AnalysisError::Config("bootstrap_reps must be positive".into()));
        }
        if self.periods.alpha <= 0.0 || self.periods.alpha >= 1.0 {
            return Err(AnalysisError::Config(
                "alpha must be strictly between 0 and 1".into(),
            ));
        }
        Ok(())
    }

    /// Parsed timezone.
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.periods
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| AnalysisError::UnknownTimezone(self.periods.timezone.clone()))
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# Sextant analyzer configuration

[analysis]
timeframes = ["1m", "5m", "15m", "1h", "4h", "1d", "1w"]
market_type = "spot"        # or "futures"
atr_period = 14
vr_q = 4
half_life_max_lag = 100
dynamic_min_bars = true
fixed_min_bars = 1500

[costs]
# taker_fee = 0.001         # default follows market_type
# maker_fee = 0.001
use_taker = true
slippage_bps = 2.0
cost_atr_max = 0.25

[backtest]
fast_periods = [5, 10, 20]
slow_periods = [20, 50, 100]
rsi_periods = [7, 14, 21]
train_ratio = 0.6
test_ratio = 0.2

[trend]
windows = [60, 240, 1440]   # minutes
adx_period = 14

[periods]
timezone = "UTC"
bootstrap_reps = 1000
alpha = 0.05
# seed = 42
"#
        .to_string()
    }
}
