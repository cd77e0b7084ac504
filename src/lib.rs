//! Sextant - market characterization for OHLCV series.
//!
//! # Overview
//!
//! Sextant answers two questions about an instrument's price history:
//!
//! - **Which bar size is worth trading?** Each candidate timeframe is
//!   resampled from the native series and scored on transaction cost
//!   versus realized volatility, variance ratio, return autocorrelation
//!   and its half-life, then ranked. A small walk-forward backtest checks
//!   whether simple signals survive costs at that bar size.
//! - **When does the market trend?** Rolling windows are scored on
//!   regression fit, ADX, directional consistency and range/volatility
//!   ratio, classified as trend/range/unclear, aggregated by hour, weekday
//!   and month in a target timezone, and the calendar effects are
//!   hypothesis-tested (chi-square, ANOVA, Kruskal-Wallis, FDR-corrected).
//!
//! It is a characterization toolkit, not a trading system: nothing here
//! places orders, and the backtester exists only to score candidate
//! parameterizations.
//!
//! # Quick Start
//!
//! ```no_run
//! use sextant::{
//!     config::AnalyzerConfig,
//!     data::{load_csv, DataConfig},
//!     timeframe::TimeframeAnalyzer,
//! };
//!
//! let bars = load_csv("data/BTCUSDT_1m.csv", &DataConfig::default()).unwrap();
//! let config = AnalyzerConfig::default();
//! let report = TimeframeAnalyzer::new(&config).analyze(&bars).unwrap();
//!
//! for row in &report.rows {
//!     println!("{}: cost/ATR {:?}", row.timeframe, row.cost_atr_ratio);
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`]: core data types (Bar, market type, trend labels)
//! - [`data`]: CSV loading, resampling, gap detection, return series
//! - [`stats`]: shared numeric primitives (moments, OLS, ranks)
//! - [`config`]: TOML configuration
//! - [`timeframe`]: per-timeframe cost/volatility characterization
//! - [`backtest`]: walk-forward strategy evaluation
//! - [`trend`]: rolling trend detection and classification
//! - [`periods`]: calendar-period aggregation of trend records
//! - [`significance`]: hypothesis tests for calendar effects
//! - [`report`]: console tables and CSV/JSON/Markdown export

pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod periods;
pub mod report;
pub mod significance;
pub mod stats;
pub mod timeframe;
pub mod trend;
pub mod types;

// Re-exports for convenience
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, Result};
pub use types::{Bar, MarketType, TrendDirection, TrendLabel};

// Data handling re-exports
pub use data::{
    detect_gaps, load_csv, resample, save_csv, DataConfig, DataQuality, Gap, ResampleRule,
};

// Engine re-exports
pub use backtest::{BacktestMetrics, Strategy, WalkForward, WalkForwardReport};
pub use periods::{PeriodAggregate, PeriodAggregator, PeriodReport, PeriodType};
pub use significance::{
    benjamini_hochberg, bootstrap_mean_ci, BootstrapCi, CorrectedPValues, PeriodSignificance,
    SignificanceTester, TestResult,
};
pub use timeframe::{SkippedTimeframe, TimeframeAnalyzer, TimeframeReport, TimeframeRow};
pub use trend::{TrendDetector, TrendReport, TrendThresholds, TrendWindowRecord};
