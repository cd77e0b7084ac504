//! Core data types shared by the analysis engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV bar representing a single time period of market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate that bar data is internally consistent.
    pub fn validate(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
            && self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }

    /// High-to-low range of the bar.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Market type, resolved once at configuration time.
///
/// Each variant carries its own default fee schedule so that fee selection
/// happens in one place instead of string-keyed branching downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    #[default]
    Spot,
    Futures,
}

impl MarketType {
    /// Default taker fee fraction for this market.
    pub fn default_taker_fee(&self) -> f64 {
        match self {
            MarketType::Spot => 0.001,
            MarketType::Futures => 0.0004,
        }
    }

    /// Default maker fee fraction for this market.
    pub fn default_maker_fee(&self) -> f64 {
        match self {
            MarketType::Spot => 0.001,
            MarketType::Futures => 0.0002,
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Spot => write!(f, "spot"),
            MarketType::Futures => write!(f, "futures"),
        }
    }
}

/// Classification of a rolling trend window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Trend,
    Range,
    Unclear,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::Trend => write!(f, "trend"),
            TrendLabel::Range => write!(f, "range"),
            TrendLabel::Unclear => write!(f, "unclear"),
        }
    }
}

/// Direction of a trend-labeled window, taken from the regression slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Long,
    Short,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Long => write!(f, "long"),
            TrendDirection::Short => write!(f, "short"),
        }
    }
}
