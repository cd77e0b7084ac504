//! OHLCV data loading, validation and resampling.

use crate::error::{AnalysisError, Result};
use crate::types::Bar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Raw CSV row with flexible date parsing.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(
        alias = "Date",
        alias = "date",
        alias = "DATE",
        alias = "Timestamp",
        alias = "timestamp",
        alias = "Time",
        alias = "time",
        alias = "datetime",
        alias = "Datetime",
        alias = "open_time"
    )]
    date: String,
    #[serde(alias = "Open", alias = "open", alias = "o")]
    open: f64,
    #[serde(alias = "High", alias = "high", alias = "h")]
    high: f64,
    #[serde(alias = "Low", alias = "low", alias = "l")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "c", alias = "Adj Close")]
    close: f64,
    #[serde(
        alias = "Volume",
        alias = "volume",
        alias = "v",
        alias = "vol",
        alias = "Vol",
        default
    )]
    volume: f64,
}

/// Data source configuration.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Date format string for parsing (e.g., "%Y-%m-%d %H:%M:%S").
    pub date_format: Option<String>,
    /// Whether the CSV has headers.
    pub has_headers: bool,
    /// CSV delimiter character. If None, delimiter is auto-detected.
    pub delimiter: Option<u8>,
    /// Skip invalid rows instead of failing.
    pub skip_invalid: bool,
    /// Validate bar data (high >= low, etc.).
    pub validate_bars: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            has_headers: true,
            delimiter: None,
            skip_invalid: true,
            validate_bars: true,
        }
    }
}

/// Detect the CSV delimiter by checking which candidate yields a consistent
/// column count of at least five fields across the first few lines.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().take(5).filter_map(|l| l.ok()).collect();

    if lines.is_empty() {
        return Ok(b',');
    }

    let candidates = [b',', b'\t', b';', b'|'];
    let mut best = b',';
    let mut best_fields = 0;

    for &delim in &candidates {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.as_bytes().iter().filter(|&&b| b == delim).count() + 1)
            .collect();
        let consistent = counts.iter().all(|&c| c == counts[0]);
        if consistent && counts[0] >= 5 && counts[0] > best_fields {
            best_fields = counts[0];
            best = delim;
        }
    }

    debug!("Detected delimiter {:?}", best as char);
    Ok(best)
}

/// Parse a date string, trying an explicit format first, then common
/// datetime and date-only formats, then Unix seconds or milliseconds.
pub fn parse_datetime(s: &str, format: Option<&str>) -> Result<DateTime<Utc>> {
    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&dt));
            }
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y/%m/%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&dt));
            }
        }
    }

    if let Ok(ts) = s.parse::<i64>() {
        // Values above 1e12 are taken as milliseconds.
        let parsed = if ts > 1_000_000_000_000 {
            DateTime::from_timestamp_millis(ts)
        } else {
            DateTime::from_timestamp(ts, 0)
        };
        if let Some(dt) = parsed {
            return Ok(dt);
        }
    }

    Err(AnalysisError::Data(format!("could not parse date: '{}'", s)))
}

/// Load OHLCV bars from a CSV file. Bars are sorted by timestamp and
/// duplicate timestamps are dropped (first occurrence wins).
pub fn load_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    info!("Loading data from: {}", path.display());

    let delimiter = match config.delimiter {
        Some(d) => d,
        None => detect_delimiter(path)?,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(config.has_headers)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    let mut row_num = 0usize;

    for result in reader.deserialize() {
        row_num += 1;
        let row: CsvRow = match result {
            Ok(r) => r,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {}: {}", row_num, e);
                    skipped += 1;
                    continue;
                } else {
                    return Err(AnalysisError::Csv(e));
                }
            }
        };

        let timestamp = match parse_datetime(&row.date, config.date_format.as_deref()) {
            Ok(ts) => ts,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {} due to date parse error: {}", row_num, e);
                    skipped += 1;
                    continue;
                } else {
                    return Err(e);
                }
            }
        };

        let bar = Bar::new(timestamp, row.open, row.high, row.low, row.close, row.volume);

        if config.validate_bars && !bar.validate() {
            if config.skip_invalid {
                debug!("Skipping row {} due to invalid bar data: {:?}", row_num, bar);
                skipped += 1;
                continue;
            } else {
                return Err(AnalysisError::Data(format!(
                    "invalid bar data at row {}: {:?}",
                    row_num, bar
                )));
            }
        }

        bars.push(bar);
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }

    bars.sort_by_key(|b| b.timestamp);

    let original_len = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < original_len {
        warn!("Removed {} duplicate timestamps", original_len - bars.len());
    }

    if bars.is_empty() {
        return Err(AnalysisError::NoData);
    }

    info!(
        "Loaded {} bars from {} to {}",
        bars.len(),
        bars[0].timestamp,
        bars[bars.len() - 1].timestamp
    );

    Ok(bars)
}

/// Write bars as a comma-separated OHLCV file with a header row.
pub fn save_csv(path: impl AsRef<Path>, bars: &[Bar]) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    writeln!(file, "timestamp,open,high,low,close,volume")?;
    for bar in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )?;
    }
    info!("Wrote {} bars to {}", bars.len(), path.display());
    Ok(())
}

// =============================================================================
// Resampling
// =============================================================================

/// Fixed-width resampling rule, epoch-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResampleRule {
    Minute(u32),
    Hour(u32),
    Day,
    Week,
}

impl ResampleRule {
    /// Parse a timeframe label such as "1m", "15m", "4h", "1d" or "1w".
    pub fn from_label(label: &str) -> Result<Self> {
        let label = label.trim().to_lowercase();
        let err = || AnalysisError::UnknownTimeframe(label.clone());

        if label.len() < 2 {
            return Err(err());
        }
        let (num, unit) = label.split_at(label.len() - 1);
        let n: u32 = num.parse().map_err(|_| err())?;
        if n == 0 {
            return Err(err());
        }
        match unit {
            "m" => Ok(ResampleRule::Minute(n)),
            "h" => Ok(ResampleRule::Hour(n)),
            "d" if n == 1 => Ok(ResampleRule::Day),
            "w" if n == 1 => Ok(ResampleRule::Week),
            _ => Err(err()),
        }
    }

    /// Bucket width in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            ResampleRule::Minute(m) => *m,
            ResampleRule::Hour(h) => h * 60,
            ResampleRule::Day => 1440,
            ResampleRule::Week => 10080,
        }
    }

    /// Bucket width in seconds.
    pub fn seconds(&self) -> i64 {
        self.minutes() as i64 * 60
    }

    /// Right edge of the bucket containing `timestamp`. Buckets are
    /// half-open on the left: a bar stamped exactly on an edge belongs to
    /// the bucket that ends there.
    pub fn bucket_end(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let w = self.seconds();
        let t = timestamp.timestamp();
        let end = (t - 1).div_euclid(w) * w + w;
        DateTime::from_timestamp(end, 0).unwrap_or(timestamp)
    }
}

impl std::fmt::Display for ResampleRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResampleRule::Minute(m) => write!(f, "{}m", m),
            ResampleRule::Hour(h) => write!(f, "{}h", h),
            ResampleRule::Day => write!(f, "1d"),
            ResampleRule::Week => write!(f, "1w"),
        }
    }
}

/// Resample sorted bars into fixed-width buckets stamped with the bucket's
/// right edge. Open is the first bar's open, high/low span the bucket,
/// close is the last bar's close and volume is summed. Only buckets that
/// contain at least one source bar are emitted, and a trailing bucket whose
/// right edge lies past the last source timestamp is dropped as incomplete.
pub fn resample(bars: &[Bar], rule: ResampleRule) -> Vec<Bar> {
    if bars.is_empty() {
        return Vec::new();
    }

    let last_ts = bars[bars.len() - 1].timestamp;
    let mut out: Vec<Bar> = Vec::new();
    let mut current_end: Option<DateTime<Utc>> = None;
    let mut acc: Option<Bar> = None;

    for bar in bars {
        let end = rule.bucket_end(bar.timestamp);
        match (&mut acc, current_end) {
            (Some(a), Some(ce)) if ce == end => {
                a.high = a.high.max(bar.high);
                a.low = a.low.min(bar.low);
                a.close = bar.close;
                a.volume += bar.volume;
            }
            _ => {
                if let Some(done) = acc.take() {
                    out.push(done);
                }
                acc = Some(Bar::new(end, bar.open, bar.high, bar.low, bar.close, bar.volume));
                current_end = Some(end);
            }
        }
    }

    if let Some(done) = acc {
        // An unfinished trailing bucket would misstate the last bar.
        if done.timestamp <= last_ts {
            out.push(done);
        }
    }

    out
}

// =============================================================================
// Quality checks
// =============================================================================

/// A contiguous run of missing bars between two observed timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub missing_bars: u64,
}

/// Find gaps in a sorted series given the expected bar spacing in seconds.
pub fn detect_gaps(bars: &[Bar], expected_secs: i64) -> Vec<Gap> {
    if expected_secs <= 0 {
        return Vec::new();
    }
    bars.windows(2)
        .filter_map(|w| {
            let delta = (w[1].timestamp - w[0].timestamp).num_seconds();
            if delta > expected_secs {
                Some(Gap {
                    from: w[0].timestamp,
                    to: w[1].timestamp,
                    missing_bars: (delta / expected_secs - 1).max(1) as u64,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Summary of a loaded series used by the `validate` command.
#[derive(Debug, Clone)]
pub struct DataQuality {
    pub total_bars: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Modal bar spacing in seconds.
    pub bar_spacing_secs: i64,
    pub gaps: Vec<Gap>,
}

impl DataQuality {
    /// Assess a sorted, non-empty series.
    pub fn assess(bars: &[Bar]) -> Result<Self> {
        if bars.is_empty() {
            return Err(AnalysisError::NoData);
        }
        let spacing = modal_spacing(bars).unwrap_or(0);
        let gaps = detect_gaps(bars, spacing);
        Ok(Self {
            total_bars: bars.len(),
            start: bars[0].timestamp,
            end: bars[bars.len() - 1].timestamp,
            bar_spacing_secs: spacing,
            gaps,
        })
    }

    /// Fraction of expected bars that are present, in [0, 1].
    pub fn coverage(&self) -> f64 {
        if self.bar_spacing_secs <= 0 {
            return 1.0;
        }
        let span = (self.end - self.start).num_seconds();
        let expected = span / self.bar_spacing_secs + 1;
        if expected <= 0 {
            return 1.0;
        }
        (self.total_bars as f64 / expected as f64).min(1.0)
    }
}

/// Most common spacing between consecutive bars, in seconds. Ties prefer
/// the smaller spacing.
fn modal_spacing(bars: &[Bar]) -> Option<i64> {
    let mut counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for w in bars.windows(2) {
        let delta = (w[1].timestamp - w[0].timestamp).num_seconds();
        if delta > 0 {
            *counts.entry(delta).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(delta, count)| (count, std::cmp::Reverse(delta)))
        .map(|(delta, _)| delta)
}

// =============================================================================
// Derived series
// =============================================================================

/// Log returns of consecutive closes; pairs with a non-positive close on
/// either side are skipped.
pub fn log_returns(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .filter_map(|w| {
            if w[0].close > 0.0 && w[1].close > 0.0 {
                Some((w[1].close / w[0].close).ln())
            } else {
                None
            }
        })
        .collect()
}

/// Simple returns aligned to bars: index 0 is None, index i holds
/// close[i] / close[i-1] - 1 when the previous close is nonzero.
pub fn simple_returns(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(bars.len());
    out.push(None);
    for w in bars.windows(2) {
        if w[0].close != 0.0 {
            out.push(Some(w[1].close / w[0].close - 1.0));
        } else {
            out.push(None);
        }
    }
    out
}

/// True range per bar. Index 0 is None (no previous close).
pub fn true_range_series(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(bars.len());
    if bars.is_empty() {
        return out;
    }
    out.push(None);
    for w in bars.windows(2) {
        let hl = w[1].high - w[1].low;
        let hc = (w[1].high - w[0].close).abs();
        let lc = (w[1].low - w[0].close).abs();
        out.push(Some(hl.max(hc).max(lc)));
    }
    out
}

/// Average True Range as a simple rolling mean of the true range, aligned
/// to bars. Entry i is defined once `period` true-range values exist, so
/// the first `period` entries are None.
pub fn atr_series(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let tr = true_range_series(bars);
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return out;
    }
    let mut window_sum = 0.0;
    for i in 1..bars.len() {
        window_sum += tr[i].unwrap_or(0.0);
        if i > period {
            window_sum -= tr[i - period].unwrap_or(0.0);
        }
        if i >= period {
            out[i] = Some(window_sum / period as f64);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn bar(secs: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        Bar::new(ts(secs), o, h, l, c, v)
    }

    fn minute_bars(n: usize, start: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = start + i as f64;
                bar(i as i64 * 60, close - 0.5, close + 1.0, close - 1.0, close, 100.0)
            })
            .collect()
    }

    #[test]
    fn test_parse_datetime_formats() {
        let a = parse_datetime("2024-01-15 10:30:00", None).unwrap();
        assert_eq!(a, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
        let b = parse_datetime("2024-01-15", None).unwrap();
        assert_eq!(b, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        let c = parse_datetime("1705314600", None).unwrap();
        assert_eq!(c.timestamp(), 1_705_314_600);
        assert!(parse_datetime("not a date", None).is_err());
    }

    #[test]
    fn test_rule_from_label() {
        assert_eq!(ResampleRule::from_label("1m").unwrap(), ResampleRule::Minute(1));
        assert_eq!(ResampleRule::from_label("15m").unwrap(), ResampleRule::Minute(15));
        assert_eq!(ResampleRule::from_label("4h").unwrap(), ResampleRule::Hour(4));
        assert_eq!(ResampleRule::from_label("1d").unwrap(), ResampleRule::Day);
        assert_eq!(ResampleRule::from_label("1w").unwrap(), ResampleRule::Week);
        assert!(ResampleRule::from_label("0m").is_err());
        assert!(ResampleRule::from_label("2d").is_err());
        assert!(ResampleRule::from_label("x").is_err());
    }

    #[test]
    fn test_bucket_end_closed_right() {
        let rule = ResampleRule::Minute(5);
        // A bar exactly on an edge belongs to the bucket ending there.
        assert_eq!(rule.bucket_end(ts(300)), ts(300));
        assert_eq!(rule.bucket_end(ts(301)), ts(600));
        assert_eq!(rule.bucket_end(ts(599)), ts(600));
    }

    #[test]
    fn test_resample_right_labeled() {
        // Minute bars at 60..=600; 5m buckets end at 300 and 600.
        let bars: Vec<Bar> = (1..=10)
            .map(|i| {
                bar(
                    i * 60,
                    10.0 + i as f64,
                    11.0 + i as f64,
                    9.0 + i as f64,
                    10.5 + i as f64,
                    1.0,
                )
            })
            .collect();
        let out = resample(&bars, ResampleRule::Minute(5));
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].timestamp, ts(300));
        assert_eq!(out[0].open, 11.0); // first bar (t=60)
        assert_eq!(out[0].close, 15.5); // last bar in bucket (t=300)
        assert_eq!(out[0].high, 16.0);
        assert_eq!(out[0].low, 10.0);
        assert_eq!(out[0].volume, 5.0);

        assert_eq!(out[1].timestamp, ts(600));
        assert_eq!(out[1].close, 20.5);
    }

    #[test]
    fn test_resample_drops_trailing_incomplete() {
        // Three minute bars; the 5m bucket would end at t=300, past the
        // last observed timestamp, so nothing is emitted.
        let bars: Vec<Bar> = (1..=3).map(|i| bar(i * 60, 1.0, 2.0, 0.5, 1.5, 1.0)).collect();
        let out = resample(&bars, ResampleRule::Minute(5));
        assert!(out.is_empty());
    }

    #[test]
    fn test_resample_skips_empty_buckets() {
        // Bars in the first and third 5m buckets only.
        let bars = vec![
            bar(60, 1.0, 2.0, 0.5, 1.5, 1.0),
            bar(300, 1.5, 2.5, 1.0, 2.0, 1.0),
            bar(700, 2.0, 3.0, 1.5, 2.5, 1.0),
            bar(900, 2.5, 3.5, 2.0, 3.0, 1.0),
        ];
        let out = resample(&bars, ResampleRule::Minute(5));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, ts(300));
        assert_eq!(out[1].timestamp, ts(900));
    }

    #[test]
    fn test_detect_gaps() {
        let bars = vec![
            bar(0, 1.0, 1.0, 1.0, 1.0, 0.0),
            bar(60, 1.0, 1.0, 1.0, 1.0, 0.0),
            bar(300, 1.0, 1.0, 1.0, 1.0, 0.0),
        ];
        let gaps = detect_gaps(&bars, 60);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].from, ts(60));
        assert_eq!(gaps[0].to, ts(300));
        assert_eq!(gaps[0].missing_bars, 3);
    }

    #[test]
    fn test_quality_coverage() {
        let bars: Vec<Bar> = (0..10).map(|i| bar(i * 60, 1.0, 1.0, 1.0, 1.0, 0.0)).collect();
        let q = DataQuality::assess(&bars).unwrap();
        assert_eq!(q.total_bars, 10);
        assert_eq!(q.bar_spacing_secs, 60);
        assert!(q.gaps.is_empty());
        assert!((q.coverage() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_and_simple_returns() {
        let bars = vec![
            bar(0, 1.0, 1.0, 1.0, 100.0, 0.0),
            bar(60, 1.0, 1.0, 1.0, 110.0, 0.0),
            bar(120, 1.0, 1.0, 1.0, 99.0, 0.0),
        ];
        let lr = log_returns(&bars);
        assert_eq!(lr.len(), 2);
        assert!((lr[0] - (110.0f64 / 100.0).ln()).abs() < 1e-12);

        let sr = simple_returns(&bars);
        assert_eq!(sr.len(), 3);
        assert!(sr[0].is_none());
        assert!((sr[1].unwrap() - 0.1).abs() < 1e-12);
        assert!((sr[2].unwrap() - (99.0 / 110.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_atr_series_rolling_mean() {
        let bars = minute_bars(6, 100.0);
        let atr = atr_series(&bars, 3);
        assert_eq!(atr.len(), 6);
        assert!(atr[0].is_none());
        assert!(atr[2].is_none());
        let tr = true_range_series(&bars);
        let expected = (tr[1].unwrap() + tr[2].unwrap() + tr[3].unwrap()) / 3.0;
        assert!((atr[3].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_load_and_save_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        let bars = minute_bars(5, 50.0);
        save_csv(&path, &bars).unwrap();
        let loaded = load_csv(&path, &DataConfig::default()).unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded[0].timestamp, bars[0].timestamp);
        assert!((loaded[4].close - bars[4].close).abs() < 1e-9);
    }

    #[test]
    fn test_load_csv_skips_invalid_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messy.csv");
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n\
             2024-01-01 00:01:00,10,11,9,10.5,100\n\
             2024-01-01 00:01:00,10,11,9,10.5,100\n\
             garbage,1,2,0.5,1,1\n\
             2024-01-01 00:02:00,10,9,11,10.5,100\n\
             2024-01-01 00:03:00,10.5,11.5,9.5,11,100\n",
        )
        .unwrap();
        let bars = load_csv(&path, &DataConfig::default()).unwrap();
        // Duplicate, unparseable-date and high<low rows all dropped.
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn test_detect_delimiter_semicolon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semi.csv");
        std::fs::write(
            &path,
            "date;open;high;low;close;volume\n\
             2024-01-01;100.0;105.0;99.0;104.0;1000\n\
             2024-01-02;104.0;108.0;103.0;107.0;1500\n",
        )
        .unwrap();
        let bars = load_csv(&path, &DataConfig::default()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[1].close, 107.0);
    }
}
