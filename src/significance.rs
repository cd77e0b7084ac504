//! Hypothesis tests for calendar-period effects.
//!
//! Answers whether trend concentration by hour, weekday or month is
//! statistically distinguishable from noise. Every test is a pure function
//! of its inputs; degenerate input yields None rather than a fabricated
//! p-value.

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::periods::PeriodType;
use crate::stats;
use crate::trend::TrendWindowRecord;
use crate::types::TrendLabel;
use chrono::{Datelike, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};
use std::collections::BTreeMap;
use tracing::info;

/// Outcome of one hypothesis test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: f64,
    pub significant: bool,
}

/// Percentile bootstrap interval around a sample mean.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapCi {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
    pub reps: usize,
}

/// False-discovery-rate corrected p-values, in the input order.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectedPValues {
    pub adjusted: Vec<f64>,
    pub rejected: Vec<bool>,
}

/// Goodness-of-fit of observed per-group counts against a uniform baseline
/// (the mean count repeated across groups). Needs at least two groups and a
/// positive total.
pub fn chi_square_uniform(counts: &[usize], alpha: f64) -> Option<TestResult> {
    let k = counts.len();
    let total: usize = counts.iter().sum();
    if k < 2 || total == 0 {
        return None;
    }
    let expected = total as f64 / k as f64;
    let statistic: f64 = counts
        .iter()
        .map(|&o| {
            let d = o as f64 - expected;
            d * d / expected
        })
        .sum();
    let dof = (k - 1) as f64;
    let p_value = ChiSquared::new(dof).ok()?.sf(statistic);
    Some(TestResult {
        statistic,
        p_value,
        dof,
        significant: p_value < alpha,
    })
}

/// One-way ANOVA F-test for equality of group means. Each group must have
/// at least two observations and the within-group variance must be
/// positive.
pub fn anova_f(groups: &[Vec<f64>], alpha: f64) -> Option<TestResult> {
    let k = groups.len();
    if k < 2 || groups.iter().any(|g| g.len() < 2) {
        return None;
    }
    let n_total: usize = groups.iter().map(|g| g.len()).sum();
    let grand_mean = groups.iter().flatten().sum::<f64>() / n_total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let mean = group.iter().sum::<f64>() / group.len() as f64;
        ss_between += group.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += group.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (n_total - k) as f64;
    let ms_within = ss_within / df_within;
    if ms_within <= 0.0 {
        return None;
    }
    let statistic = (ss_between / df_between) / ms_within;
    let p_value = FisherSnedecor::new(df_between, df_within).ok()?.sf(statistic);
    Some(TestResult {
        statistic,
        p_value,
        dof: df_between,
        significant: p_value < alpha,
    })
}

/// Kruskal-Wallis rank test with tie correction, approximated by the
/// chi-square distribution with k-1 degrees of freedom.
pub fn kruskal_wallis(groups: &[Vec<f64>], alpha: f64) -> Option<TestResult> {
    let k = groups.len();
    if k < 2 || groups.iter().any(|g| g.len() < 2) {
        return None;
    }
    let pooled: Vec<f64> = groups.iter().flatten().copied().collect();
    let n = pooled.len();
    let ranks = stats::rank_with_ties(&pooled);

    let mut h = 0.0;
    let mut offset = 0;
    for group in groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        h += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }
    let n_f = n as f64;
    h = 12.0 / (n_f * (n_f + 1.0)) * h - 3.0 * (n_f + 1.0);

    // Tie correction: 1 - sum(t^3 - t) / (n^3 - n) over tie groups.
    let mut sorted = pooled.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut tie_sum = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let t = (j - i) as f64;
        tie_sum += t * t * t - t;
        i = j;
    }
    let correction = 1.0 - tie_sum / (n_f * n_f * n_f - n_f);
    if correction <= 0.0 {
        // All observations identical.
        return None;
    }
    let statistic = h / correction;
    let dof = (k - 1) as f64;
    let p_value = ChiSquared::new(dof).ok()?.sf(statistic);
    Some(TestResult {
        statistic,
        p_value,
        dof,
        significant: p_value < alpha,
    })
}

/// Benjamini-Hochberg step-up correction. Adjusted values are made
/// monotone by taking a running minimum from the largest rank downward and
/// are capped at 1.
pub fn benjamini_hochberg(p_values: &[f64], alpha: f64) -> CorrectedPValues {
    let m = p_values.len();
    if m == 0 {
        return CorrectedPValues {
            adjusted: Vec::new(),
            rejected: Vec::new(),
        };
    }

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut adjusted_sorted = vec![0.0; m];
    let mut running_min = f64::INFINITY;
    for rank in (1..=m).rev() {
        let idx = order[rank - 1];
        let raw = p_values[idx] * m as f64 / rank as f64;
        running_min = running_min.min(raw).min(1.0);
        adjusted_sorted[rank - 1] = running_min;
    }

    let mut adjusted = vec![0.0; m];
    for (rank_idx, &original_idx) in order.iter().enumerate() {
        adjusted[original_idx] = adjusted_sorted[rank_idx];
    }
    let rejected = adjusted.iter().map(|&p| p <= alpha).collect();
    CorrectedPValues { adjusted, rejected }
}

/// Percentile bootstrap interval for the mean. Needs at least two
/// observations and a positive repetition count.
pub fn bootstrap_mean_ci(
    data: &[f64],
    reps: usize,
    confidence: f64,
    rng: &mut impl Rng,
) -> Option<BootstrapCi> {
    if data.len() < 2 || reps == 0 || !(0.0..1.0).contains(&confidence) {
        return None;
    }
    let mean = stats::mean(data)?;

    let mut means = Vec::with_capacity(reps);
    for _ in 0..reps {
        let resample_mean: f64 = (0..data.len())
            .map(|_| data[rng.gen_range(0..data.len())])
            .sum::<f64>()
            / data.len() as f64;
        means.push(resample_mean);
    }
    means.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let tail = (1.0 - confidence) / 2.0;
    let lower = stats::percentile_sorted(&means, tail)?;
    let upper = stats::percentile_sorted(&means, 1.0 - tail)?;
    Some(BootstrapCi {
        mean,
        lower,
        upper,
        confidence,
        reps,
    })
}

/// Test battery for one period type.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodSignificance {
    pub period_type: PeriodType,
    pub n_groups: usize,
    /// Trend-count uniformity across groups.
    pub chi_square: Option<TestResult>,
    /// Equality of mean trend scores across groups.
    pub anova: Option<TestResult>,
    pub kruskal_wallis: Option<TestResult>,
    /// Bootstrap interval for the overall mean trend score.
    pub score_ci: Option<BootstrapCi>,
}

pub struct SignificanceTester<'a> {
    config: &'a AnalyzerConfig,
}

impl<'a> SignificanceTester<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Group records by the given period type in the configured timezone
    /// and run the full battery.
    pub fn evaluate(
        &self,
        records: &[TrendWindowRecord],
        period_type: PeriodType,
    ) -> Result<PeriodSignificance> {
        let tz = self.config.timezone()?;
        let alpha = self.config.periods.alpha;

        let mut scores_by_group: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut trend_counts: BTreeMap<u32, usize> = BTreeMap::new();
        for record in records {
            let local = record.timestamp.with_timezone(&tz);
            let value = match period_type {
                PeriodType::Hour => local.hour(),
                PeriodType::Weekday => local.weekday().num_days_from_monday(),
                PeriodType::Month => local.month(),
            };
            scores_by_group.entry(value).or_default().push(record.trend_score);
            let counter = trend_counts.entry(value).or_default();
            if record.label == TrendLabel::Trend {
                *counter += 1;
            }
        }

        let counts: Vec<usize> = trend_counts.values().copied().collect();
        let groups: Vec<Vec<f64>> = scores_by_group.into_values().collect();
        let all_scores: Vec<f64> = records.iter().map(|r| r.trend_score).collect();

        let mut rng = match self.config.periods.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let score_ci = bootstrap_mean_ci(
            &all_scores,
            self.config.periods.bootstrap_reps,
            1.0 - alpha,
            &mut rng,
        );

        let result = PeriodSignificance {
            period_type,
            n_groups: groups.len(),
            chi_square: chi_square_uniform(&counts, alpha),
            anova: anova_f(&groups, alpha),
            kruskal_wallis: kruskal_wallis(&groups, alpha),
            score_ci,
        };
        info!(
            "Significance by {}: {} groups, chi2 {}",
            period_type,
            result.n_groups,
            result
                .chi_square
                .as_ref()
                .map(|t| format!("p={:.4}", t.p_value))
                .unwrap_or_else(|| "undefined".to_string())
        );
        Ok(result)
    }
}
