//! Shared statistical primitives.
//!
//! Every function returns `Option` so that "insufficient data" and
//! "degenerate denominator" stay distinguishable from a computed zero; the
//! engines propagate these as explicitly-undefined metric values.

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Unbiased (n-1) sample variance. `None` below 2 observations.
pub fn variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let m = mean(data)?;
    let ss: f64 = data.iter().map(|x| (x - m).powi(2)).sum();
    Some(ss / (data.len() - 1) as f64)
}

/// Unbiased sample standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Bias-corrected sample skewness (adjusted Fisher-Pearson, as pandas
/// computes it). `None` below 3 observations or for a constant series.
pub fn skewness(data: &[f64]) -> Option<f64> {
    let n = data.len();
    if n < 3 {
        return None;
    }
    let m = mean(data)?;
    let nf = n as f64;
    let m2 = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / nf;
    let m3 = data.iter().map(|x| (x - m).powi(3)).sum::<f64>() / nf;
    if m2 <= 0.0 {
        return None;
    }
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
}

/// Bias-corrected sample excess kurtosis (pandas convention). `None` below
/// 4 observations or for a constant series.
pub fn excess_kurtosis(data: &[f64]) -> Option<f64> {
    let n = data.len();
    if n < 4 {
        return None;
    }
    let m = mean(data)?;
    let s2 = variance(data)?;
    if s2 <= 0.0 {
        return None;
    }
    let nf = n as f64;
    let sum4: f64 = data.iter().map(|x| ((x - m) / s2.sqrt()).powi(4)).sum();
    let g2 = nf * (nf + 1.0) / ((nf - 1.0) * (nf - 2.0) * (nf - 3.0)) * sum4
        - 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    Some(g2)
}

/// Pearson correlation of two equal-length series.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    Some(cov / (vx * vy).sqrt())
}

/// Autocorrelation at `lag` as the Pearson correlation of the series with
/// its lagged copy (pandas `Series.autocorr` convention).
pub fn autocorrelation(data: &[f64], lag: usize) -> Option<f64> {
    if lag == 0 || data.len() < lag + 2 {
        return None;
    }
    pearson(&data[lag..], &data[..data.len() - lag])
}

/// Ordinary least squares of `y` against the index 0..n.
#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Standard error of the slope. Zero when it cannot be estimated
    /// (fewer than 3 points), matching the caller convention that the
    /// t-statistic is then zero.
    pub std_err: f64,
}

/// Fit `y` by OLS against x = 0, 1, ..., n-1. `None` below 2 points.
pub fn linear_fit(y: &[f64]) -> Option<LinearFit> {
    let n = y.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mx = (nf - 1.0) / 2.0;
    let my = mean(y)?;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (i, v) in y.iter().enumerate() {
        let dx = i as f64 - mx;
        let dy = v - my;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r_squared = if syy > 0.0 { (sxy * sxy) / (sxx * syy) } else { 0.0 };

    let std_err = if n > 2 {
        let sse = (syy - slope * sxy).max(0.0);
        (sse / (nf - 2.0) / sxx).sqrt()
    } else {
        0.0
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
        std_err,
    })
}

/// Linearly interpolated percentile of sorted data, `p` in [0, 1].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
}

/// Average ranks (1-based) with ties sharing their mean rank.
pub fn rank_with_ties(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| data[a].partial_cmp(&data[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && data[order[j + 1]] == data[order[i]] {
            j += 1;
        }
        // Items i..=j are tied; they share the mean of ranks i+1..=j+1.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data).unwrap() - 5.0).abs() < 1e-12);
        // Sample variance with n-1: sum of squares = 32, 32/7
        assert!((variance(&data).unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert!(mean(&[]).is_none());
        assert!(variance(&[1.0]).is_none());
    }

    #[test]
    fn test_skewness_symmetric_is_zero() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&data).unwrap().abs() < 1e-12);
        assert!(skewness(&[1.0, 2.0]).is_none());
        assert!(skewness(&[3.0, 3.0, 3.0]).is_none());
    }

    #[test]
    fn test_skewness_right_tail_positive() {
        let data = [1.0, 1.0, 1.0, 1.0, 10.0];
        assert!(skewness(&data).unwrap() > 0.0);
    }

    #[test]
    fn test_excess_kurtosis_uniformish_negative() {
        // A flat spread has lighter tails than a normal distribution.
        let data: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert!(excess_kurtosis(&data).unwrap() < 0.0);
        assert!(excess_kurtosis(&[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_pearson_exact() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);

        let y_neg = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y_neg).unwrap() + 1.0).abs() < 1e-12);

        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn test_autocorrelation_alternating() {
        let data = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let rho = autocorrelation(&data, 1).unwrap();
        assert!((rho + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_fit_exact_line() {
        let y: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        let fit = linear_fit(&y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 3.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!(fit.std_err.abs() < 1e-9);
    }

    #[test]
    fn test_linear_fit_known_stderr() {
        // y = [0, 2, 1, 3]: slope = 0.8, hand-checked SSE = 1.8,
        // s^2 = 0.9, Sxx = 5 -> std_err = sqrt(0.18).
        let y = [0.0, 2.0, 1.0, 3.0];
        let fit = linear_fit(&y).unwrap();
        assert!((fit.slope - 0.8).abs() < 1e-12);
        assert!((fit.std_err - 0.18f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile_sorted(&sorted, 0.5).unwrap() - 2.5).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 1.0).unwrap() - 4.0).abs() < 1e-12);
        assert!(percentile_sorted(&[], 0.5).is_none());
    }

    #[test]
    fn test_rank_with_ties() {
        let data = [10.0, 20.0, 20.0, 30.0];
        let ranks = rank_with_ties(&data);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }
}
