//! Numeric primitives shared by every analyzer.
//!
//! Every function here accepts empty or degenerate input and answers with 0 (or
//! `None`) instead of panicking or leaking NaN/infinity into callers.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

/// Replace NaN and infinities with 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Division that answers 0 for a zero denominator or a non-finite quotient.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

/// Base-2 logarithm, 0 for non-positive input.
pub fn safe_log2(value: f64) -> f64 {
    if value <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    value.log2()
}

/// Square root, 0 for non-positive input.
pub fn safe_sqrt(value: f64) -> f64 {
    if value <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    value.sqrt()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    safe_divide(values.iter().sum::<f64>(), values.len() as f64)
}

/// Copy of `values` in ascending order.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut copy = values.to_vec();
    copy.sort_by(|a, b| a.total_cmp(b));
    copy
}

/// Median; the average of the two middle values on even length.
pub fn median(values: &[f64]) -> f64 {
    let sorted = sorted(values);
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// Percentile of an ascending slice with linear interpolation between ranks.
///
/// `p` is in percent and clamped to `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    if lower == upper {
        return sorted[lower];
    }
    finite_or_zero(sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction)
}

/// Most frequent value, only when some value repeats. Ties go to the smallest.
pub fn mode(values: &[f64]) -> Option<f64> {
    let sorted = sorted(values);
    let mut best: Option<(f64, usize)> = None;
    let mut index = 0;

    while index < sorted.len() {
        let value = sorted[index];
        let run = sorted[index..].iter().take_while(|v| **v == value).count();
        if run > 1 && best.map_or(true, |(_, count)| run > count) {
            best = Some((value, run));
        }
        index += run;
    }

    best.map(|(value, _)| value)
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    safe_divide(
        values.iter().map(|x| (x - m).powi(2)).sum::<f64>(),
        values.len() as f64,
    )
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    safe_sqrt(variance(values))
}

/// Sample (n - 1) standard deviation.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    safe_sqrt(safe_divide(ss, (values.len() - 1) as f64))
}

/// Bias-corrected sample skewness; 0 below three points.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let m = mean(values);
    let s = sample_std_dev(values);
    if s == 0.0 {
        return 0.0;
    }
    let nf = n as f64;
    let cubed: f64 = values.iter().map(|x| ((x - m) / s).powi(3)).sum();
    finite_or_zero(nf / ((nf - 1.0) * (nf - 2.0)) * cubed)
}

/// Bias-corrected sample excess kurtosis; 0 below four points.
pub fn kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let m = mean(values);
    let s = sample_std_dev(values);
    if s == 0.0 {
        return 0.0;
    }
    let nf = n as f64;
    let fourth: f64 = values.iter().map(|x| ((x - m) / s).powi(4)).sum();
    let lead = nf * (nf + 1.0) / ((nf - 1.0) * (nf - 2.0) * (nf - 3.0));
    let correction = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    finite_or_zero(lead * fourth - correction)
}

/// Standard deviation relative to the mean; 0 when the mean is 0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    safe_divide(std_dev(values), mean(values)).abs()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub iqr: f64,
}

pub fn quartiles(sorted: &[f64]) -> Quartiles {
    let q1 = percentile(sorted, 25.0);
    let q3 = percentile(sorted, 75.0);
    Quartiles {
        q1,
        q2: percentile(sorted, 50.0),
        q3,
        iqr: q3 - q1,
    }
}

/// Ordinary least squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, always within `[0, 1]`.
    pub r_squared: f64,
}

impl Regression {
    /// Fit against the index positions `0, 1, 2, ...`.
    pub fn fit(values: &[f64]) -> Self {
        let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        Self::fit_points(&xs, values)
    }

    pub fn fit_points(xs: &[f64], ys: &[f64]) -> Self {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return Self {
                slope: 0.0,
                intercept: ys.first().copied().map(finite_or_zero).unwrap_or(0.0),
                r_squared: 0.0,
            };
        }
        let xs = &xs[..n];
        let ys = &ys[..n];

        let mean_x = mean(xs);
        let mean_y = mean(ys);
        let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
        let sxy: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum();

        let slope = safe_divide(sxy, sxx);
        let intercept = finite_or_zero(mean_y - slope * mean_x);

        let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
        let ss_res: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum();

        // A series with no variance is explained perfectly by its flat line.
        let r_squared = if ss_tot == 0.0 {
            1.0
        } else {
            finite_or_zero(1.0 - ss_res / ss_tot)
        };

        Self {
            slope,
            intercept,
            r_squared: r_squared.clamp(0.0, 1.0),
        }
    }

    pub fn predict(&self, x: f64) -> f64 {
        finite_or_zero(self.slope * x + self.intercept)
    }
}

/// Pearson correlation coefficient; 0 when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let xs = &xs[..n];
    let ys = &ys[..n];
    let mean_x = mean(xs);
    let mean_y = mean(ys);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    safe_divide(sxy, safe_sqrt(sxx * syy)).clamp(-1.0, 1.0)
}

/// Two-tailed p-value for a Pearson coefficient over `n` pairs.
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let r = r.clamp(-1.0, 1.0);
    if (1.0 - r.abs()) < 1e-12 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * safe_sqrt(df / (1.0 - r * r));
    student_t_two_tailed(t, df)
}

/// Autocorrelation of `values` with itself shifted by `lag`.
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag == 0 {
        return if n == 0 { 0.0 } else { 1.0 };
    }
    if n <= lag {
        return 0.0;
    }
    let m = mean(values);
    let denominator: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    let numerator: f64 = values
        .iter()
        .take(n - lag)
        .zip(values.iter().skip(lag))
        .map(|(a, b)| (a - m) * (b - m))
        .sum();
    safe_divide(numerator, denominator)
}

/// Centered moving average; windows shrink at the edges.
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let window = window.max(1);
    let half = window / 2;
    let after = window - 1 - half;

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + after).min(n - 1);
            mean(&values[lo..=hi])
        })
        .collect()
}

/// Two-sided critical value of the standard normal for a confidence level.
pub fn z_critical(level: f64) -> f64 {
    let level = if level.is_finite() {
        level.clamp(0.5, 0.9999)
    } else {
        0.95
    };
    Normal::new(0.0, 1.0)
        .map(|normal| finite_or_zero(normal.inverse_cdf(1.0 - (1.0 - level) / 2.0)))
        .unwrap_or(1.96)
}

/// Two-tailed tail probability of Student's t with `df` degrees of freedom.
pub fn student_t_two_tailed(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    StudentsT::new(0.0, 1.0, df)
        .map(|dist| (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

/// Survival function of the F distribution.
pub fn f_survival(f: f64, d1: f64, d2: f64) -> f64 {
    if f <= 0.0 || !f.is_finite() {
        return if f.is_finite() { 1.0 } else { 0.0 };
    }
    FisherSnedecor::new(d1, d2)
        .map(|dist| finite_or_zero(dist.sf(f)).clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

/// Survival function of the chi-square distribution.
pub fn chi_square_survival(statistic: f64, df: f64) -> f64 {
    if statistic <= 0.0 || !statistic.is_finite() {
        return if statistic.is_finite() { 1.0 } else { 0.0 };
    }
    ChiSquared::new(df)
        .map(|dist| finite_or_zero(dist.sf(statistic)).clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

#[cfg(test)]
pub(crate) fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} but got {actual} (tolerance {tolerance})"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(percentile(&[], 90.0), 0.0);
        assert_eq!(skewness(&[]), 0.0);
        assert_eq!(kurtosis(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn singleton_input_is_stable() {
        assert_eq!(mean(&[4.0]), 4.0);
        assert_eq!(median(&[4.0]), 4.0);
        assert_eq!(std_dev(&[4.0]), 0.0);
        assert_eq!(percentile(&[4.0], 10.0), 4.0);
        let fit = Regression::fit(&[4.0]);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_squared, 0.0);
    }

    #[test]
    fn median_averages_two_middle_values() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn percentile_fifty_matches_median() {
        let samples: [&[f64]; 4] = [
            &[1.0],
            &[0.1, 0.7],
            &[0.13, 0.29, 0.31, 0.77, 0.91],
            &[1.5, 2.25, 3.125, 9.0, 10.75, 11.0],
        ];
        for sample in samples {
            let sorted = sorted(sample);
            assert_eq!(percentile(&sorted, 50.0), median(&sorted));
        }
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_close(percentile(&sorted, 25.0), 20.0, 1e-12);
        assert_close(percentile(&sorted, 10.0), 14.0, 1e-12);
        assert_close(percentile(&sorted, 100.0), 50.0, 1e-12);
    }

    #[test]
    fn mode_requires_repetition() {
        assert_eq!(mode(&[1.0, 2.0, 3.0]), None);
        assert_eq!(mode(&[3.0, 1.0, 3.0, 2.0, 1.0]), Some(1.0));
        assert_eq!(mode(&[5.0, 5.0, 5.0, 1.0, 1.0]), Some(5.0));
    }

    #[test]
    fn skewness_sign_follows_tail() {
        assert!(skewness(&[1.0, 1.0, 1.0, 2.0, 10.0]) > 0.0);
        assert!(skewness(&[10.0, 10.0, 10.0, 9.0, 1.0]) < 0.0);
        assert_eq!(skewness(&[1.0, 2.0]), 0.0);
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn kurtosis_of_uniform_grid_is_negative() {
        let values: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        assert_close(kurtosis(&values), -1.2, 1e-9);
    }

    #[test]
    fn regression_of_perfect_line() {
        let values: Vec<f64> = (0..14).map(|i| 10.0 + i as f64).collect();
        let fit = Regression::fit(&values);
        assert_close(fit.slope, 1.0, 1e-12);
        assert_close(fit.intercept, 10.0, 1e-12);
        assert_close(fit.r_squared, 1.0, 1e-12);
    }

    #[test]
    fn regression_r_squared_stays_in_unit_interval() {
        let constant = vec![7.0; 20];
        let fit = Regression::fit(&constant);
        assert_eq!(fit.slope, 0.0);
        assert!((0.0..=1.0).contains(&fit.r_squared));

        let noisy = [3.0, 9.0, 1.0, 8.0, 2.0, 7.0, 4.0];
        let fit = Regression::fit(&noisy);
        assert!((0.0..=1.0).contains(&fit.r_squared));

        let with_nan = [1.0, f64::NAN, 3.0];
        let fit = Regression::fit(&with_nan);
        assert!((0.0..=1.0).contains(&fit.r_squared));
        assert!(fit.slope.is_finite());
    }

    #[test]
    fn pearson_detects_linear_relationships() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert_close(pearson(&xs, &ys), 1.0, 1e-12);
        let inverse: Vec<f64> = ys.iter().map(|y| -y).collect();
        assert_close(pearson(&xs, &inverse), -1.0, 1e-12);
        assert_eq!(pearson(&xs, &[3.0; 5]), 0.0);
    }

    #[test]
    fn correlation_p_value_shrinks_with_strength() {
        let weak = correlation_p_value(0.1, 30);
        let strong = correlation_p_value(0.8, 30);
        assert!(weak > 0.5);
        assert!(strong < 0.001);
        assert_eq!(correlation_p_value(0.9, 2), 1.0);
    }

    #[test]
    fn student_t_matches_reference_values() {
        // t = 2.228 is the 97.5th percentile for 10 degrees of freedom.
        assert_close(student_t_two_tailed(2.228, 10.0), 0.05, 1e-3);
        assert_close(student_t_two_tailed(0.0, 10.0), 1.0, 1e-9);
    }

    #[test]
    fn chi_square_and_f_reference_values() {
        // 3.841 is the 95th percentile of chi-square with 1 degree of freedom.
        assert_close(chi_square_survival(3.841, 1.0), 0.05, 1e-3);
        // 5.991 is the 95th percentile with 2 degrees of freedom.
        assert_close(chi_square_survival(5.991, 2.0), 0.05, 1e-3);
        // 4.10 is roughly the 95th percentile of F(2, 10).
        assert_close(f_survival(4.10, 2.0, 10.0), 0.05, 2e-3);
    }

    #[test]
    fn z_critical_covers_any_level() {
        assert_close(z_critical(0.95), 1.96, 1e-3);
        assert_close(z_critical(0.99), 2.576, 1e-3);
        assert_close(z_critical(0.90), 1.645, 1e-3);
        // 0.97 sits between table entries.
        assert_close(z_critical(0.97), 2.170, 1e-3);
        assert!(z_critical(0.97) > z_critical(0.95));
    }

    #[test]
    fn degenerate_distribution_parameters_are_not_significant() {
        assert_eq!(f_survival(3.0, 0.0, 10.0), 1.0);
        assert_eq!(chi_square_survival(3.0, 0.0), 1.0);
        assert_eq!(student_t_two_tailed(2.0, 0.0), 1.0);
        assert_eq!(chi_square_survival(f64::INFINITY, 2.0), 0.0);
    }

    #[test]
    fn autocorrelation_finds_period() {
        let values: Vec<f64> = (0..42).map(|i| if i % 7 == 0 { 20.0 } else { 5.0 }).collect();
        assert!(autocorrelation(&values, 7) > 0.5);
        assert_eq!(autocorrelation(&[3.0; 20], 7), 0.0);
        assert_eq!(autocorrelation(&[1.0, 2.0], 5), 0.0);
    }

    #[test]
    fn centered_moving_average_shrinks_at_edges() {
        let smoothed = centered_moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(smoothed, vec![1.5, 2.0, 3.0, 4.0, 4.5]);
        assert!(centered_moving_average(&[], 3).is_empty());
    }

    #[test]
    fn safe_math_guards() {
        assert_eq!(safe_divide(1.0, 0.0), 0.0);
        assert_eq!(safe_divide(f64::INFINITY, 1.0), 0.0);
        assert_eq!(safe_log2(0.0), 0.0);
        assert_eq!(safe_log2(8.0), 3.0);
        assert_eq!(safe_sqrt(-4.0), 0.0);
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
    }
}
