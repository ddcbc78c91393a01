//! Statistics Calculator Module
//! Descriptive statistics, IQR bounds, Welch's t-test and correlation.

use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Significance threshold for t-test
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Descriptive statistics for one column, in the layout of a `describe()` table.
#[derive(Debug, Clone)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl Default for ColumnSummary {
    fn default() -> Self {
        Self {
            name: String::new(),
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            median: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Result of a two-sample Welch t-test.
#[derive(Debug, Clone, Copy)]
pub struct TTest {
    pub t_statistic: f64,
    pub p_value: f64,
    pub is_significant: bool,
}

impl TTest {
    fn undefined() -> Self {
        Self {
            t_statistic: f64::NAN,
            p_value: f64::NAN,
            is_significant: false,
        }
    }
}

/// Pearson correlation with its two-sided p-value.
#[derive(Debug, Clone, Copy)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

pub struct StatsCalculator;

impl StatsCalculator {
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    /// Sample standard deviation (n - 1).
    pub fn std_dev(values: &[f64]) -> Option<f64> {
        let n = values.len();
        if n < 2 {
            return None;
        }
        let mean = Self::mean(values)?;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(variance.sqrt())
    }

    fn sorted(values: &[f64]) -> Vec<f64> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    pub fn compute_summary(name: &str, values: &[f64]) -> ColumnSummary {
        let n = values.len();
        if n == 0 {
            return ColumnSummary {
                name: name.to_string(),
                ..ColumnSummary::default()
            };
        }

        let sorted = Self::sorted(values);

        ColumnSummary {
            name: name.to_string(),
            count: n,
            mean: Self::mean(values).unwrap_or(f64::NAN),
            std: Self::std_dev(values).unwrap_or(f64::NAN),
            min: sorted[0],
            p25: Self::percentile(&sorted, 25.0),
            median: Self::percentile(&sorted, 50.0),
            p75: Self::percentile(&sorted, 75.0),
            max: sorted[n - 1],
        }
    }

    /// Summaries for several columns in parallel, returned in input order.
    pub fn compute_summaries_parallel(columns: &[(String, Vec<f64>)]) -> Vec<ColumnSummary> {
        columns
            .par_iter()
            .map(|(name, values)| Self::compute_summary(name, values))
            .collect()
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Inclusive retention bounds `[Q1 - k*IQR, Q3 + k*IQR]`, or None without data.
    /// Non-finite values take no part in the quartiles.
    pub fn iqr_bounds(values: &[f64], multiplier: f64) -> Option<(f64, f64)> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let sorted = Self::sorted(&finite);
        let q1 = Self::percentile(&sorted, 25.0);
        let q3 = Self::percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        Some((q1 - multiplier * iqr, q3 + multiplier * iqr))
    }

    /// Perform Welch's t-test (independent samples, unequal variance).
    pub fn perform_ttest(group_values: &[f64], control_values: &[f64]) -> TTest {
        let n1 = group_values.len() as f64;
        let n2 = control_values.len() as f64;

        if n1 < 2.0 || n2 < 2.0 {
            return TTest::undefined();
        }

        let mean1 = group_values.iter().sum::<f64>() / n1;
        let mean2 = control_values.iter().sum::<f64>() / n2;

        let var1 = group_values
            .iter()
            .map(|x| (x - mean1).powi(2))
            .sum::<f64>()
            / (n1 - 1.0);
        let var2 = control_values
            .iter()
            .map(|x| (x - mean2).powi(2))
            .sum::<f64>()
            / (n2 - 1.0);

        let se = (var1 / n1 + var2 / n2).sqrt();
        if se == 0.0 {
            return TTest {
                t_statistic: 0.0,
                p_value: 1.0,
                is_significant: false,
            };
        }

        let t = (mean1 - mean2) / se;

        // Welch-Satterthwaite degrees of freedom
        let df_num = (var1 / n1 + var2 / n2).powi(2);
        let df_denom = (var1 / n1).powi(2) / (n1 - 1.0) + (var2 / n2).powi(2) / (n2 - 1.0);
        let df = df_num / df_denom;

        // Two-tailed p-value using t-distribution
        match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => {
                let p_value = 2.0 * (1.0 - dist.cdf(t.abs()));
                TTest {
                    t_statistic: t,
                    p_value,
                    is_significant: p_value <= SIGNIFICANCE_THRESHOLD,
                }
            }
            Err(_) => TTest {
                t_statistic: t,
                ..TTest::undefined()
            },
        }
    }

    /// Student's t-test with pooled variance (equal-variance assumption).
    pub fn perform_pooled_ttest(group_values: &[f64], control_values: &[f64]) -> TTest {
        let n1 = group_values.len() as f64;
        let n2 = control_values.len() as f64;

        if n1 < 2.0 || n2 < 2.0 {
            return TTest::undefined();
        }

        let mean1 = group_values.iter().sum::<f64>() / n1;
        let mean2 = control_values.iter().sum::<f64>() / n2;
        let ss1 = group_values.iter().map(|x| (x - mean1).powi(2)).sum::<f64>();
        let ss2 = control_values.iter().map(|x| (x - mean2).powi(2)).sum::<f64>();

        let df = n1 + n2 - 2.0;
        let pooled_var = (ss1 + ss2) / df;
        let se = (pooled_var * (1.0 / n1 + 1.0 / n2)).sqrt();
        if se == 0.0 {
            return TTest {
                t_statistic: 0.0,
                p_value: 1.0,
                is_significant: false,
            };
        }

        let t = (mean1 - mean2) / se;
        match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => {
                let p_value = 2.0 * (1.0 - dist.cdf(t.abs()));
                TTest {
                    t_statistic: t,
                    p_value,
                    is_significant: p_value <= SIGNIFICANCE_THRESHOLD,
                }
            }
            Err(_) => TTest {
                t_statistic: t,
                ..TTest::undefined()
            },
        }
    }

    /// Pearson correlation over paired observations.
    pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
        let n = pairs.len();
        if n < 2 {
            return None;
        }
        let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
        let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;

        let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
        for &(x, y) in pairs {
            cov += (x - mean_x) * (y - mean_y);
            var_x += (x - mean_x).powi(2);
            var_y += (y - mean_y).powi(2);
        }

        let denom = (var_x * var_y).sqrt();
        if denom == 0.0 {
            None
        } else {
            Some(cov / denom)
        }
    }
}

impl StatsCalculator {
    /// Pearson correlation tested against zero with a t distribution on n - 2 df.
    pub fn pearson_test(pairs: &[(f64, f64)]) -> Option<Correlation> {
        let r = Self::pearson(pairs)?;
        let n = pairs.len();
        if n < 3 {
            return Some(Correlation {
                r,
                p_value: f64::NAN,
                n,
            });
        }
        let df = (n - 2) as f64;
        let p_value = if r.abs() >= 1.0 {
            0.0
        } else {
            let t = r * (df / (1.0 - r * r)).sqrt();
            StudentsT::new(0.0, 1.0, df)
                .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
                .unwrap_or(f64::NAN)
        };
        Some(Correlation { r, p_value, n })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn percentile_interpolates_like_numpy() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 1000.0];
        assert!(close(StatsCalculator::percentile(&sorted, 25.0), 2.25));
        assert!(close(StatsCalculator::percentile(&sorted, 75.0), 4.75));
        assert!(close(StatsCalculator::percentile(&sorted, 50.0), 3.5));
    }

    #[test]
    fn iqr_bounds_use_three_times_the_spread() {
        let (lower, upper) =
            StatsCalculator::iqr_bounds(&[1.0, 2.0, 3.0, 4.0, 5.0, 1000.0], 3.0).unwrap();
        // Q1 = 2.25, Q3 = 4.75, IQR = 2.5
        assert!(close(lower, -5.25));
        assert!(close(upper, 12.25));
        assert!(StatsCalculator::iqr_bounds(&[], 3.0).is_none());
    }

    #[test]
    fn non_finite_values_do_not_move_the_quartiles() {
        let clean = StatsCalculator::iqr_bounds(&[1.0, 2.0, 3.0, 4.0, 5.0], 3.0).unwrap();
        let noisy = StatsCalculator::iqr_bounds(
            &[f64::NAN, 1.0, 2.0, f64::INFINITY, 3.0, 4.0, 5.0, f64::NAN],
            3.0,
        )
        .unwrap();
        assert_eq!(clean, noisy);
        assert!(StatsCalculator::iqr_bounds(&[f64::NAN], 3.0).is_none());
    }

    #[test]
    fn pooled_and_welch_agree_on_t_but_not_on_df() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        let pooled = StatsCalculator::perform_pooled_ttest(&a, &b);
        let welch = StatsCalculator::perform_ttest(&a, &b);
        // equal sizes: same t, pooled df = 8, Welch df ~ 5.88
        assert!(close(pooled.t_statistic, -3.0 / 2.5f64.sqrt()));
        assert!(close(pooled.t_statistic, welch.t_statistic));
        assert!(pooled.p_value > 0.09 && pooled.p_value < 0.10);
        assert!(pooled.p_value < welch.p_value);
    }

    #[test]
    fn summary_matches_describe() {
        let s = StatsCalculator::compute_summary("x", &[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(s.count, 4);
        assert!(close(s.mean, 2.5));
        assert!(close(s.min, 1.0));
        assert!(close(s.max, 4.0));
        assert!(close(s.median, 2.5));
        assert!(close(s.p25, 1.75));
        assert!(close(s.std, (5.0f64 / 3.0).sqrt()));
    }

    #[test]
    fn ttest_needs_two_observations_per_side() {
        let t = StatsCalculator::perform_ttest(&[1.0], &[1.0, 2.0]);
        assert!(t.p_value.is_nan());
        assert!(!t.is_significant);
    }

    #[test]
    fn clearly_separated_samples_are_significant() {
        let a = [10.0, 11.0, 12.0, 10.5, 11.5];
        let b = [1.0, 2.0, 1.5, 2.5, 1.2];
        let t = StatsCalculator::perform_ttest(&a, &b);
        assert!(t.t_statistic > 0.0);
        assert!(t.is_significant);
    }

    #[test]
    fn pearson_detects_perfect_relationships() {
        let up: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        assert!(close(StatsCalculator::pearson(&up).unwrap(), 1.0));
        assert!(StatsCalculator::pearson(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn weak_correlation_is_not_significant() {
        let pairs = [(1.0, 2.0), (2.0, 1.0), (3.0, 3.0), (4.0, 2.0), (5.0, 2.5)];
        let c = StatsCalculator::pearson_test(&pairs).unwrap();
        assert!(c.r.abs() < 0.5);
        assert!(c.p_value > SIGNIFICANCE_THRESHOLD);
        assert_eq!(c.n, 5);
    }
}
