// Window statistics - mean / population variance accumulators
//
// All results are sanitized: a NaN or infinite intermediate collapses to 0
// so downstream consumers never see non-finite numbers.

use serde::{Deserialize, Serialize};

/// Replace NaN/Inf with 0
#[inline]
pub fn finite_or_zero(value: f64) -> f32 {
    let v = value as f32;
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Mean and population variance of a scalar series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub mean: f32,
    pub variance: f32,
    /// Number of samples that contributed
    pub count: usize,
}

impl Stat {
    /// Compute statistics over an iterator of samples, skipping non-finite ones
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let mut acc = Accumulator::default();
        for v in values {
            acc.push(v);
        }
        acc.finish()
    }

    pub fn is_present(&self) -> bool {
        self.count > 0
    }

    pub fn std_dev(&self) -> f32 {
        self.variance.max(0.0).sqrt()
    }

    /// variance / mean^2, or `None` when the mean is ~0
    pub fn relative_variance(&self) -> Option<f32> {
        let mean_sq = self.mean * self.mean;
        if self.count == 0 || mean_sq <= f32::EPSILON {
            None
        } else {
            Some(finite_or_zero((self.variance / mean_sq) as f64))
        }
    }
}

/// Welford accumulator (f64 internally)
#[derive(Debug, Clone, Copy, Default)]
pub struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Accumulator {
    pub fn push(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let x = value as f64;
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn finish(&self) -> Stat {
        if self.count == 0 {
            return Stat::default();
        }
        Stat {
            mean: finite_or_zero(self.mean),
            variance: finite_or_zero(self.m2 / self.count as f64).max(0.0),
            count: self.count,
        }
    }
}

/// Per-dimension statistics of a fixed-length vector feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStat {
    pub mean: Vec<f32>,
    pub variance: Vec<f32>,
    pub count: usize,
}

impl VectorStat {
    /// Compute per-dimension stats over vectors of length `N`
    ///
    /// With no samples the mean and variance are zero vectors of length `N`.
    pub fn from_vectors<'a, const N: usize, I>(vectors: I) -> Self
    where
        I: IntoIterator<Item = &'a [f32; N]>,
    {
        let mut accs = [Accumulator::default(); N];
        let mut count = 0;
        for v in vectors {
            count += 1;
            for (acc, &x) in accs.iter_mut().zip(v.iter()) {
                acc.push(x);
            }
        }
        let stats: Vec<Stat> = accs.iter().map(Accumulator::finish).collect();
        Self {
            mean: stats.iter().map(|s| s.mean).collect(),
            variance: stats.iter().map(|s| s.variance).collect(),
            count,
        }
    }

    pub fn is_present(&self) -> bool {
        self.count > 0
    }

    /// Mean of per-dimension variances
    pub fn mean_variance(&self) -> f32 {
        if self.variance.is_empty() {
            return 0.0;
        }
        finite_or_zero(
            self.variance.iter().map(|&v| v as f64).sum::<f64>() / self.variance.len() as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_variance() {
        let stat = Stat::from_values([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stat.count, 8);
        assert!((stat.mean - 5.0).abs() < 1e-6);
        assert!((stat.variance - 4.0).abs() < 1e-5);
        assert!((stat.std_dev() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_is_zero() {
        let stat = Stat::from_values(std::iter::empty());
        assert_eq!(stat, Stat::default());
        assert!(!stat.is_present());
        assert_eq!(stat.relative_variance(), None);
    }

    #[test]
    fn test_non_finite_samples_skipped() {
        let stat = Stat::from_values([1.0, f32::NAN, 3.0, f32::INFINITY]);
        assert_eq!(stat.count, 2);
        assert!((stat.mean - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_stat_per_dimension() {
        let a = [1.0, 0.0, 2.0];
        let b = [3.0, 0.0, 2.0];
        let stat = VectorStat::from_vectors([&a, &b]);
        assert_eq!(stat.count, 2);
        assert_eq!(stat.mean, vec![2.0, 0.0, 2.0]);
        assert_eq!(stat.variance, vec![1.0, 0.0, 0.0]);
        assert!((stat.mean_variance() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_stat_empty_has_dimension() {
        let stat = VectorStat::from_vectors(std::iter::empty::<&[f32; 4]>());
        assert_eq!(stat.mean.len(), 4);
        assert_eq!(stat.count, 0);
    }
}
