//! Bootstrap resampling and NaN-aware reductions

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of row indices for one bootstrap draw
pub trait Resampler {
    /// Return `n` indices in `0..n`
    fn draw(&mut self, n: usize) -> Vec<usize>;
}

/// Uniform sampling with replacement from a seeded generator
#[derive(Debug, Clone)]
pub struct BootstrapResampler {
    rng: StdRng,
}

impl BootstrapResampler {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Resampler for BootstrapResampler {
    fn draw(&mut self, n: usize) -> Vec<usize> {
        if n == 0 {
            return Vec::new();
        }
        (0..n).map(|_| self.rng.random_range(0..n)).collect()
    }
}

/// Returns `0..n` every time; every draw sees the full set
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResampler;

impl Resampler for IdentityResampler {
    fn draw(&mut self, n: usize) -> Vec<usize> {
        (0..n).collect()
    }
}

/// Mean over the non-NaN values; NaN when there are none
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation over the non-NaN values; NaN when there are none
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sq, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + (v - mean).powi(2), c + 1));
    (sq / count as f64).sqrt()
}

/// Column-wise [`nan_mean`] and [`nan_std`] over equally long rows
pub fn nan_mean_std_columns(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let width = rows.first().map_or(0, Vec::len);
    (0..width)
        .map(|j| {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            (nan_mean(&column), nan_std(&column))
        })
        .unzip()
}
