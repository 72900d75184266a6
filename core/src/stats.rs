//! Neighborhood spending statistics and the flagging threshold.

use serde::{Deserialize, Serialize};

/// Standard deviations above the mean before a purchase is flagged.
pub const SIGMA_MULTIPLIER: f64 = 3.0;

/// Fewer samples than this and the statistics are not meaningful.
pub const MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation (divides by `count`).
    pub std_dev: f64,
}

impl NeighborhoodStats {
    /// `None` when there are fewer than `MIN_SAMPLES` amounts.
    pub fn from_amounts(amounts: &[f64]) -> Option<Self> {
        if amounts.len() < MIN_SAMPLES {
            return None;
        }
        let mean = mean(amounts)?;
        Some(Self {
            count: amounts.len(),
            mean,
            std_dev: population_std_dev(amounts, mean),
        })
    }

    pub fn threshold(&self) -> f64 {
        self.mean + SIGMA_MULTIPLIER * self.std_dev
    }

    /// Strictly above the threshold. With `std_dev == 0` this reduces
    /// to `amount > mean`.
    pub fn is_anomalous(&self, amount: f64) -> bool {
        amount > self.threshold()
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_not_sample_deviation() {
        let stats = NeighborhoodStats::from_amounts(&[10.0, 20.0]).unwrap();
        assert_eq!(stats.mean, 15.0);
        assert_eq!(stats.std_dev, 5.0);
        assert_eq!(stats.threshold(), 30.0);
    }

    #[test]
    fn single_sample_is_insufficient() {
        assert!(NeighborhoodStats::from_amounts(&[]).is_none());
        assert!(NeighborhoodStats::from_amounts(&[42.0]).is_none());
    }

    #[test]
    fn zero_deviation_flags_only_above_mean() {
        let stats = NeighborhoodStats::from_amounts(&[7.0, 7.0, 7.0]).unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert!(!stats.is_anomalous(7.0));
        assert!(stats.is_anomalous(7.01));
    }

    #[test]
    fn threshold_is_strict() {
        let stats = NeighborhoodStats::from_amounts(&[10.0, 20.0]).unwrap();
        assert!(!stats.is_anomalous(30.0));
        assert!(stats.is_anomalous(30.000001));
    }
}
