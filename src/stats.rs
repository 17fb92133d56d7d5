//! Streaming statistics over packet-size distributions
//!
//! Two forms of the same computations live here: pure functions over a
//! full sample (used for verification and small one-shot work) and
//! incremental accumulators that produce identical results in O(1) per
//! observation (Welford mean/variance, a frequency map for entropy).

use std::collections::HashMap;

/// Arithmetic mean; 0 for an empty sample.
pub fn mean(sizes: &[u64]) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let sum: u64 = sizes.iter().sum();
    sum as f64 / sizes.len() as f64
}

/// Population variance (divide by n); 0 for an empty sample.
pub fn variance(sizes: &[u64]) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let m = mean(sizes);
    sizes
        .iter()
        .map(|&v| {
            let diff = v as f64 - m;
            diff * diff
        })
        .sum::<f64>()
        / sizes.len() as f64
}

/// Shannon entropy (bits) of the discrete value distribution; 0 for an
/// empty sample.
pub fn entropy(sizes: &[u64]) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<u64, u64> = HashMap::new();
    for &size in sizes {
        *counts.entry(size).or_insert(0) += 1;
    }
    let n = sizes.len() as f64;
    -counts
        .values()
        .map(|&count| {
            let p = count as f64 / n;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Running mean and variance via Welford's algorithm
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Population variance of the values pushed so far.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }
}

/// Incrementally maintained size-frequency distribution
#[derive(Debug, Clone, Default)]
pub struct SizeDistribution {
    counts: HashMap<u64, u64>,
    total: u64,
}

impl SizeDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, size: u64) {
        *self.counts.entry(size).or_insert(0) += 1;
        self.total += 1;
    }

    /// Total observations recorded.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct size values seen.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Shannon entropy (bits) of the current distribution.
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let n = self.total as f64;
        -self
            .counts
            .values()
            .map(|&count| {
                let p = count as f64 / n;
                p * p.log2()
            })
            .sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_variance_known_values() {
        let sizes = [10, 20, 30];
        assert!((mean(&sizes) - 20.0).abs() < 1e-9);
        assert!((variance(&sizes) - 66.666_666_666_67).abs() < 1e-6);
    }

    #[test]
    fn test_empty_sample_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(entropy(&[]), 0.0);
    }

    #[test]
    fn test_entropy_edge_cases() {
        assert_eq!(entropy(&[512]), 0.0);
        assert_eq!(entropy(&[64, 64, 64, 64]), 0.0);
        // Two values, each with probability 0.5 -> exactly one bit
        assert!((entropy(&[100, 100, 200, 200]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_running_stats_match_naive() {
        let sizes: Vec<u64> = vec![60, 1500, 60, 576, 1500, 60, 40];
        let mut running = RunningStats::new();
        for &size in &sizes {
            running.push(size as f64);
        }
        assert_eq!(running.count(), sizes.len() as u64);
        assert!((running.mean() - mean(&sizes)).abs() < 1e-9);
        assert!((running.variance() - variance(&sizes)).abs() < 1e-6);
    }

    #[test]
    fn test_size_distribution_matches_naive_entropy() {
        let sizes: Vec<u64> = vec![100, 100, 200, 200, 300, 100];
        let mut dist = SizeDistribution::new();
        for &size in &sizes {
            dist.record(size);
        }
        assert_eq!(dist.total(), sizes.len() as u64);
        assert_eq!(dist.distinct(), 3);
        assert!((dist.entropy() - entropy(&sizes)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_accumulators() {
        let running = RunningStats::new();
        assert_eq!(running.mean(), 0.0);
        assert_eq!(running.variance(), 0.0);
        assert_eq!(SizeDistribution::new().entropy(), 0.0);
    }
}
