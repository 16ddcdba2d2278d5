//! Streaming mean / standard deviation accumulator.
//!
//! Welford's single-pass recurrence, so long capture runs neither store
//! samples nor lose precision to a naive sum-of-squares.

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
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the samples so far; 0 before the first push.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation; 0 with fewer than two samples.
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator_is_zero() {
        let s = RunningStats::new();
        assert_eq!(s.count(), 0);
        assert_eq!(s.mean(), 0.0);
        assert_eq!(s.std_dev(), 0.0);
    }

    #[test]
    fn mean_and_std_dev_match_closed_form() {
        let mut s = RunningStats::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            s.push(v);
        }
        assert_eq!(s.count(), 8);
        assert!((s.mean() - 5.0).abs() < 1e-12);
        // Sample variance of this set is 32/7.
        assert!((s.std_dev() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn constant_stream_has_zero_deviation() {
        let mut s = RunningStats::new();
        for _ in 0..500 {
            s.push(3.25);
        }
        assert!((s.mean() - 3.25).abs() < 1e-12);
        assert!(s.std_dev() < 1e-12);
    }

    #[test]
    fn stable_with_large_offset() {
        // Naive sum-of-squares loses these digits; Welford keeps them.
        let mut s = RunningStats::new();
        for v in [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0] {
            s.push(v);
        }
        assert!((s.mean() - (1e9 + 10.0)).abs() < 1e-3);
        assert!((s.std_dev() - 30.0f64.sqrt()).abs() < 1e-6);
    }
}
