use std::collections::VecDeque;
use std::time::Duration;

/// Rolling average over the last `window` segment downloads.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    window: usize,
    samples: VecDeque<f64>,
    initial: f64,
}

impl ThroughputEstimator {
    pub fn new(window: usize, initial: f64) -> Self {
        Self {
            window: window.max(1),
            samples: VecDeque::new(),
            initial,
        }
    }

    /// Records one download and returns its throughput in bits per second.
    pub fn record(&mut self, bytes: usize, elapsed: Duration) -> f64 {
        // local reads can finish within the timer resolution
        let seconds = elapsed.as_secs_f64().max(1e-6);
        let sample = bytes as f64 * 8.0 / seconds;
        self.record_sample(sample);
        sample
    }

    pub fn record_sample(&mut self, bits_per_second: f64) {
        self.samples.push_back(bits_per_second);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    pub fn estimate(&self) -> f64 {
        if self.samples.is_empty() {
            return self.initial;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ThroughputEstimator;
    use std::time::Duration;

    #[test]
    pub fn averages_the_window() {
        let mut estimator = ThroughputEstimator::new(2, 42.0);
        assert_eq!(estimator.estimate(), 42.0);

        assert_eq!(estimator.record(125_000, Duration::from_secs(1)), 1_000_000.0);
        estimator.record_sample(3_000_000.0);
        assert_eq!(estimator.estimate(), 2_000_000.0);

        estimator.record_sample(5_000_000.0);
        assert_eq!(estimator.estimate(), 4_000_000.0);
        assert_eq!(estimator.sample_count(), 2);
    }
}
