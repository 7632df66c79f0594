//! Per-component run statistics.

/// Success counts and timing for `run` calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentStats {
    /// Total number of successful runs
    pub runs: u64,
    /// Total number of failed runs
    pub failed_runs: u64,
    /// Total run time in microseconds (successful runs only)
    pub total_run_time_us: u64,
    /// Last run time in microseconds
    pub last_run_time_us: u64,
}

impl ComponentStats {
    /// Calculate average run time in microseconds
    pub fn avg_run_time_us(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.total_run_time_us as f64 / self.runs as f64
        }
    }

    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.runs + self.failed_runs;
        if total == 0 {
            100.0
        } else {
            (self.runs as f64 / total as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, time_us: u64) {
        self.runs += 1;
        self.total_run_time_us += time_us;
        self.last_run_time_us = time_us;
    }

    pub fn record_failure(&mut self) {
        self.failed_runs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = ComponentStats::default();
        assert_eq!(stats.avg_run_time_us(), 0.0);
        assert_eq!(stats.success_rate(), 100.0);
    }

    #[test]
    fn test_record() {
        let mut stats = ComponentStats::default();
        stats.record_success(100);
        stats.record_success(300);
        stats.record_failure();

        assert_eq!(stats.runs, 2);
        assert_eq!(stats.last_run_time_us, 300);
        assert_eq!(stats.avg_run_time_us(), 200.0);
        assert!((stats.success_rate() - 66.666).abs() < 0.01);
    }
}
