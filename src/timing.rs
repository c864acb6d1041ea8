//! Phase timing.

use std::time::{Duration, Instant};

use tracing::debug;

/// Measures how long a phase of the run takes.
pub struct Timer {
    phase: &'static str,
    start: Instant,
}

impl Timer {
    pub fn start(phase: &'static str) -> Self {
        Self {
            phase,
            start: Instant::now(),
        }
    }

    /// Stop the timer and return the elapsed time for the caller's summary.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        debug!(phase = self.phase, elapsed = %format_elapsed(elapsed), "phase finished");
        elapsed
    }
}

/// `42.0s` below a minute, `1.5m` above.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_switches_to_minutes() {
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_finish_returns_elapsed() {
        let timer = Timer::start("Validation");
        assert!(timer.finish() < Duration::from_secs(60));
    }
}
