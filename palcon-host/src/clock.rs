use std::time::Instant;

/// Monotonic performance clock, anchored when the session starts.
#[derive(Debug)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Nanoseconds elapsed since the clock was created.
    pub fn nanotime(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Guest-attributable CPU usage in percent. The host cannot measure
    /// this portably, so it reports zero everywhere.
    #[allow(clippy::unused_self)]
    pub fn cpu_usage(&self) -> i32 {
        0
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanotime_is_monotonic() {
        let clock = HostClock::new();
        let a = clock.nanotime();
        let b = clock.nanotime();
        let c = clock.nanotime();
        assert!(a <= b && b <= c);
    }

    #[test]
    fn cpu_usage_reports_zero() {
        assert_eq!(HostClock::new().cpu_usage(), 0);
    }
}
