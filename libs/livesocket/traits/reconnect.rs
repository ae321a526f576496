use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// The connection loop asks the strategy for a delay every time it has to
/// schedule a reconnect. The attempt counter it passes in is owned by the
/// loop: it grows by one each time a scheduled reconnect fires and drops back
/// to zero only after a successful open.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Reconnects fired since the last successful open (0-indexed)
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff reconnection strategy
///
/// Delays between reconnection attempts grow exponentially:
/// initial_delay * 2^attempt, capped at max_delay. There is no attempt limit,
/// the connection loop keeps retrying for the lifetime of the service.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The delay before the first reconnect
    /// * `max_delay` - The maximum delay between reconnects
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for ExponentialBackoff {
    /// 1s doubling up to a 10s cap
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(10_000))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;

        let delay = 2u64
            .checked_pow(attempt)
            .and_then(|factor| initial.checked_mul(factor))
            .unwrap_or(u64::MAX);

        Duration::from_millis(delay.min(cap))
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_sequence() {
        let strategy = ExponentialBackoff::default();
        let delays: Vec<u64> = (0..7)
            .map(|attempt| strategy.next_delay(attempt).as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000, 10_000]);
    }

    #[test]
    fn test_backoff_never_overflows() {
        let strategy = ExponentialBackoff::default();

        assert_eq!(strategy.next_delay(63), Duration::from_millis(10_000));
        assert_eq!(strategy.next_delay(64), Duration::from_millis(10_000));
        assert_eq!(strategy.next_delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_fixed_delay_is_constant() {
        let strategy = FixedDelay::new(Duration::from_millis(250));
        for attempt in [0, 1, 5, 100] {
            assert_eq!(strategy.next_delay(attempt), Duration::from_millis(250));
        }
    }
}
