//! Coalescing of bursty change events.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Default quiet period before pending items are released.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Collects distinct items until no new one has arrived for `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer<T: Ord> {
    delay: Duration,
    pending: BTreeSet<T>,
    last_event: Option<Instant>,
}

impl<T: Ord> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record an item and restart the quiet period.
    pub fn push(&mut self, item: T, now: Instant) {
        self.pending.insert(item);
        self.last_event = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Time left before the batch is ready; `None` when nothing is pending.
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        if !self.is_pending() {
            return None;
        }
        let elapsed = self
            .last_event
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(self.delay);
        Some(self.delay.saturating_sub(elapsed))
    }

    /// Drain the batch once the quiet period has elapsed.
    pub fn take_ready(&mut self, now: Instant) -> Option<Vec<T>> {
        match self.time_remaining(now) {
            Some(remaining) if remaining.is_zero() => {
                self.last_event = None;
                Some(std::mem::take(&mut self.pending).into_iter().collect())
            }
            _ => None,
        }
    }
}

impl<T: Ord> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_coalesces_into_one_batch() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.push("b.rs", start);
        debouncer.push("a.rs", start + Duration::from_millis(30));
        debouncer.push("b.rs", start + Duration::from_millis(60));

        assert!(debouncer.take_ready(start + Duration::from_millis(120)).is_none());
        assert_eq!(
            debouncer.time_remaining(start + Duration::from_millis(120)),
            Some(Duration::from_millis(40))
        );

        let batch = debouncer.take_ready(start + Duration::from_millis(160)).unwrap();
        assert_eq!(batch, vec!["a.rs", "b.rs"]);
        assert!(!debouncer.is_pending());
        assert!(debouncer.take_ready(start + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_nothing_pending() {
        let debouncer: Debouncer<String> = Debouncer::default();
        assert_eq!(debouncer.delay(), Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert_eq!(debouncer.time_remaining(Instant::now()), None);
    }

    #[test]
    fn test_zero_delay_is_immediately_ready() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.push(1, now);
        assert_eq!(debouncer.take_ready(now), Some(vec![1]));
    }
}
