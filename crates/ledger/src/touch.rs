//! Throttle for `last_activity_at` touches.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    pub interval_secs: u64,
    pub capacity: usize,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            capacity: 1024,
        }
    }
}

/// Remembers when each entity was last touched and suppresses repeats inside
/// the interval. Holds at most `capacity` entries; the stalest one is evicted.
#[derive(Debug)]
pub struct TouchThrottle {
    interval: Duration,
    capacity: usize,
    last: Mutex<HashMap<Uuid, Instant>>,
}

impl TouchThrottle {
    pub fn new(interval: Duration, capacity: usize) -> Self {
        Self {
            interval,
            capacity: capacity.max(1),
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &TouchConfig) -> Self {
        Self::new(Duration::from_secs(config.interval_secs), config.capacity)
    }

    /// Returns `true` (and records `now`) when `id` is due for a touch.
    pub fn should_touch(&self, id: Uuid, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = last.get(&id)
            && now.saturating_duration_since(*previous) < self.interval
        {
            return false;
        }
        if !last.contains_key(&id) && last.len() >= self.capacity {
            let stalest = last.iter().min_by_key(|(_, at)| **at).map(|(key, _)| *key);
            if let Some(stalest) = stalest {
                last.remove(&stalest);
            }
        }
        last.insert(id, now);
        true
    }

    pub fn len(&self) -> usize {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for TouchThrottle {
    fn default() -> Self {
        Self::from_config(&TouchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_inside_interval_are_suppressed() {
        let throttle = TouchThrottle::new(Duration::from_secs(60), 8);
        let id = Uuid::new_v4();
        let start = Instant::now();

        assert!(throttle.should_touch(id, start));
        assert!(!throttle.should_touch(id, start + Duration::from_secs(59)));
        assert!(throttle.should_touch(id, start + Duration::from_secs(60)));
    }

    #[test]
    fn entries_are_independent() {
        let throttle = TouchThrottle::new(Duration::from_secs(60), 8);
        let now = Instant::now();
        assert!(throttle.should_touch(Uuid::new_v4(), now));
        assert!(throttle.should_touch(Uuid::new_v4(), now));
        assert_eq!(throttle.len(), 2);
    }

    #[test]
    fn capacity_evicts_stalest_entry() {
        let throttle = TouchThrottle::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(throttle.should_touch(first, start));
        assert!(throttle.should_touch(second, start + Duration::from_secs(1)));
        assert!(throttle.should_touch(Uuid::new_v4(), start + Duration::from_secs(2)));
        assert_eq!(throttle.len(), 2);
        // `first` was evicted, so it is due again.
        assert!(throttle.should_touch(first, start + Duration::from_secs(3)));
    }

    #[test]
    fn reset_forgets_everything() {
        let throttle = TouchThrottle::new(Duration::from_secs(60), 8);
        let id = Uuid::new_v4();
        let now = Instant::now();
        assert!(throttle.should_touch(id, now));
        throttle.reset();
        assert!(throttle.is_empty());
        assert!(throttle.should_touch(id, now));
    }
}
