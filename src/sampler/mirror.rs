//! Mirroring of raw OS counters into monotonic exported counters.
//!
//! The OS exposes cumulative counters (bytes read, bytes sent) that can go
//! backwards when a device is removed and re-added or a driver reloads. The
//! exported counter only ever grows: each observation is turned into a
//! non-negative delta against the last raw value seen for the same series,
//! and a decrease restarts accumulation from the new raw baseline.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Result of observing one raw counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorUpdate {
    /// Add this many units to the exported counter.
    Delta(u64),
    /// The raw value went down; nothing is added and `baseline` becomes the
    /// reference for the next delta.
    Reset { previous: u64, baseline: u64 },
}

/// Tracks the last raw value per series key.
#[derive(Debug, Default)]
pub struct CounterMirror {
    last: HashMap<String, u64>,
}

impl CounterMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `raw` for `key` and return the increment to apply.
    ///
    /// The first observation of a key yields the full raw value, so the
    /// exported counter starts out equal to the OS counter.
    pub fn observe(&mut self, key: &str, raw: u64) -> MirrorUpdate {
        match self.last.insert(key.to_string(), raw) {
            None => MirrorUpdate::Delta(raw),
            Some(previous) if raw >= previous => MirrorUpdate::Delta(raw - previous),
            Some(previous) => MirrorUpdate::Reset {
                previous,
                baseline: raw,
            },
        }
    }

    /// Forget every key missing from `present`; returns the forgotten keys.
    pub fn retain_present(&mut self, present: &HashSet<&str>) -> Vec<String> {
        forget_absent(&mut self.last, present)
    }
}

/// Per-second rate of completed operations between consecutive samples.
#[derive(Debug, Default)]
pub struct RateTracker {
    last: HashMap<String, (u64, Instant)>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `raw` for `key` at `now`.
    ///
    /// Returns `None` for the first observation, when no time has passed, or
    /// when the counter went backwards.
    pub fn observe(&mut self, key: &str, raw: u64, now: Instant) -> Option<f64> {
        let previous = self.last.insert(key.to_string(), (raw, now));
        let (prev_raw, prev_at) = previous?;
        let elapsed = now.checked_duration_since(prev_at)?.as_secs_f64();
        if raw < prev_raw || elapsed <= 0.0 {
            return None;
        }
        Some((raw - prev_raw) as f64 / elapsed)
    }

    /// Forget every key missing from `present`; returns the forgotten keys.
    pub fn retain_present(&mut self, present: &HashSet<&str>) -> Vec<String> {
        forget_absent(&mut self.last, present)
    }
}

fn forget_absent<V>(last: &mut HashMap<String, V>, present: &HashSet<&str>) -> Vec<String> {
    let mut gone: Vec<String> = last
        .keys()
        .filter(|key| !present.contains(key.as_str()))
        .cloned()
        .collect();
    gone.sort();
    for key in &gone {
        last.remove(key);
    }
    gone
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_observation_mirrors_raw_value() {
        let mut mirror = CounterMirror::new();
        assert_eq!(mirror.observe("sda", 1000), MirrorUpdate::Delta(1000));
        assert_eq!(mirror.observe("sda", 1500), MirrorUpdate::Delta(500));
        assert_eq!(mirror.observe("sda", 1500), MirrorUpdate::Delta(0));
    }

    #[test]
    fn test_decrease_is_a_reset() {
        let mut mirror = CounterMirror::new();
        mirror.observe("eth0", 5000);
        assert_eq!(
            mirror.observe("eth0", 200),
            MirrorUpdate::Reset {
                previous: 5000,
                baseline: 200
            }
        );
        // accumulation restarts from the new baseline
        assert_eq!(mirror.observe("eth0", 260), MirrorUpdate::Delta(60));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut mirror = CounterMirror::new();
        mirror.observe("a", 10);
        assert_eq!(mirror.observe("b", 3), MirrorUpdate::Delta(3));
    }

    #[test]
    fn test_absent_keys_are_forgotten() {
        let mut mirror = CounterMirror::new();
        mirror.observe("sda", 10);
        mirror.observe("sdb", 20);

        let gone = mirror.retain_present(&HashSet::from(["sda"]));
        assert_eq!(gone, vec!["sdb".to_string()]);
        assert!(mirror.retain_present(&HashSet::from(["sda"])).is_empty());

        // a returning device starts over from its raw value
        assert_eq!(mirror.observe("sdb", 5), MirrorUpdate::Delta(5));
        assert_eq!(mirror.observe("sda", 15), MirrorUpdate::Delta(5));
    }

    #[test]
    fn test_rate_tracker_forgets_absent_keys() {
        let mut rates = RateTracker::new();
        let start = Instant::now();
        rates.observe("sda", 100, start);
        rates.observe("sdb", 100, start);

        assert_eq!(rates.retain_present(&HashSet::new()), vec!["sda", "sdb"]);
        assert_eq!(rates.observe("sda", 200, start + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_rate_tracker() {
        let mut rates = RateTracker::new();
        let start = Instant::now();
        assert_eq!(rates.observe("sda", 100, start), None);
        let rate = rates
            .observe("sda", 300, start + Duration::from_secs(2))
            .unwrap();
        assert!((rate - 100.0).abs() < f64::EPSILON);
        assert_eq!(rates.observe("sda", 10, start + Duration::from_secs(3)), None);
        assert_eq!(rates.observe("sda", 10, start + Duration::from_secs(3)), None);
    }
}
