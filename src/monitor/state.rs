// src/monitor/state.rs
use crate::probe::{ProbeResult, Target};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    pub address: String,
    pub online: bool,
}

/// Per-target status as of the end of one completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub round: u64,
    pub taken_at: DateTime<Utc>,
    pub statuses: BTreeMap<String, TargetStatus>,
}

impl Snapshot {
    pub fn is_online(&self, key: &str) -> Option<bool> {
        self.statuses.get(key).map(|s| s.online)
    }

    pub fn online_count(&self) -> usize {
        self.statuses.values().filter(|s| s.online).count()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// Authoritative target -> status table plus the change decision.
///
/// Every target starts offline. The first update never reports a change,
/// since the initial value is a placeholder rather than an observation.
#[derive(Debug)]
pub struct StateTracker {
    statuses: BTreeMap<String, TargetStatus>,
    round: u64,
    taken_at: DateTime<Utc>,
}

impl StateTracker {
    pub fn new(targets: &[Target]) -> Self {
        let statuses = targets
            .iter()
            .map(|t| {
                (
                    t.key.clone(),
                    TargetStatus {
                        address: t.address(),
                        online: false,
                    },
                )
            })
            .collect();

        Self {
            statuses,
            round: 0,
            taken_at: Utc::now(),
        }
    }

    pub fn is_first_round(&self) -> bool {
        self.round == 0
    }

    /// Number of rounds applied so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.statuses.values().filter(|s| s.online).count()
    }

    /// Apply one round of results and report whether any target flipped.
    ///
    /// All comparisons are made against the table as it stood before this
    /// call, so the answer does not depend on the order of `results`.
    /// Keys in `results` must be unique.
    pub fn update(&mut self, results: &[ProbeResult]) -> bool {
        let first_round = self.is_first_round();

        let latest: HashMap<&str, bool> = results
            .iter()
            .map(|r| (r.key.as_str(), r.reachable))
            .collect();
        debug_assert_eq!(
            latest.len(),
            results.len(),
            "duplicate target keys in one round"
        );

        let differs = latest.iter().any(|(key, reachable)| {
            self.statuses
                .get(*key)
                .map_or(true, |prev| prev.online != *reachable)
        });

        for (key, reachable) in latest {
            self.statuses
                .entry(key.to_string())
                .or_insert_with(|| TargetStatus {
                    address: "?".to_string(),
                    online: false,
                })
                .online = reachable;
        }

        self.round += 1;
        self.taken_at = Utc::now();

        differs && !first_round
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            round: self.round,
            taken_at: self.taken_at,
            statuses: self.statuses.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn targets(keys: &[&str]) -> Vec<Target> {
        keys.iter()
            .map(|k| Target::new(*k, format!("{k}.example.com"), 80, Duration::from_secs(2)))
            .collect()
    }

    fn results(pairs: &[(&str, bool)]) -> Vec<ProbeResult> {
        pairs
            .iter()
            .map(|(k, up)| ProbeResult::new(*k, *up))
            .collect()
    }

    #[test]
    fn test_first_round_never_changes() {
        let mut tracker = StateTracker::new(&targets(&["a", "b"]));
        assert!(tracker.is_first_round());

        let changed = tracker.update(&results(&[("a", true), ("b", true)]));

        assert!(!changed);
        assert!(!tracker.is_first_round());
        assert_eq!(tracker.online_count(), 2);
    }

    #[test]
    fn test_first_round_all_offline_is_not_a_change() {
        let mut tracker = StateTracker::new(&targets(&["a"]));
        assert!(!tracker.update(&results(&[("a", false)])));
        assert!(!tracker.update(&results(&[("a", false)])));
    }

    #[test]
    fn test_change_detected_after_first_round() {
        let mut tracker = StateTracker::new(&targets(&["a", "b"]));
        tracker.update(&results(&[("a", true), ("b", false)]));

        assert!(tracker.update(&results(&[("a", false), ("b", false)])));

        let snap = tracker.snapshot();
        assert_eq!(snap.round, 2);
        assert_eq!(snap.is_online("a"), Some(false));
        assert_eq!(snap.is_online("b"), Some(false));
        assert_eq!(snap.statuses["a"].address, "a.example.com:80");
    }

    #[test]
    fn test_identical_results_are_idempotent() {
        let mut tracker = StateTracker::new(&targets(&["a", "b"]));
        let round = results(&[("a", true), ("b", false)]);
        tracker.update(&round);
        let before = tracker.snapshot().statuses;

        assert!(!tracker.update(&round));
        assert!(!tracker.update(&round));
        assert_eq!(tracker.snapshot().statuses, before);
    }

    #[test]
    fn test_empty_tracker() {
        let mut tracker = StateTracker::new(&[]);
        assert!(tracker.is_empty());
        assert!(!tracker.update(&[]));
        assert!(!tracker.update(&[]));
        assert!(tracker.snapshot().is_empty());
        assert_eq!(tracker.round(), 2);
    }

    #[test]
    fn test_unknown_key_is_tracked() {
        let mut tracker = StateTracker::new(&targets(&["a"]));
        tracker.update(&results(&[("a", true)]));

        assert!(tracker.update(&results(&[("a", true), ("new", false)])));
        assert_eq!(tracker.snapshot().statuses["new"].address, "?");
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "duplicate target keys")]
    fn test_duplicate_keys_rejected() {
        let mut tracker = StateTracker::new(&targets(&["a"]));
        tracker.update(&results(&[("a", true), ("a", false)]));
    }

    proptest! {
        #[test]
        fn prop_update_is_order_independent(
            prev in proptest::collection::vec(any::<bool>(), 1..12),
            next in proptest::collection::vec(any::<bool>(), 1..12),
            seed in any::<u64>(),
        ) {
            let n = prev.len().min(next.len());
            let keys: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
            let key_refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();

            let first: Vec<ProbeResult> = (0..n).map(|i| ProbeResult::new(keys[i].clone(), prev[i])).collect();
            let second: Vec<ProbeResult> = (0..n).map(|i| ProbeResult::new(keys[i].clone(), next[i])).collect();

            let mut shuffled = second.clone();
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }

            let mut in_order = StateTracker::new(&targets(&key_refs));
            let mut reordered = StateTracker::new(&targets(&key_refs));
            in_order.update(&first);
            reordered.update(&first);

            let changed_a = in_order.update(&second);
            let changed_b = reordered.update(&shuffled);

            let expected = (0..n).any(|i| prev[i] != next[i]);
            prop_assert_eq!(changed_a, expected);
            prop_assert_eq!(changed_b, expected);
            prop_assert_eq!(in_order.snapshot().statuses, reordered.snapshot().statuses);
            for i in 0..n {
                prop_assert_eq!(in_order.snapshot().is_online(&keys[i]), Some(next[i]));
            }
        }
    }
}
