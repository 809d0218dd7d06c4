use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub requests: u64,
    pub characters: u64,
    pub audio_files: u64,
    pub errors: u64,
    pub last_request: Option<DateTime<Utc>>,
}

/// Per-identifier counters. Entries are created on first use and kept for
/// the life of the process.
#[derive(Debug, Default)]
pub struct UsageTracker {
    stats: DashMap<String, UsageStats>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, identifier: &str, character_count: usize, success: bool) {
        let mut stats = self.stats.entry(identifier.to_string()).or_default();
        stats.requests += 1;
        stats.characters += character_count as u64;
        stats.last_request = Some(Utc::now());
        if success {
            stats.audio_files += 1;
        } else {
            stats.errors += 1;
        }
    }

    /// Zeroed stats for identifiers never seen.
    pub fn get(&self, identifier: &str) -> UsageStats {
        self.stats
            .get(identifier)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn get_all(&self) -> BTreeMap<String, UsageStats> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_successes_and_errors() {
        let tracker = UsageTracker::new();
        tracker.record("10.0.0.1", 11, true);
        tracker.record("10.0.0.1", 4, false);

        let stats = tracker.get("10.0.0.1");
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.characters, 15);
        assert_eq!(stats.audio_files, 1);
        assert_eq!(stats.errors, 1);
        assert!(stats.last_request.is_some());
    }

    #[test]
    fn unknown_identifier_is_zeroed_and_not_created() {
        let tracker = UsageTracker::new();
        assert_eq!(tracker.get("nobody"), UsageStats::default());
        assert!(tracker.get_all().is_empty());
    }

    #[test]
    fn get_all_is_keyed_by_identifier() {
        let tracker = UsageTracker::new();
        tracker.record("b", 1, true);
        tracker.record("a", 2, true);
        let all = tracker.get_all();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(all["a"].characters, 2);
    }
}
