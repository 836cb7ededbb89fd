//! In-memory recent-activity history
//!
//! Keeps the last N captured events and answers ranking questions about
//! them. Aggregates are recomputed from the history on every query; nothing
//! derived is cached.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

use crate::event::CaptureEvent;

/// Default number of events kept in memory
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Number of entries listed per section in [`ActivityHistory::summary`]
const SUMMARY_TOP: usize = 5;

/// Bounded FIFO of recent events.
///
/// The oldest event is evicted once `capacity` is exceeded. All rankings break
/// count ties by first appearance in the history.
#[derive(Debug, Clone)]
pub struct ActivityHistory {
    events: VecDeque<CaptureEvent>,
    capacity: usize,
}

impl Default for ActivityHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ActivityHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    pub fn record(&mut self, event: CaptureEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, dropping the oldest events if it shrank
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Events oldest first
    pub fn iter(&self) -> impl Iterator<Item = &CaptureEvent> {
        self.events.iter()
    }

    /// The last `count` events, most recent first
    pub fn recent(&self, count: usize) -> Vec<CaptureEvent> {
        self.events.iter().rev().take(count).cloned().collect()
    }

    /// `(earliest, latest)` capture timestamps, `(0, 0)` when empty
    pub fn time_range(&self) -> (u64, u64) {
        let mut timestamps = self.events.iter().map(|e| e.timestamp_ms);
        let Some(first) = timestamps.next() else {
            return (0, 0);
        };
        timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)))
    }

    pub fn top_apps(&self, limit: usize) -> Vec<(String, u64)> {
        rank(self.events.iter().map(|e| e.app_name.as_str()), limit)
    }

    pub fn top_signatures(&self, limit: usize) -> Vec<(String, u64)> {
        rank(self.events.iter().map(|e| e.signature.as_str()), limit)
    }

    pub fn top_signatures_for_app(&self, app_name: &str, limit: usize) -> Vec<(String, u64)> {
        rank(
            self.events
                .iter()
                .filter(|e| e.app_name == app_name)
                .map(|e| e.signature.as_str()),
            limit,
        )
    }

    /// Press count per application
    pub fn app_counts(&self) -> HashMap<String, u64> {
        counts(self.events.iter().map(|e| e.app_name.as_str()))
    }

    /// Press count per signature across all applications
    pub fn signature_counts(&self) -> HashMap<String, u64> {
        counts(self.events.iter().map(|e| e.signature.as_str()))
    }

    pub fn find_by_app(&self, app_name: &str) -> Vec<CaptureEvent> {
        self.events
            .iter()
            .filter(|e| e.app_name == app_name)
            .cloned()
            .collect()
    }

    pub fn find_by_signature(&self, signature: &str) -> Vec<CaptureEvent> {
        self.events
            .iter()
            .filter(|e| e.signature == signature)
            .cloned()
            .collect()
    }

    /// Plain-text overview of the in-memory view
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let (start, end) = self.time_range();

        out.push_str("Key Press Statistics\n");
        out.push_str("====================\n\n");
        let _ = writeln!(out, "Total presses: {}\n", self.len());
        let _ = writeln!(out, "Time range: {} - {}\n", start, end);

        out.push_str("Top Applications:\n");
        for (app, count) in self.top_apps(SUMMARY_TOP) {
            let _ = writeln!(out, "  {}: {} presses", app, count);
        }

        out.push_str("\nTop Keys:\n");
        for (signature, count) in self.top_signatures(SUMMARY_TOP) {
            let _ = writeln!(out, "  {}: {} presses", signature, count);
        }

        out
    }
}

fn counts<'a>(keys: impl Iterator<Item = &'a str>) -> HashMap<String, u64> {
    let mut map = HashMap::new();
    for key in keys {
        *map.entry(key.to_string()).or_insert(0) += 1;
    }
    map
}

/// Group, count and sort descending. The sort is stable over first-seen
/// order, which makes it the tie-break.
fn rank<'a>(keys: impl Iterator<Item = &'a str>, limit: usize) -> Vec<(String, u64)> {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut ranked: Vec<(&'a str, u64)> = Vec::new();

    for key in keys {
        match index.get(key) {
            Some(&i) => ranked[i].1 += 1,
            None => {
                index.insert(key, ranked.len());
                ranked.push((key, 1));
            }
        }
    }

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
        .into_iter()
        .map(|(key, count)| (key.to_string(), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(app: &str, sig: &str, ts: u64) -> CaptureEvent {
        CaptureEvent::new(app, sig, ts)
    }

    fn history_of(events: &[(&str, &str)]) -> ActivityHistory {
        let mut history = ActivityHistory::new(100);
        for (i, (app, sig)) in events.iter().enumerate() {
            history.record(ev(app, sig, 1000 + i as u64));
        }
        history
    }

    #[test]
    fn test_capacity_bound_and_fifo_eviction() {
        let mut history = ActivityHistory::new(3);
        for i in 0..10 {
            history.record(ev("app", "A", i));
            assert!(history.len() <= 3);
        }

        let recent: Vec<_> = history.recent(3).iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(recent, vec![9, 8, 7]);
    }

    #[test]
    fn test_recent_more_than_len() {
        let history = history_of(&[("a", "X"), ("b", "Y")]);
        let recent = history.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].signature, "Y");
        assert_eq!(recent[1].signature, "X");
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn test_set_capacity_trims_oldest() {
        let mut history = ActivityHistory::new(10);
        for i in 0..6 {
            history.record(ev("app", "A", i));
        }
        history.set_capacity(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.capacity(), 2);
        assert_eq!(history.time_range(), (4, 5));
    }

    #[test]
    fn test_time_range() {
        let mut history = ActivityHistory::new(10);
        assert_eq!(history.time_range(), (0, 0));

        history.record(ev("a", "A", 50));
        history.record(ev("a", "B", 70));
        history.record(ev("a", "C", 60));
        assert_eq!(history.time_range(), (50, 70));
    }

    #[test]
    fn test_top_apps_sorted_with_first_seen_tie_break() {
        let history = history_of(&[
            ("vim", "J"),
            ("firefox", "Ctrl+T"),
            ("vim", "K"),
            ("firefox", "Ctrl+W"),
            ("slack", "Enter"),
            ("slack", "Enter"),
            ("code", "Ctrl+P"),
        ]);

        assert_eq!(
            history.top_apps(10),
            vec![
                ("vim".to_string(), 2),
                ("firefox".to_string(), 2),
                ("slack".to_string(), 2),
                ("code".to_string(), 1),
            ]
        );
        assert_eq!(history.top_apps(1), vec![("vim".to_string(), 2)]);
        assert!(history.top_apps(0).is_empty());
    }

    #[test]
    fn test_top_signatures_for_app() {
        let history = history_of(&[
            ("notepad", "Ctrl+S"),
            ("notepad", "Ctrl+S"),
            ("notepad", "Ctrl+S"),
            ("notepad", "Ctrl+C"),
            ("word", "Ctrl+S"),
        ]);

        assert_eq!(
            history.top_signatures_for_app("notepad", 10),
            vec![("Ctrl+S".to_string(), 3), ("Ctrl+C".to_string(), 1)]
        );
        assert!(history.top_signatures_for_app("excel", 10).is_empty());
        assert_eq!(history.top_signatures(1), vec![("Ctrl+S".to_string(), 4)]);
    }

    #[test]
    fn test_rankings_match_brute_force() {
        let apps = ["a", "b", "c", "d"];
        let sigs = ["X", "Y", "Z", "Ctrl+X", "Alt+Tab"];
        let mut history = ActivityHistory::new(500);
        // Deterministic pseudo-random sequence
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for i in 0..400 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let app = apps[(seed % apps.len() as u64) as usize];
            let sig = sigs[((seed >> 8) % sigs.len() as u64) as usize];
            history.record(ev(app, sig, i));
        }

        for limit in [0, 1, 3, 10] {
            let top = history.top_signatures(limit);
            assert!(top.len() <= limit);
            assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));

            let brute = history.signature_counts();
            for (sig, count) in &top {
                let expected = history.iter().filter(|e| &e.signature == sig).count() as u64;
                assert_eq!(*count, expected);
                assert_eq!(brute[sig], expected);
            }
        }

        let app_total: u64 = history.app_counts().values().sum();
        assert_eq!(app_total, history.len() as u64);
    }

    #[test]
    fn test_find_by_app_and_signature() {
        let history = history_of(&[("a", "X"), ("b", "X"), ("a", "Y")]);
        assert_eq!(history.find_by_app("a").len(), 2);
        assert_eq!(history.find_by_signature("X").len(), 2);
        assert!(history.find_by_app("zzz").is_empty());
    }

    #[test]
    fn test_clear() {
        let mut history = history_of(&[("a", "X"), ("b", "Y")]);
        history.clear();
        assert!(history.is_empty());
        assert!(history.top_apps(5).is_empty());
        assert_eq!(history.time_range(), (0, 0));
    }

    #[test]
    fn test_summary() {
        let history = history_of(&[("vim", "J"), ("vim", "J"), ("firefox", "Ctrl+T")]);
        let summary = history.summary();

        assert!(summary.starts_with("Key Press Statistics\n====================\n\n"));
        assert!(summary.contains("Total presses: 3\n"));
        assert!(summary.contains("Time range: 1000 - 1002\n"));
        assert!(summary.contains("Top Applications:\n  vim: 2 presses\n  firefox: 1 presses\n"));
        assert!(summary.contains("Top Keys:\n  J: 2 presses\n  Ctrl+T: 1 presses\n"));
    }
}
