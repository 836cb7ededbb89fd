//! The single writer over history and store

use chrono::{DateTime, Utc};

use crate::event::CaptureEvent;
use crate::history::ActivityHistory;
use crate::store::{StatsStore, StoreError};

/// Owns the in-memory history and the durable store.
///
/// Every mutation goes through `&mut self`, so whoever holds the engine (the
/// consumer thread, behind a mutex shared with the IPC server) is the only
/// writer.
pub struct StatsEngine {
    history: ActivityHistory,
    store: StatsStore,
    ingested: u64,
    failed: u64,
}

impl StatsEngine {
    pub fn new(store: StatsStore, history_capacity: usize) -> Self {
        Self {
            history: ActivityHistory::new(history_capacity),
            store,
            ingested: 0,
            failed: 0,
        }
    }

    /// Record an event in memory and count it durably.
    ///
    /// The history is updated even if the store write fails; the error is
    /// returned so the caller can log it and move on.
    pub fn ingest(&mut self, event: CaptureEvent) -> Result<(), StoreError> {
        let at = event_time(&event);
        let result = self.store.upsert_at(&event.app_name, &event.signature, at);

        tracing::debug!("{} in {}", event.signature, event.app_name);
        self.history.record(event);
        self.ingested += 1;

        if result.is_err() {
            self.failed += 1;
        }
        result
    }

    /// Wipe both the durable rows and the recent history
    pub fn clear_all(&mut self) -> Result<usize, StoreError> {
        self.history.clear();
        self.store.clear_all()
    }

    pub fn history(&self) -> &ActivityHistory {
        &self.history
    }

    pub fn store(&self) -> &StatsStore {
        &self.store
    }

    /// Events handed to [`ingest`](Self::ingest) since startup
    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    /// Events whose durable write failed
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

fn event_time(event: &CaptureEvent) -> DateTime<Utc> {
    i64::try_from(event.timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StatsEngine {
        StatsEngine::new(StatsStore::open_in_memory().unwrap(), 100)
    }

    #[test]
    fn test_notepad_scenario() {
        let mut engine = engine();
        for i in 0..3 {
            engine
                .ingest(CaptureEvent::new("Notepad", "Ctrl+S", 1_700_000_000_000 + i))
                .unwrap();
        }
        engine
            .ingest(CaptureEvent::new("Notepad", "Ctrl+C", 1_700_000_000_010))
            .unwrap();

        let stats = engine.store().stats_for_app("Notepad", Some(10)).unwrap();
        let ranked: Vec<_> = stats
            .rows
            .iter()
            .map(|r| (r.signature.as_str(), r.press_count))
            .collect();
        assert_eq!(ranked, vec![("Ctrl+S", 3), ("Ctrl+C", 1)]);
        assert_eq!(stats.total_presses, 4);

        assert_eq!(engine.history().len(), 4);
        assert_eq!(
            engine.history().top_signatures_for_app("Notepad", 5),
            vec![("Ctrl+S".to_string(), 3), ("Ctrl+C".to_string(), 1)]
        );
        assert_eq!(engine.ingested(), 4);
        assert_eq!(engine.failed(), 0);
    }

    #[test]
    fn test_last_pressed_uses_capture_time() {
        let mut engine = engine();
        engine
            .ingest(CaptureEvent::new("app", "A", 1_700_000_000_123))
            .unwrap();

        let row = engine.store().row("app", "A").unwrap().unwrap();
        assert_eq!(row.last_pressed.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_clear_all_resets_history_and_store() {
        let mut engine = engine();
        engine.ingest(CaptureEvent::new("a", "X", 1)).unwrap();
        engine.ingest(CaptureEvent::new("b", "Y", 2)).unwrap();

        assert_eq!(engine.clear_all().unwrap(), 2);
        assert!(engine.history().is_empty());
        assert!(engine.store().all_apps().unwrap().is_empty());
    }

    #[test]
    fn test_history_capacity_applies() {
        let mut engine = StatsEngine::new(StatsStore::open_in_memory().unwrap(), 2);
        for i in 0..5 {
            engine.ingest(CaptureEvent::new("a", "X", i)).unwrap();
        }
        assert_eq!(engine.history().len(), 2);
        assert_eq!(engine.store().presses_for_app("a").unwrap(), 5);
    }

    #[test]
    fn test_failed_write_still_reaches_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let mut engine = StatsEngine::new(StatsStore::open(&path).unwrap(), 100);
        engine
            .ingest(CaptureEvent::new("Notepad", "Ctrl+S", 1_700_000_000_000))
            .unwrap();

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE key_statistics;")
            .unwrap();

        assert!(engine
            .ingest(CaptureEvent::new("Notepad", "Ctrl+C", 1_700_000_000_001))
            .is_err());
        assert!(engine
            .ingest(CaptureEvent::new("firefox", "Ctrl+T", 1_700_000_000_002))
            .is_err());

        assert_eq!(engine.ingested(), 3);
        assert_eq!(engine.failed(), 2);
        assert_eq!(engine.history().len(), 3);
        assert_eq!(engine.history().recent(1)[0].signature, "Ctrl+T");
    }
}
