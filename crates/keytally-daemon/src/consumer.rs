//! Consumer thread
//!
//! Drains the event channel on a dedicated OS thread and feeds every event to
//! the [`StatsEngine`]. This is the only place events are written.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use keytally_core::{CaptureEvent, EventReceiver, StatsEngine};
use parking_lot::Mutex;

use crate::error::StartupError;

/// How long the thread waits for an event before re-checking for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Consumer {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl Consumer {
    pub fn spawn(
        receiver: EventReceiver,
        engine: Arc<Mutex<StatsEngine>>,
    ) -> Result<Self, StartupError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = std::thread::Builder::new()
            .name("keytally-consumer".to_string())
            .spawn(move || run(receiver, engine, flag))
            .map_err(StartupError::Consumer)?;

        Ok(Self { shutdown, handle })
    }

    /// Ask the thread to stop, let it drain whatever is still queued, and
    /// wait for it. Returns the number of events it processed.
    pub fn shutdown(self) -> u64 {
        self.shutdown.store(true, Ordering::SeqCst);
        match self.handle.join() {
            Ok(processed) => processed,
            Err(_) => {
                tracing::error!("Consumer thread panicked");
                0
            }
        }
    }
}

fn run(receiver: EventReceiver, engine: Arc<Mutex<StatsEngine>>, shutdown: Arc<AtomicBool>) -> u64 {
    let mut processed = 0;
    tracing::debug!("Consumer thread started");

    loop {
        match receiver.pop_timeout(POLL_INTERVAL) {
            Ok(Some(event)) => {
                ingest(&engine, event);
                processed += 1;
            }
            Ok(None) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            // Every producer is gone, nothing more can arrive
            Err(()) => break,
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
    }

    // Drain what was captured before the hook came down
    while let Some(event) = receiver.try_pop() {
        ingest(&engine, event);
        processed += 1;
    }

    let dropped = receiver.dropped();
    if dropped > 0 {
        tracing::warn!("{} event(s) were dropped because the queue was full", dropped);
    }
    tracing::debug!("Consumer thread stopped after {} event(s)", processed);
    processed
}

fn ingest(engine: &Mutex<StatsEngine>, event: CaptureEvent) {
    let mut engine = engine.lock();
    if let Err(e) = engine.ingest(event) {
        tracing::warn!("Failed to persist key press: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keytally_core::{event_channel, StatsStore};

    fn engine() -> Arc<Mutex<StatsEngine>> {
        Arc::new(Mutex::new(StatsEngine::new(
            StatsStore::open_in_memory().unwrap(),
            100,
        )))
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let (tx, rx) = event_channel(1000);
        let engine = engine();

        for i in 0..250 {
            tx.push(CaptureEvent::new("Notepad", "Ctrl+S", i));
        }
        tx.push(CaptureEvent::new("Notepad", "Ctrl+C", 250));

        let consumer = Consumer::spawn(rx, Arc::clone(&engine)).unwrap();
        let processed = consumer.shutdown();
        assert_eq!(processed, 251);

        let engine = engine.lock();
        assert_eq!(engine.store().presses_for_app("Notepad").unwrap(), 251);
        assert_eq!(
            engine.store().row("Notepad", "Ctrl+S").unwrap().unwrap().press_count,
            250
        );
        // Sender still alive: drop only after the assertions
        drop(tx);
    }

    #[test]
    fn test_exits_when_senders_are_gone() {
        let (tx, rx) = event_channel(16);
        let engine = engine();
        tx.push(CaptureEvent::new("a", "X", 1));
        drop(tx);

        let consumer = Consumer::spawn(rx, Arc::clone(&engine)).unwrap();
        // The thread exits on its own; shutdown just joins it
        assert_eq!(consumer.shutdown(), 1);
        assert_eq!(engine.lock().history().len(), 1);
    }

    #[test]
    fn test_events_are_processed_in_order() {
        let (tx, rx) = event_channel(16);
        let engine = engine();
        let consumer = Consumer::spawn(rx, Arc::clone(&engine)).unwrap();

        for (i, sig) in ["A", "B", "C"].iter().enumerate() {
            tx.push(CaptureEvent::new("app", *sig, i as u64));
        }
        consumer.shutdown();

        let recent: Vec<_> = engine
            .lock()
            .history()
            .recent(3)
            .into_iter()
            .map(|e| e.signature)
            .collect();
        assert_eq!(recent, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_failed_writes_are_counted_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let engine = Arc::new(Mutex::new(StatsEngine::new(
            StatsStore::open(&path).unwrap(),
            100,
        )));
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE key_statistics;")
            .unwrap();

        let (tx, rx) = event_channel(16);
        let consumer = Consumer::spawn(rx, Arc::clone(&engine)).unwrap();
        for (i, sig) in ["Ctrl+S", "Ctrl+C", "Ctrl+V"].iter().enumerate() {
            tx.push(CaptureEvent::new("Notepad", *sig, i as u64));
        }
        assert_eq!(consumer.shutdown(), 3);

        let engine = engine.lock();
        assert_eq!(engine.failed(), 3);
        assert_eq!(engine.ingested(), 3);
        assert_eq!(engine.history().len(), 3);
        drop(tx);
    }
}
