//! Capture -> consumer event channel
//!
//! A bounded multi-producer FIFO on top of `crossbeam_channel`. Producers run
//! in the capture context and must never block, so when the queue is at its
//! cap the oldest unconsumed event is evicted to make room for the new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::event::CaptureEvent;

/// Upper bound on evict-and-retry rounds for a single push. Only reached when
/// other producers keep refilling the queue between our eviction and retry.
const MAX_PUSH_ATTEMPTS: usize = 8;

/// Result of a non-blocking push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without touching anything else
    Queued,
    /// Queued after evicting this many older events
    Evicted(usize),
    /// The queue stayed full through every retry; the new event was dropped
    Dropped,
}

/// Create a bounded event channel holding at most `capacity` events
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));

    let sender = EventSender {
        tx,
        evict: rx.clone(),
        dropped: Arc::clone(&dropped),
    };
    let receiver = EventReceiver { rx, dropped };

    (sender, receiver)
}

/// Producer half. Cheap to clone; every clone shares the same queue.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<CaptureEvent>,
    // Used only to pop the oldest entry when the queue is full
    evict: Receiver<CaptureEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Push an event without blocking, evicting the oldest on overflow
    pub fn push(&self, event: CaptureEvent) -> PushOutcome {
        let mut pending = event;
        let mut evicted = 0;

        for _ in 0..MAX_PUSH_ATTEMPTS {
            match self.tx.try_send(pending) {
                Ok(()) => {
                    return if evicted == 0 {
                        PushOutcome::Queued
                    } else {
                        PushOutcome::Evicted(evicted)
                    };
                }
                Err(TrySendError::Full(event)) => {
                    pending = event;
                    if let Ok(old) = self.evict.try_recv() {
                        evicted += 1;
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            "Event channel full, dropped {} in {}",
                            old.signature,
                            old.app_name
                        );
                    }
                }
                // Unreachable while `evict` is alive, but never block or panic here
                Err(TrySendError::Disconnected(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return PushOutcome::Dropped;
                }
            }
        }

        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Event channel saturated, dropped newest event");
        PushOutcome::Dropped
    }

    /// Total events lost to overflow since the channel was created
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// Consumer half. There is exactly one; it is not `Clone`.
pub struct EventReceiver {
    rx: Receiver<CaptureEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Take the oldest event if one is queued
    pub fn try_pop(&self) -> Option<CaptureEvent> {
        self.rx.try_recv().ok()
    }

    /// Block until an event arrives. Returns `None` once every sender has
    /// been dropped and the queue is drained.
    pub fn pop(&self) -> Option<CaptureEvent> {
        self.rx.recv().ok()
    }

    /// Block for at most `timeout`.
    ///
    /// `Ok(None)` means the timeout elapsed; `Err(())` means every sender is
    /// gone and nothing is left to read.
    #[allow(clippy::result_unit_err)]
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<CaptureEvent>, ()> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ev(sig: &str, ts: u64) -> CaptureEvent {
        CaptureEvent::new("app", sig, ts)
    }

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = event_channel(16);
        for i in 0..5 {
            assert_eq!(tx.push(ev(&format!("K{}", i), i)), PushOutcome::Queued);
        }
        assert_eq!(rx.len(), 5);

        let drained: Vec<_> = std::iter::from_fn(|| rx.try_pop())
            .map(|e| e.timestamp_ms)
            .collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_try_pop_on_empty() {
        let (_tx, rx) = event_channel(4);
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let (tx, rx) = event_channel(3);
        for i in 0..3 {
            tx.push(ev("A", i));
        }

        assert_eq!(tx.push(ev("A", 3)), PushOutcome::Evicted(1));
        assert_eq!(tx.push(ev("A", 4)), PushOutcome::Evicted(1));
        assert_eq!(tx.dropped(), 2);
        assert_eq!(rx.dropped(), 2);

        let drained: Vec<_> = std::iter::from_fn(|| rx.try_pop())
            .map(|e| e.timestamp_ms)
            .collect();
        assert_eq!(drained, vec![2, 3, 4]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, rx) = event_channel(0);
        assert_eq!(tx.capacity(), 1);
        tx.push(ev("A", 1));
        tx.push(ev("B", 2));
        assert_eq!(rx.try_pop().map(|e| e.signature), Some("B".to_string()));
    }

    #[test]
    fn test_pop_returns_none_after_senders_dropped() {
        let (tx, rx) = event_channel(4);
        tx.push(ev("A", 1));
        drop(tx);

        assert_eq!(rx.pop().map(|e| e.signature), Some("A".to_string()));
        assert_eq!(rx.pop(), None);
        assert_eq!(rx.pop_timeout(Duration::from_millis(10)), Err(()));
    }

    #[test]
    fn test_pop_timeout_elapses() {
        let (_tx, rx) = event_channel(4);
        assert_eq!(rx.pop_timeout(Duration::from_millis(10)), Ok(None));
    }

    #[test]
    fn test_multiple_producers_lose_nothing_below_cap() {
        let (tx, rx) = event_channel(10_000);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        tx.push(ev(&format!("T{}", t), i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(tx);

        let mut per_thread = [0u64; 4];
        let mut last_seen = [None::<u64>; 4];
        while let Some(event) = rx.pop() {
            let t: usize = event.signature[1..].parse().unwrap();
            per_thread[t] += 1;
            // Each producer's own events stay in order
            if let Some(prev) = last_seen[t] {
                assert!(event.timestamp_ms > prev);
            }
            last_seen[t] = Some(event.timestamp_ms);
        }
        assert_eq!(per_thread, [500; 4]);
        assert_eq!(rx.dropped(), 0);
    }
}
