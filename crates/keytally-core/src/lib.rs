//! Core of keytally: turns raw key transitions into per-application
//! keystroke statistics.
//!
//! ## Pipeline
//!
//! ```text
//! +----------------+    +---------------+    +-------------+    +----------------+
//! | input backend  | -> | CaptureBridge | -> | EventChannel| -> | StatsEngine    |
//! | (capture ctx)  |    | normalize()   |    | (bounded)   |    | history+store  |
//! +----------------+    +---------------+    +-------------+    +----------------+
//! ```
//!
//! The capture side never blocks: it only samples modifier state, looks up the
//! foreground application and pushes onto the channel. The consumer side owns
//! every mutation of the in-memory [`ActivityHistory`] and the durable
//! [`StatsStore`].

pub mod capture;
pub mod channel;
pub mod engine;
pub mod event;
pub mod history;
pub mod normalize;
pub mod protocol;
pub mod report;
pub mod store;

pub use capture::{
    CaptureBridge, CaptureOptions, CaptureStats, ForegroundResolver, ForegroundSlot, KeyTransition,
};
pub use channel::{event_channel, EventReceiver, EventSender, PushOutcome};
pub use engine::StatsEngine;
pub use event::{CaptureEvent, UNKNOWN_APP};
pub use history::{ActivityHistory, DEFAULT_HISTORY_CAPACITY};
pub use normalize::{normalize, Modifier, ModifierSet, VirtualKey};
pub use store::{AppStats, StatRow, StatsStore, StoreError};
