//! Trellis incremental synchronizer
//!
//! Keeps the graph consistent with a live source tree. Filesystem events
//! flow through a plain channel into a per-path state machine:
//!
//! ```text
//! Idle ──event──▶ Pending ──debounce──▶ Extracting ──▶ Applied (Idle)
//!                    │                      │
//!                    └──── newer event supersedes ────┘
//! ```
//!
//! A burst of events for one path collapses to a single extraction of the
//! latest content (last-write-wins); distinct paths proceed in parallel,
//! while each path has at most one in-flight extraction. The state machine
//! is driven by [`ChangeEvent`]s on a channel, so tests inject synthetic
//! sequences and the `notify` backend is just one producer.

pub mod error;
pub mod events;
pub mod sync;
pub mod watcher;

pub use error::{WatchError, WatchResult};
pub use events::{ChangeEvent, ChangeKind};
pub use sync::{PathState, SyncConfig, Synchronizer, UnitProcessor};
pub use watcher::FsWatcher;
