//! Flat-file cache layer for sdxmltv.
//!
//! Stores the rendered guide document, the provider auth token and
//! optional diagnostic JSON snapshots. Every write goes through
//! [`write_atomic`] so readers never observe a partially written file.

mod atomic;
mod error;
/// Staleness gate around the rendered guide document.
pub mod gate;
mod snapshot;

pub use atomic::write_atomic;
pub use error::CacheIoError;
#[allow(clippy::module_name_repetitions)]
pub use gate::{CacheGate, DocumentOrigin, ServedDocument};
pub use snapshot::SnapshotWriter;
