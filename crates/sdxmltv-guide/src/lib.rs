//! Guide pipeline for sdxmltv.
//!
//! Resolves the broadcast lineup, joins schedules with program metadata
//! into channels and listings, and renders them as an XMLTV document.

/// Channel and listing assembly.
pub mod assemble;
/// Broadcast lineup and station resolution.
pub mod lineup;
mod mapping;
/// End-to-end refresh pipeline and cache-gated service.
pub mod pipeline;
/// XMLTV document rendering.
pub mod xmltv;

pub use assemble::{Channel, Guide, Listing, UNKNOWN_TITLE, assemble, channels_only};
pub use lineup::{StationSet, ensure_broadcast_lineup, resolve_stations};
pub use mapping::ChannelMapping;
pub use pipeline::{GuideService, GuideSettings, RefreshError, build_guide};
pub use xmltv::{DocumentError, build_document, build_document_with_offset, format_timestamp};

use sdxmltv_cache::SnapshotWriter;
use serde::Serialize;

/// Writes a diagnostic snapshot; a failure is only logged.
pub(crate) fn write_snapshot<T: Serialize + ?Sized>(
    snapshots: &SnapshotWriter,
    name: &str,
    value: &T,
) {
    if let Err(e) = snapshots.write(name, value) {
        tracing::warn!(error = %e, snapshot = name, "failed to write snapshot");
    }
}
