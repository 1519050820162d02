//! Static channel map entries.

use serde::{Deserialize, Serialize};

/// A configured channel: broadcast number, provider station id and label.
///
/// Used to prefix display names and as the fallback station list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    /// Virtual channel number (e.g. `2.1`).
    pub number: String,
    /// Provider station identifier.
    pub station_id: String,
    /// Label (e.g. `KETS-1`).
    pub name: String,
}

impl ChannelMapping {
    /// First mapping for `station_id`.
    pub(crate) fn find<'a>(mappings: &'a [Self], station_id: &str) -> Option<&'a Self> {
        mappings.iter().find(|m| m.station_id == station_id)
    }

    /// Display name used when no provider station data exists.
    pub(crate) fn fallback_name(&self) -> String {
        format!("{} {}", self.number, self.name)
    }
}
