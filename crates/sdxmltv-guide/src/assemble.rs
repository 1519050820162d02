//! Joins schedules, program metadata and station data into channels and listings.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use sdxmltv_api::schedules_direct::{
    Airing, AssemblyError, LineupDetails, ProgramMetadata, Schedule, Station,
};
use serde::Serialize;

use crate::mapping::ChannelMapping;

/// Title used when a program has no metadata.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// An output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// Station identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Logo URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// An output listing (one airing of one program on one channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// Station identifier of the owning [`Channel`].
    pub channel: String,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// Stop instant (`start + duration`).
    pub stop: DateTime<Utc>,
    /// Program title.
    pub title: String,
    /// Episode title (empty when unknown).
    pub sub_title: String,
    /// Description (empty when unknown).
    pub description: String,
    /// Artwork URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Provider program identifier.
    pub program_id: String,
}

/// Assembled guide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guide {
    /// Channels, one per distinct station id, in first-seen order.
    pub channels: Vec<Channel>,
    /// Listings in schedule order.
    pub listings: Vec<Listing>,
    /// Airings that could not become listings.
    pub skipped: Vec<AssemblyError>,
}

/// Builds channels and listings from decoded schedules.
///
/// Station data comes from `details` when present; `mappings` prefix the
/// display name of configured stations. `pending_stations` are stations the
/// provider returned no schedule for yet (e.g. `SCHEDULE_QUEUED`); each one
/// not already scheduled still gets a channel, after the scheduled ones.
/// Airings with an unusable start or duration are reported in
/// [`Guide::skipped`].
#[must_use]
pub fn assemble(
    schedules: &[Schedule],
    pending_stations: &[String],
    programs: &[ProgramMetadata],
    details: Option<&LineupDetails>,
    mappings: &[ChannelMapping],
    artwork_base_url: &str,
) -> Guide {
    let stations = station_lookup(details);
    let programs: HashMap<&str, &ProgramMetadata> = programs
        .iter()
        .map(|p| (p.program_id.as_str(), p))
        .collect();

    let mut guide = Guide::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for schedule in schedules {
        let station_id = schedule.station_id.as_str();
        if seen.insert(station_id) {
            guide
                .channels
                .push(channel_for(station_id, &stations, mappings));
        }

        for airing in &schedule.programs {
            let program = programs.get(airing.program_id.as_str()).copied();
            match listing_for(station_id, airing, program, artwork_base_url) {
                Ok(listing) => guide.listings.push(listing),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping airing");
                    guide.skipped.push(e);
                }
            }
        }
    }

    for station_id in pending_stations {
        if seen.insert(station_id.as_str()) {
            tracing::debug!(%station_id, "schedule pending, channel without listings");
            guide
                .channels
                .push(channel_for(station_id, &stations, mappings));
        }
    }

    tracing::debug!(
        channels = guide.channels.len(),
        listings = guide.listings.len(),
        skipped = guide.skipped.len(),
        "guide assembled"
    );
    guide
}

/// Builds channels when no schedules are available.
///
/// Uses the lineup-detail stations when there are any, otherwise the
/// static channel map (display name `"{number} {name}"`).
#[must_use]
pub fn channels_only(details: Option<&LineupDetails>, mappings: &[ChannelMapping]) -> Vec<Channel> {
    let mut seen: HashSet<&str> = HashSet::new();

    match details.filter(|d| !d.stations.is_empty()) {
        Some(details) => details
            .stations
            .iter()
            .filter(|station| seen.insert(station.station_id.as_str()))
            .map(|station| Channel {
                id: station.station_id.clone(),
                name: channel_name(&station.station_id, Some(station), mappings),
                icon: station_icon(Some(station)),
            })
            .collect(),
        None => mappings
            .iter()
            .filter(|mapping| seen.insert(mapping.station_id.as_str()))
            .map(|mapping| Channel {
                id: mapping.station_id.clone(),
                name: mapping.fallback_name(),
                icon: None,
            })
            .collect(),
    }
}

fn station_lookup(details: Option<&LineupDetails>) -> HashMap<&str, &Station> {
    let mut lookup = HashMap::new();
    for station in details.map(|d| d.stations.as_slice()).unwrap_or_default() {
        lookup.entry(station.station_id.as_str()).or_insert(station);
    }
    lookup
}

fn channel_for(
    station_id: &str,
    stations: &HashMap<&str, &Station>,
    mappings: &[ChannelMapping],
) -> Channel {
    let station = stations.get(station_id).copied();
    Channel {
        id: String::from(station_id),
        name: channel_name(station_id, station, mappings),
        icon: station_icon(station),
    }
}

/// `"{mapping name} {label}"` for configured stations, else the label.
fn channel_name(station_id: &str, station: Option<&Station>, mappings: &[ChannelMapping]) -> String {
    let label = station
        .and_then(Station::label)
        .map_or_else(|| format!("Channel-{station_id}"), String::from);
    match ChannelMapping::find(mappings, station_id) {
        Some(mapping) => format!("{} {label}", mapping.name),
        None => label,
    }
}

fn station_icon(station: Option<&Station>) -> Option<String> {
    station
        .and_then(|s| s.logo.as_ref())
        .map(|logo| logo.url.clone())
        .filter(|url| !url.is_empty())
}

fn listing_for(
    station_id: &str,
    airing: &Airing,
    program: Option<&ProgramMetadata>,
    artwork_base_url: &str,
) -> Result<Listing, AssemblyError> {
    let invalid = |reason: String| AssemblyError::InvalidAiring {
        station_id: String::from(station_id),
        program_id: airing.program_id.clone(),
        reason,
    };

    if airing.duration == 0 {
        return Err(invalid(String::from("zero duration")));
    }
    let start = DateTime::parse_from_rfc3339(&airing.air_date_time)
        .map_err(|e| invalid(format!("unparseable airDateTime {}: {e}", airing.air_date_time)))?
        .with_timezone(&Utc);
    let stop = start
        .checked_add_signed(TimeDelta::seconds(i64::from(airing.duration)))
        .ok_or_else(|| invalid(String::from("stop time out of range")))?;

    let icon = program.filter(|p| p.has_image_artwork).map(|_| {
        format!(
            "{}/image/{}",
            artwork_base_url.trim_end_matches('/'),
            airing.program_id
        )
    });

    Ok(Listing {
        channel: String::from(station_id),
        start,
        stop,
        title: String::from(program.and_then(ProgramMetadata::title).unwrap_or(UNKNOWN_TITLE)),
        sub_title: program
            .and_then(|p| p.episode_title.clone())
            .unwrap_or_default(),
        description: String::from(program.and_then(ProgramMetadata::description).unwrap_or_default()),
        icon,
        program_id: airing.program_id.clone(),
    })
}
