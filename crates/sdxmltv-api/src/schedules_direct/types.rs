//! Schedules Direct request and response types.

use serde::{Deserialize, Serialize};

/// Transport names that identify an over-the-air lineup.
const BROADCAST_TRANSPORTS: &[&str] = &["Antenna", "Broadcast"];

// --- Token ---

/// Body of `POST /token`.
#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    /// Account user name.
    pub username: &'a str,
    /// Account password (sent as configured).
    pub password: &'a str,
}

/// Response of `POST /token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    /// Provider status code (`0` = OK).
    #[serde(default)]
    pub code: i64,
    /// Provider message.
    #[serde(default)]
    pub message: Option<String>,
    /// Session token.
    #[serde(default)]
    pub token: Option<String>,
}

// --- Lineups ---

/// A provider lineup (station bundle for one transport at one location).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineup {
    /// Lineup identifier (e.g. `USA-OTA-72201`).
    #[serde(rename = "lineup")]
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Transport (`Antenna`, `Cable`, `Satellite`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Location (postal code or city).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Set when the lineup was removed from the provider.
    #[serde(rename = "isDeleted", default)]
    pub is_deleted: bool,
}

impl Lineup {
    /// Whether the transport is antenna / broadcast.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.transport
            .as_deref()
            .is_some_and(|t| BROADCAST_TRANSPORTS.iter().any(|b| t.contains(b)))
    }
}

/// Response of `GET /lineups` (lineups owned by the account).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupList {
    /// Account lineups in provider order.
    #[serde(default)]
    pub lineups: Vec<Lineup>,
}

impl LineupList {
    /// First broadcast lineup in provider order.
    #[must_use]
    pub fn first_broadcast(&self) -> Option<&Lineup> {
        self.lineups
            .iter()
            .find(|lineup| !lineup.is_deleted && lineup.is_broadcast())
    }
}

/// A headend from `GET /headends` (lineups available at a location).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Headend {
    /// Transport shared by all lineups of the headend.
    #[serde(default)]
    pub transport: Option<String>,
    /// Location of the headend.
    #[serde(default)]
    pub location: Option<String>,
    /// Lineups offered by the headend.
    #[serde(default)]
    pub lineups: Vec<HeadendLineup>,
}

/// A lineup entry inside a [`Headend`].
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HeadendLineup {
    /// Lineup identifier.
    pub lineup: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Headend {
    /// Flattens headends into lineups, each inheriting its headend's transport.
    pub(crate) fn into_lineups(headends: Vec<Self>) -> LineupList {
        let lineups = headends
            .into_iter()
            .flat_map(|headend| {
                let Self {
                    transport,
                    location,
                    lineups,
                } = headend;
                lineups.into_iter().map(move |entry| Lineup {
                    id: entry.lineup,
                    name: entry.name,
                    transport: transport.clone(),
                    location: location.clone(),
                    is_deleted: false,
                })
            })
            .collect();
        LineupList { lineups }
    }
}

// --- Stations ---

/// Station logo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationLogo {
    /// Image URL.
    #[serde(rename = "URL")]
    pub url: String,
}

/// A broadcast station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    /// Station identifier.
    #[serde(rename = "stationID")]
    pub station_id: String,
    /// Call sign (e.g. `KETSDT`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    /// Station name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Station logo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<StationLogo>,
}

impl Station {
    /// Call sign, else name (empty strings ignored).
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.callsign
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.name.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Response of `GET /lineups/{id}` (station metadata).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupDetails {
    /// Stations carried by the lineup.
    #[serde(default)]
    pub stations: Vec<Station>,
}

/// Response of `GET /lineups/{id}/stations` (station id list).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupStations {
    /// Stations to request schedules for.
    #[serde(default)]
    pub stations: Vec<Station>,
}

impl LineupStations {
    /// Station identifiers in provider order.
    #[must_use]
    pub fn station_ids(&self) -> Vec<String> {
        self.stations.iter().map(|s| s.station_id.clone()).collect()
    }
}

// --- Schedules ---

/// One element of the `POST /schedules` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRequest {
    /// Station identifier.
    #[serde(rename = "stationID")]
    pub station_id: String,
    /// Calendar dates (`YYYY-MM-DD`).
    #[serde(rename = "date")]
    pub dates: Vec<String>,
}

/// A single program airing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airing {
    /// Program identifier.
    #[serde(rename = "programID")]
    pub program_id: String,
    /// Start instant (RFC 3339, UTC).
    #[serde(rename = "airDateTime")]
    pub air_date_time: String,
    /// Duration in seconds.
    pub duration: u32,
}

/// Schedule of one station over the requested dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Station identifier.
    #[serde(rename = "stationID")]
    pub station_id: String,
    /// Airings in provider order.
    #[serde(default)]
    pub programs: Vec<Airing>,
}

// --- Programs ---

/// A program title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramTitle {
    /// Title, at most 120 characters.
    #[serde(rename = "title120")]
    pub title120: String,
}

/// A localized description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDescription {
    /// Language code.
    #[serde(rename = "descriptionLanguage", default)]
    pub language: Option<String>,
    /// Description text.
    #[serde(default)]
    pub description: String,
}

/// Long and short descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDescriptions {
    /// Descriptions up to 1000 characters.
    #[serde(default)]
    pub description1000: Vec<ProgramDescription>,
    /// Descriptions up to 100 characters.
    #[serde(default)]
    pub description100: Vec<ProgramDescription>,
}

/// Program metadata from `POST /programs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMetadata {
    /// Program identifier.
    #[serde(rename = "programID")]
    pub program_id: String,
    /// Titles (first one is used).
    #[serde(default)]
    pub titles: Vec<ProgramTitle>,
    /// Episode title.
    #[serde(rename = "episodeTitle150", default)]
    pub episode_title: Option<String>,
    /// Descriptions.
    #[serde(default)]
    pub descriptions: Option<ProgramDescriptions>,
    /// Whether program artwork exists.
    #[serde(rename = "hasImageArtwork", default)]
    pub has_image_artwork: bool,
}

impl ProgramMetadata {
    /// First non-empty title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.titles
            .iter()
            .map(|t| t.title120.as_str())
            .find(|t| !t.is_empty())
    }

    /// Long description, falling back to the short one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        let descriptions = self.descriptions.as_ref()?;
        descriptions
            .description1000
            .iter()
            .chain(&descriptions.description100)
            .map(|d| d.description.as_str())
            .find(|d| !d.is_empty())
    }
}
