//! Broadcast lineup selection and station-list resolution.

use sdxmltv_api::schedules_direct::{
    LineupDetails, LineupList, LocalSchedulesDirectApi, ProviderError,
};
use sdxmltv_cache::SnapshotWriter;
use tracing::instrument;

use crate::mapping::ChannelMapping;
use crate::write_snapshot;

/// Stations to fetch schedules for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationSet {
    /// Broadcast lineup the stations come from (`None` = static map).
    pub lineup_id: Option<String>,
    /// Station metadata of the lineup.
    pub details: Option<LineupDetails>,
    /// Station identifiers in provider (or configuration) order.
    pub station_ids: Vec<String>,
}

impl StationSet {
    fn from_mappings(mappings: &[ChannelMapping]) -> Self {
        Self {
            lineup_id: None,
            details: None,
            station_ids: mappings.iter().map(|m| m.station_id.clone()).collect(),
        }
    }
}

/// Makes sure the account carries an antenna/broadcast lineup.
///
/// When none is present, the first broadcast lineup available at the
/// postal location (provider order) is added and the account lineups are
/// listed again. If the location has none, the account lineups are
/// returned unchanged.
///
/// # Errors
///
/// Returns [`ProviderError`] if any provider call fails.
#[instrument(skip_all, fields(postal_code = %postal_code, country = %country))]
pub async fn ensure_broadcast_lineup(
    api: &(impl LocalSchedulesDirectApi + Sync),
    postal_code: &str,
    country: &str,
    snapshots: &SnapshotWriter,
) -> Result<LineupList, ProviderError> {
    let mut lineups = api.account_lineups().await?;

    let existing = lineups.first_broadcast().map(|l| l.id.clone());
    if let Some(lineup_id) = existing {
        tracing::debug!(%lineup_id, "broadcast lineup already on account");
    } else {
        let available = api.available_lineups(country, postal_code).await?;
        if let Some(candidate) = available.first_broadcast() {
            tracing::info!(lineup_id = %candidate.id, "adding broadcast lineup");
            api.add_lineup(&candidate.id).await?;
            lineups = api.account_lineups().await?;
        } else {
            tracing::warn!(
                available = available.lineups.len(),
                "no broadcast lineup available at this location"
            );
        }
    }

    write_snapshot(snapshots, "sd_lineups.json", &lineups);
    Ok(lineups)
}

/// Resolves the station list from the first broadcast lineup.
///
/// Fetches lineup details and the lineup station list (two provider
/// calls). Without a broadcast lineup, or when the lineup lists no
/// stations, the station ids of the static channel map are used.
///
/// # Errors
///
/// Returns [`ProviderError`] if a provider call fails.
#[instrument(skip_all)]
pub async fn resolve_stations(
    api: &(impl LocalSchedulesDirectApi + Sync),
    lineups: &LineupList,
    mappings: &[ChannelMapping],
    snapshots: &SnapshotWriter,
) -> Result<StationSet, ProviderError> {
    let Some(lineup) = lineups.first_broadcast() else {
        tracing::warn!(
            configured = mappings.len(),
            "no broadcast lineup, using configured channels"
        );
        return Ok(StationSet::from_mappings(mappings));
    };

    let details = api.lineup_details(&lineup.id).await?;
    write_snapshot(snapshots, "sd_lineup_details.json", &details);
    let stations = api.lineup_stations(&lineup.id).await?;
    write_snapshot(snapshots, "sd_lineup_stations.json", &stations);

    let station_ids = stations.station_ids();
    if station_ids.is_empty() {
        tracing::warn!(
            lineup_id = %lineup.id,
            configured = mappings.len(),
            "lineup lists no stations, using configured channels"
        );
        return Ok(StationSet {
            lineup_id: Some(lineup.id.clone()),
            details: Some(details),
            ..StationSet::from_mappings(mappings)
        });
    }

    tracing::info!(lineup_id = %lineup.id, stations = station_ids.len(), "stations resolved");
    Ok(StationSet {
        lineup_id: Some(lineup.id.clone()),
        details: Some(details),
        station_ids,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use sdxmltv_api::schedules_direct::{Lineup, LineupStations, ScheduleRequest, Station};
    use serde_json::Value;

    use super::*;

    /// Mock provider with an account lineup list that `add_lineup` mutates.
    struct MockLineupApi {
        account: Mutex<Vec<Lineup>>,
        available: Vec<Lineup>,
        stations: Vec<Station>,
        added: Mutex<Vec<String>>,
        account_calls: AtomicU32,
    }

    impl MockLineupApi {
        fn new(account: Vec<Lineup>, available: Vec<Lineup>) -> Self {
            Self {
                account: Mutex::new(account),
                available,
                stations: vec![station("98078"), station("98079")],
                added: Mutex::new(Vec::new()),
                account_calls: AtomicU32::new(0),
            }
        }
    }

    impl LocalSchedulesDirectApi for MockLineupApi {
        async fn account_lineups(&self) -> Result<LineupList, ProviderError> {
            self.account_calls.fetch_add(1, Ordering::SeqCst);
            Ok(LineupList {
                lineups: self.account.lock().unwrap().clone(),
            })
        }

        async fn available_lineups(
            &self,
            _country: &str,
            _postal_code: &str,
        ) -> Result<LineupList, ProviderError> {
            Ok(LineupList {
                lineups: self.available.clone(),
            })
        }

        async fn add_lineup(&self, lineup_id: &str) -> Result<(), ProviderError> {
            self.added.lock().unwrap().push(String::from(lineup_id));
            let lineup = self
                .available
                .iter()
                .find(|l| l.id == lineup_id)
                .cloned()
                .unwrap();
            self.account.lock().unwrap().push(lineup);
            Ok(())
        }

        async fn lineup_details(&self, _lineup_id: &str) -> Result<LineupDetails, ProviderError> {
            Ok(LineupDetails {
                stations: self.stations.clone(),
            })
        }

        async fn lineup_stations(
            &self,
            _lineup_id: &str,
        ) -> Result<LineupStations, ProviderError> {
            Ok(LineupStations {
                stations: self.stations.clone(),
            })
        }

        async fn schedule_chunk(
            &self,
            _requests: &[ScheduleRequest],
        ) -> Result<Vec<Value>, ProviderError> {
            Ok(vec![])
        }

        async fn program_chunk(&self, _program_ids: &[String]) -> Result<Vec<Value>, ProviderError> {
            Ok(vec![])
        }
    }

    fn lineup(id: &str, transport: &str) -> Lineup {
        Lineup {
            id: String::from(id),
            name: None,
            transport: Some(String::from(transport)),
            location: None,
            is_deleted: false,
        }
    }

    fn station(id: &str) -> Station {
        Station {
            station_id: String::from(id),
            callsign: None,
            name: None,
            logo: None,
        }
    }

    fn mappings() -> Vec<ChannelMapping> {
        vec![
            ChannelMapping {
                number: String::from("2.1"),
                station_id: String::from("98078"),
                name: String::from("KETS-1"),
            },
            ChannelMapping {
                number: String::from("3.1"),
                station_id: String::from("30750"),
                name: String::from("CATCHY"),
            },
        ]
    }

    #[tokio::test]
    async fn test_existing_broadcast_lineup_is_kept() {
        // Arrange
        let api = MockLineupApi::new(vec![lineup("USA-OTA-72201", "Antenna")], vec![]);

        // Act
        let lineups = ensure_broadcast_lineup(&api, "72201", "USA", &SnapshotWriter::disabled())
            .await
            .unwrap();

        // Assert
        assert_eq!(lineups.lineups.len(), 1);
        assert!(api.added.lock().unwrap().is_empty());
        assert_eq!(api.account_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_available_broadcast_lineup_is_added() {
        // Arrange
        let api = MockLineupApi::new(
            vec![lineup("USA-AR12345-X", "Cable")],
            vec![
                lineup("USA-DISH693-DEFAULT", "Satellite"),
                lineup("USA-OTA-72201", "Antenna"),
                lineup("USA-OTA-72202", "Antenna"),
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotWriter::new(dir.path());

        // Act
        let lineups = ensure_broadcast_lineup(&api, "72201", "USA", &snapshots)
            .await
            .unwrap();

        // Assert
        assert_eq!(*api.added.lock().unwrap(), ["USA-OTA-72201"]);
        assert_eq!(api.account_calls.load(Ordering::SeqCst), 2);
        assert_eq!(lineups.first_broadcast().unwrap().id, "USA-OTA-72201");
        assert!(dir.path().join("sd_lineups.json").exists());
    }

    #[tokio::test]
    async fn test_no_broadcast_lineup_anywhere_returns_account_set() {
        // Arrange
        let api = MockLineupApi::new(
            vec![lineup("USA-AR12345-X", "Cable")],
            vec![lineup("USA-DISH693-DEFAULT", "Satellite")],
        );

        // Act
        let lineups = ensure_broadcast_lineup(&api, "72201", "USA", &SnapshotWriter::disabled())
            .await
            .unwrap();

        // Assert
        assert_eq!(lineups.lineups.len(), 1);
        assert!(lineups.first_broadcast().is_none());
        assert!(api.added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_stations_from_lineup() {
        // Arrange
        let api = MockLineupApi::new(vec![], vec![]);
        let lineups = LineupList {
            lineups: vec![lineup("USA-OTA-72201", "Antenna")],
        };
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotWriter::new(dir.path());

        // Act
        let set = resolve_stations(&api, &lineups, &mappings(), &snapshots)
            .await
            .unwrap();

        // Assert
        assert_eq!(set.lineup_id.as_deref(), Some("USA-OTA-72201"));
        assert_eq!(set.station_ids, ["98078", "98079"]);
        assert_eq!(set.details.unwrap().stations.len(), 2);
        assert!(dir.path().join("sd_lineup_details.json").exists());
        assert!(dir.path().join("sd_lineup_stations.json").exists());
    }

    #[tokio::test]
    async fn test_resolve_stations_without_lineup_uses_static_map() {
        // Arrange
        let api = MockLineupApi::new(vec![], vec![]);

        // Act
        let set = resolve_stations(
            &api,
            &LineupList::default(),
            &mappings(),
            &SnapshotWriter::disabled(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(set.lineup_id, None);
        assert_eq!(set.details, None);
        assert_eq!(set.station_ids, ["98078", "30750"]);
    }

    #[tokio::test]
    async fn test_resolve_stations_empty_lineup_uses_static_map() {
        // Arrange
        let mut api = MockLineupApi::new(vec![], vec![]);
        api.stations.clear();
        let lineups = LineupList {
            lineups: vec![lineup("USA-OTA-72201", "Antenna")],
        };

        // Act
        let set = resolve_stations(&api, &lineups, &mappings(), &SnapshotWriter::disabled())
            .await
            .unwrap();

        // Assert
        assert_eq!(set.lineup_id.as_deref(), Some("USA-OTA-72201"));
        assert_eq!(set.station_ids, ["98078", "30750"]);
    }
}
