//! Refresh pipeline: lineup, stations, schedules, programs, assembly, document.

use chrono::Utc;
use sdxmltv_api::schedules_direct::{
    LocalSchedulesDirectApi, ProviderError, get_programs, get_schedules, schedule_dates,
};
use sdxmltv_cache::{CacheGate, ServedDocument, SnapshotWriter};
use tracing::instrument;

use crate::assemble::{assemble, channels_only};
use crate::lineup::{ensure_broadcast_lineup, resolve_stations};
use crate::mapping::ChannelMapping;
use crate::write_snapshot;
use crate::xmltv::{DocumentError, build_document};

/// Inputs of one guide build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideSettings {
    /// Postal code used to find a broadcast lineup.
    pub postal_code: String,
    /// ISO country code (e.g. `USA`).
    pub country: String,
    /// Number of days of schedules, starting today (UTC).
    pub days: u32,
    /// Base URL for program artwork (`{base}/image/{programID}`).
    pub artwork_base_url: String,
    /// Maximum chunk requests in flight.
    pub concurrency: usize,
    /// Static channel map.
    pub channels: Vec<ChannelMapping>,
}

/// A refresh failed; no document was produced.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum RefreshError {
    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Rendering failed.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Runs the whole pipeline and returns the rendered XMLTV document.
///
/// When the provider returns no schedules, the document carries channels
/// only (from the lineup details, else the static map).
///
/// # Errors
///
/// Returns [`RefreshError`] on the first provider or rendering failure.
/// Malformed records are skipped and never fail the build.
#[instrument(skip_all, fields(postal_code = %settings.postal_code, days = settings.days))]
pub async fn build_guide(
    api: &(impl LocalSchedulesDirectApi + Sync),
    settings: &GuideSettings,
    snapshots: &SnapshotWriter,
) -> Result<Vec<u8>, RefreshError> {
    let lineups =
        ensure_broadcast_lineup(api, &settings.postal_code, &settings.country, snapshots).await?;
    let stations = resolve_stations(api, &lineups, &settings.channels, snapshots).await?;

    let dates = schedule_dates(Utc::now().date_naive(), settings.days);
    let schedules = get_schedules(api, &stations.station_ids, &dates, settings.concurrency).await?;
    write_snapshot(snapshots, "sd_schedules.json", &schedules.records);

    if schedules.records.is_empty() {
        let channels = channels_only(stations.details.as_ref(), &settings.channels);
        tracing::warn!(
            channels = channels.len(),
            "no schedules available, building channels-only guide"
        );
        write_snapshot(snapshots, "sd_channels.json", &channels);
        return Ok(build_document(&channels, &[])?);
    }

    let program_ids: Vec<String> = schedules
        .records
        .iter()
        .flat_map(|s| s.programs.iter().map(|a| a.program_id.clone()))
        .collect();
    let programs = get_programs(api, &program_ids, settings.concurrency).await?;
    write_snapshot(snapshots, "sd_programs.json", &programs.records);

    let pending = schedules.rejected_station_ids();
    if !pending.is_empty() {
        tracing::warn!(
            stations = pending.len(),
            "schedules not ready for some stations, listing them without programmes"
        );
    }
    let guide = assemble(
        &schedules.records,
        &pending,
        &programs.records,
        stations.details.as_ref(),
        &settings.channels,
        &settings.artwork_base_url,
    );
    write_snapshot(snapshots, "sd_channels.json", &guide.channels);
    write_snapshot(snapshots, "sd_listings.json", &guide.listings);

    let skipped = schedules
        .skipped
        .len()
        .saturating_add(programs.skipped.len())
        .saturating_add(guide.skipped.len());
    tracing::info!(
        channels = guide.channels.len(),
        listings = guide.listings.len(),
        skipped,
        "guide built"
    );

    Ok(build_document(&guide.channels, &guide.listings)?)
}

/// Cache-gated guide service owning the provider session.
#[derive(Debug)]
pub struct GuideService<A> {
    /// Provider session.
    api: A,
    /// Pipeline inputs.
    settings: GuideSettings,
    /// Cached document gate.
    gate: CacheGate,
    /// Diagnostic snapshot writer.
    snapshots: SnapshotWriter,
}

impl<A: LocalSchedulesDirectApi + Sync> GuideService<A> {
    /// Creates a service.
    #[must_use]
    pub const fn new(
        api: A,
        settings: GuideSettings,
        gate: CacheGate,
        snapshots: SnapshotWriter,
    ) -> Self {
        Self {
            api,
            settings,
            gate,
            snapshots,
        }
    }

    /// Provider session.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Cached document gate.
    #[must_use]
    pub const fn gate(&self) -> &CacheGate {
        &self.gate
    }

    /// Serves the cached document when fresh, otherwise rebuilds it.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] if a rebuild was needed and failed.
    pub async fn serve(&self) -> Result<ServedDocument, RefreshError> {
        self.gate
            .get_or_refresh(|| build_guide(&self.api, &self.settings, &self.snapshots))
            .await
    }

    /// Rebuilds the document regardless of freshness.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] if the rebuild fails.
    pub async fn refresh(&self) -> Result<Vec<u8>, RefreshError> {
        self.gate
            .refresh(|| build_guide(&self.api, &self.settings, &self.snapshots))
            .await
    }

    /// Rebuilds the document unless a refresh is already running.
    ///
    /// Returns `Ok(None)` when suppressed.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] if the rebuild fails.
    pub async fn try_refresh(&self) -> Result<Option<Vec<u8>>, RefreshError> {
        self.gate
            .try_refresh(|| build_guide(&self.api, &self.settings, &self.snapshots))
            .await
    }
}
