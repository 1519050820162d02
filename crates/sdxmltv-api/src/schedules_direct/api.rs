//! `SchedulesDirectApi` trait definition.
#![allow(clippy::future_not_send)]

use serde_json::Value;

use super::error::ProviderError;
use super::types::{LineupDetails, LineupList, LineupStations, ScheduleRequest};

/// Schedules Direct API trait.
///
/// Abstracts API operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(SchedulesDirectApi: Send)]
pub trait LocalSchedulesDirectApi {
    /// Lists the lineups added to the account.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the HTTP request fails.
    async fn account_lineups(&self) -> Result<LineupList, ProviderError>;

    /// Lists the lineups available at a postal location.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the HTTP request fails.
    async fn available_lineups(
        &self,
        country: &str,
        postal_code: &str,
    ) -> Result<LineupList, ProviderError>;

    /// Adds a lineup to the account.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the HTTP request fails,
    /// or the provider refuses the change.
    async fn add_lineup(&self, lineup_id: &str) -> Result<(), ProviderError>;

    /// Fetches lineup details (station metadata).
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the HTTP request fails.
    async fn lineup_details(&self, lineup_id: &str) -> Result<LineupDetails, ProviderError>;

    /// Fetches the lineup's station list (ids used for schedule queries).
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the HTTP request fails.
    async fn lineup_stations(&self, lineup_id: &str) -> Result<LineupStations, ProviderError>;

    /// Fetches one chunk of schedules (at most 450 stations).
    ///
    /// Records are returned undecoded so a single bad entry can be skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the HTTP request fails.
    async fn schedule_chunk(&self, requests: &[ScheduleRequest])
    -> Result<Vec<Value>, ProviderError>;

    /// Fetches one chunk of program metadata (at most 4500 ids).
    ///
    /// Records are returned undecoded so a single bad entry can be skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the HTTP request fails.
    async fn program_chunk(&self, program_ids: &[String]) -> Result<Vec<Value>, ProviderError>;
}
