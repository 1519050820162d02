//! Schedules Direct API client module.
//!
//! Handles the token lifecycle, lineup management and the chunked bulk
//! `schedules` / `programs` endpoints.

mod api;
mod bulk;
mod client;
mod error;
mod token;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalSchedulesDirectApi, SchedulesDirectApi};
pub use bulk::{
    BulkResult, PROGRAM_CHUNK_SIZE, SCHEDULE_CHUNK_SIZE, chunk_slice, get_programs,
    get_schedules, schedule_dates,
};
#[allow(clippy::module_name_repetitions)]
pub use client::{DEFAULT_BASE_URL, SchedulesDirectClient, SchedulesDirectClientBuilder};
pub use error::{AssemblyError, AuthError, ProviderError};
/// HTTP method carried by [`ProviderError`].
pub use reqwest::Method;
pub use token::{AuthToken, TOKEN_VALIDITY_HOURS, TokenStore};
pub use types::{
    Airing, Lineup, LineupDetails, LineupList, LineupStations, ProgramDescription,
    ProgramDescriptions, ProgramMetadata, ProgramTitle, Schedule, ScheduleRequest, Station,
    StationLogo,
};
