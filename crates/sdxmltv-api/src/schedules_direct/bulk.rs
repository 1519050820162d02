//! Chunked bulk retrieval of schedules and program metadata.

use std::collections::HashSet;
use std::future::Future;

use chrono::NaiveDate;
use futures::{StreamExt, TryStreamExt, stream};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use super::api::LocalSchedulesDirectApi;
use super::error::{AssemblyError, ProviderError};
use super::types::{ProgramMetadata, Schedule, ScheduleRequest};

/// Maximum stations per `POST /schedules` request.
pub const SCHEDULE_CHUNK_SIZE: usize = 450;

/// Maximum program ids per `POST /programs` request.
pub const PROGRAM_CHUNK_SIZE: usize = 4_500;

/// Decoded records of a bulk fetch plus the entries that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkResult<T> {
    /// Successfully decoded records.
    pub records: Vec<T>,
    /// Provider error entries and malformed records.
    pub skipped: Vec<AssemblyError>,
}

impl<T> BulkResult<T> {
    /// Stations whose entries the provider rejected (e.g. `SCHEDULE_QUEUED`),
    /// in response order, without duplicates.
    #[must_use]
    pub fn rejected_station_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for station_id in self.skipped.iter().filter_map(AssemblyError::rejected_station_id) {
            if !ids.iter().any(|id| id == station_id) {
                ids.push(String::from(station_id));
            }
        }
        ids
    }
}

impl<T> Default for BulkResult<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Splits `items` into consecutive chunks of at most `size` entries.
///
/// Yields `ceil(len / size)` chunks whose concatenation is `items`.
/// A `size` of zero is treated as one.
pub fn chunk_slice<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// Calendar dates (`YYYY-MM-DD`) for `days` consecutive days starting at `today`.
#[must_use]
pub fn schedule_dates(today: NaiveDate, days: u32) -> Vec<String> {
    let count = usize::try_from(days).unwrap_or(usize::MAX);
    today
        .iter_days()
        .take(count)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .collect()
}

/// Fetches schedules for `station_ids` over `dates`, at most
/// [`SCHEDULE_CHUNK_SIZE`] stations per request and `concurrency` requests
/// in flight.
///
/// Chunk responses are concatenated in completion order.
///
/// # Errors
///
/// Returns the first [`ProviderError`]; a failed chunk aborts the whole batch.
#[instrument(skip_all, fields(stations = station_ids.len(), days = dates.len()))]
pub async fn get_schedules(
    api: &(impl LocalSchedulesDirectApi + Sync),
    station_ids: &[String],
    dates: &[String],
    concurrency: usize,
) -> Result<BulkResult<Schedule>, ProviderError> {
    let requests: Vec<ScheduleRequest> = station_ids
        .iter()
        .map(|station_id| ScheduleRequest {
            station_id: station_id.clone(),
            dates: dates.to_vec(),
        })
        .collect();

    let values = fetch_chunks(
        "schedule",
        &requests,
        SCHEDULE_CHUNK_SIZE,
        concurrency,
        |chunk| api.schedule_chunk(chunk),
    )
    .await?;
    Ok(decode_records("schedule", values))
}

/// Fetches metadata for `program_ids`, at most [`PROGRAM_CHUNK_SIZE`] ids
/// per request and `concurrency` requests in flight.
///
/// Duplicate ids are requested once.
///
/// # Errors
///
/// Returns the first [`ProviderError`]; a failed chunk aborts the whole batch.
#[instrument(skip_all, fields(programs = program_ids.len()))]
pub async fn get_programs(
    api: &(impl LocalSchedulesDirectApi + Sync),
    program_ids: &[String],
    concurrency: usize,
) -> Result<BulkResult<ProgramMetadata>, ProviderError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let unique: Vec<String> = program_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let duplicates = program_ids.len().saturating_sub(unique.len());
    if duplicates > 0 {
        tracing::debug!(duplicates, "duplicate program ids removed");
    }

    let values = fetch_chunks(
        "program",
        &unique,
        PROGRAM_CHUNK_SIZE,
        concurrency,
        |chunk| api.program_chunk(chunk),
    )
    .await?;
    Ok(decode_records("program", values))
}

/// Issues one request per chunk with bounded fan-out and concatenates the results.
async fn fetch_chunks<'a, I, F, Fut>(
    kind: &'static str,
    items: &'a [I],
    size: usize,
    concurrency: usize,
    fetch: F,
) -> Result<Vec<Value>, ProviderError>
where
    F: Fn(&'a [I]) -> Fut,
    Fut: Future<Output = Result<Vec<Value>, ProviderError>>,
{
    let total_chunks = items.len().div_ceil(size.max(1));
    let fetch = &fetch;

    let chunks: Vec<Vec<Value>> = stream::iter(chunk_slice(items, size).enumerate())
        .map(|(index, chunk)| async move {
            let records = fetch(chunk).await?;
            tracing::debug!(
                kind,
                chunk = index.saturating_add(1),
                total_chunks,
                requested = chunk.len(),
                fetched = records.len(),
                "bulk chunk completed"
            );
            Ok::<_, ProviderError>(records)
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    let values: Vec<Value> = chunks.into_iter().flatten().collect();
    tracing::info!(
        kind,
        total_chunks,
        fetched = values.len(),
        "bulk fetch completed"
    );
    Ok(values)
}

/// Decodes raw records, skipping provider error entries and malformed shapes.
fn decode_records<T: DeserializeOwned>(kind: &'static str, values: Vec<Value>) -> BulkResult<T> {
    let mut result = BulkResult::default();
    for value in values {
        match decode_record(kind, value) {
            Ok(record) => result.records.push(record),
            Err(skipped) => {
                tracing::warn!(error = %skipped, "skipping provider record");
                result.skipped.push(skipped);
            }
        }
    }
    result
}

fn decode_record<T: DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, AssemblyError> {
    if let Some(code) = value.get("code").and_then(Value::as_i64).filter(|c| *c != 0) {
        let response = value
            .get("response")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(AssemblyError::Rejected {
            kind,
            station_id: value
                .get("stationID")
                .and_then(Value::as_str)
                .map(String::from),
            code,
            response: String::from(response),
        });
    }
    serde_json::from_value(value).map_err(|e| AssemblyError::Malformed {
        kind,
        reason: e.to_string(),
    })
}
