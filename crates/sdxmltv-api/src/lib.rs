//! API client library for sdxmltv.
//!
//! Provides a client for the Schedules Direct JSON API (`20141201`).

/// Schedules Direct API client.
pub mod schedules_direct;
