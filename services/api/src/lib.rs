//! services/api/src/lib.rs
//!
//! The API service library: configuration, adapters for external
//! services, the ingestion pipeline, and the HTTP surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod ingest;
pub mod retry;
pub mod uploads;
pub mod web;
