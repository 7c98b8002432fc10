//! Lead API client.
//!
//! This crate is the single source of truth for the lead API wire contract:
//! field schema, lead pages, single-field PATCH.
//!
//! No retries. No caching. Callers decide what a failure means.

mod client;

pub use client::{ApiClient, ClientError, LeadPage, DEFAULT_PAGE};
