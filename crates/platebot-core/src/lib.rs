#![deny(missing_docs)]
//! PlateBot core library.
//!
//! Request processing pipeline for the license plate lookup bot: event routing,
//! admission control, result caching, duplicate-search guarding and resilient
//! access to the data.gov.il datastore.

/// Configuration management.
pub mod config;
/// Vehicle lookup service and search pipeline.
pub mod lookup;
/// Admission control, result cache and duplicate-search guard.
pub mod pipeline;
/// Inbound event classification.
pub mod router;
/// External datastore access with retry and failure classification.
pub mod upstream;
/// Utility functions.
pub mod utils;
/// Vehicle registry record model.
pub mod vehicle;

#[cfg(test)]
pub mod testing;
