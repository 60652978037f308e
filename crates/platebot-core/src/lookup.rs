//! Vehicle lookups and the plate search pipeline
//!
//! [`VehicleLookupService`] answers "which vehicle has this plate" and "does
//! it hold a disability permit", consulting the shared result cache before
//! the datastore. [`SearchPipeline`] composes the duplicate-search guard with
//! both lookups for one user request.

use crate::config::{PipelineSettings, DISABILITY_CACHE_NAMESPACE, VEHICLE_CACHE_NAMESPACE};
use crate::pipeline::{cache_key, ResultCache, SearchGuard};
use crate::router::plate::{validate_plate, PlateError};
use crate::upstream::{
    classify, DatastoreQuery, ErrorClassification, ErrorKind, FetchError, FetchFault,
    ResilientFetcher,
};
use crate::vehicle::VehicleRecord;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Value stored in the shared lookup cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedLookup {
    /// Registry result; `None` is a cached "not found"
    Vehicle(Option<VehicleRecord>),
    /// Disability permit flag
    Permit(bool),
}

/// Why a lookup could not produce an answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Plate failed validation; nothing was fetched
    #[error(transparent)]
    InvalidPlate(#[from] PlateError),
    /// Datastore call failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl LookupError {
    /// Classification of this failure
    #[must_use]
    pub fn classification(&self) -> ErrorClassification {
        match self {
            Self::InvalidPlate(e) => classify(&FetchFault::InvalidInput(e.to_string())),
            Self::Fetch(e) => e.classification,
        }
    }

    /// Kind the caller should act on
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPlate(_) => ErrorKind::PermanentInput,
            Self::Fetch(e) => e.settled_kind(),
        }
    }
}

/// Cached vehicle and permit lookups against the datastore.
#[derive(Debug)]
pub struct VehicleLookupService {
    fetcher: ResilientFetcher,
    cache: Arc<ResultCache<CachedLookup>>,
    vehicle_resource_id: String,
    disability_resource_id: String,
    result_limit: u32,
}

impl VehicleLookupService {
    /// Create a service over `fetcher` sharing `cache`
    #[must_use]
    pub fn new(
        fetcher: ResilientFetcher,
        cache: Arc<ResultCache<CachedLookup>>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            cache,
            vehicle_resource_id: settings.vehicle_resource_id.clone(),
            disability_resource_id: settings.disability_resource_id.clone(),
            result_limit: settings.api_result_limit,
        }
    }

    /// The shared result cache
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache<CachedLookup>> {
        &self.cache
    }

    /// Find the vehicle registered under `plate`.
    ///
    /// Returns `Ok(None)` when the registry has no such vehicle; that answer
    /// is cached like a positive one.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidPlate`] for a malformed plate and
    /// [`LookupError::Fetch`] when the datastore call fails.
    pub async fn search_vehicle(&self, plate: &str) -> Result<Option<VehicleRecord>, LookupError> {
        let plate = validate_plate(plate)?;
        let key = cache_key(VEHICLE_CACHE_NAMESPACE, &plate);

        if let Some(CachedLookup::Vehicle(cached)) = self.cache.get(&key) {
            debug!(plate = %plate, found = cached.is_some(), "Vehicle cache hit");
            return Ok(cached);
        }

        let query = DatastoreQuery::new(&self.vehicle_resource_id, self.result_limit, &plate);
        let records = self.fetcher.fetch(&query).await?;

        let vehicles: Vec<VehicleRecord> = records.iter().map(VehicleRecord::from_record).collect();
        // Full-text search may also match other plates containing the digits
        let vehicle = vehicles
            .iter()
            .find(|v| v.license_plate == plate)
            .or_else(|| vehicles.first())
            .cloned();

        self.cache.set(key, CachedLookup::Vehicle(vehicle.clone()), None);
        debug!(plate = %plate, found = vehicle.is_some(), "Cached vehicle result");
        Ok(vehicle)
    }

    /// Whether `plate` holds a disability parking permit.
    ///
    /// Invalid plates and datastore failures yield `false`; failures are
    /// logged and not cached.
    pub async fn check_disability_permit(&self, plate: &str) -> bool {
        let Ok(plate) = validate_plate(plate) else {
            return false;
        };
        let key = cache_key(DISABILITY_CACHE_NAMESPACE, &plate);

        if let Some(CachedLookup::Permit(has_permit)) = self.cache.get(&key) {
            debug!(plate = %plate, has_permit, "Disability permit cache hit");
            return has_permit;
        }

        let query = DatastoreQuery::new(&self.disability_resource_id, self.result_limit, &plate);
        match self.fetcher.fetch(&query).await {
            Ok(records) => {
                let has_permit = !records.is_empty();
                self.cache.set(key, CachedLookup::Permit(has_permit), None);
                has_permit
            }
            Err(e) => {
                warn!(
                    plate = %plate,
                    kind = e.classification.kind.as_str(),
                    error = %e,
                    "Disability permit lookup failed"
                );
                false
            }
        }
    }
}

/// Result of one plate search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Vehicle found
    Found {
        /// Registry data
        vehicle: VehicleRecord,
        /// Whether a disability permit exists
        disability_permit: bool,
        /// Time spent on the lookups
        elapsed: Duration,
    },
    /// The registry has no vehicle with this plate
    NotFound {
        /// Normalized plate
        plate: String,
    },
    /// The same requester is already searching this plate
    AlreadyInProgress {
        /// Normalized plate
        plate: String,
    },
    /// Plate failed validation
    InvalidInput(PlateError),
    /// Datastore failure after retries
    Failed(FetchError),
}

/// Guarded plate search: guard, vehicle lookup, then permit lookup.
#[derive(Debug, Clone)]
pub struct SearchPipeline {
    lookup: Arc<VehicleLookupService>,
    guard: SearchGuard,
}

impl SearchPipeline {
    /// Compose a pipeline
    #[must_use]
    pub const fn new(lookup: Arc<VehicleLookupService>, guard: SearchGuard) -> Self {
        Self { lookup, guard }
    }

    /// The duplicate-search guard
    #[must_use]
    pub const fn guard(&self) -> &SearchGuard {
        &self.guard
    }

    /// The lookup service
    #[must_use]
    pub const fn lookup(&self) -> &Arc<VehicleLookupService> {
        &self.lookup
    }

    /// Search `plate` on behalf of `requester`.
    ///
    /// The guard key is held for the whole search and released on every exit
    /// path. The permit lookup only runs when a vehicle was found.
    pub async fn search(&self, requester: i64, plate: &str) -> SearchOutcome {
        let plate = match validate_plate(plate) {
            Ok(plate) => plate,
            Err(e) => return SearchOutcome::InvalidInput(e),
        };

        let Some(_permit) = self.guard.acquire(SearchGuard::key(requester, &plate)) else {
            return SearchOutcome::AlreadyInProgress { plate };
        };

        let request_id = Uuid::new_v4();
        let span = info_span!("plate_search", %request_id, requester, plate = %plate);
        self.run(plate).instrument(span).await
    }

    async fn run(&self, plate: String) -> SearchOutcome {
        let start = Instant::now();

        let outcome = match self.lookup.search_vehicle(&plate).await {
            Ok(Some(vehicle)) => {
                let disability_permit = self.lookup.check_disability_permit(&plate).await;
                SearchOutcome::Found {
                    vehicle,
                    disability_permit,
                    elapsed: start.elapsed(),
                }
            }
            Ok(None) => SearchOutcome::NotFound { plate },
            Err(LookupError::InvalidPlate(e)) => SearchOutcome::InvalidInput(e),
            Err(LookupError::Fetch(e)) => SearchOutcome::Failed(e),
        };

        info!(
            duration_ms = start.elapsed().as_millis(),
            outcome = outcome.label(),
            "Plate search finished"
        );
        outcome
    }
}

impl SearchOutcome {
    /// Short name for logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Found { .. } => "found",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyInProgress { .. } => "already_in_progress",
            Self::InvalidInput(_) => "invalid_input",
            Self::Failed(_) => "failed",
        }
    }
}
