//! New York State farmers' market dataset (data.ny.gov), cached on demand.
//!
//! The provider has no proximity query, so the full dataset is downloaded
//! on first use, held as an immutable snapshot, and ranked locally. A
//! refresh builds a new snapshot and swaps it in; queries in flight keep
//! the one they started with.
//!
//! Operation months code, as published by the Department of Agriculture
//! and Markets:
//! - `P` spring: some point in April or May
//! - `M` summer: some point June through November
//! - `X` extended season: some point in December
//! - `W` winter: some point January through March
//! - `YR` year-round at the same location
//!
//! Categories are not mutually exclusive.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::http::HttpClient;
use super::normalize::{null_as_empty, parse_flag, parse_float, NumberOrString};
use super::ranking;
use super::types::{
    Address, FacilityRecord, RefreshPolicy, SourceError, SourceStatus, DISTANCE_NOT_COMPUTED,
};
use super::zipcode::{GeoNamesResolver, ZipCodeResolver};
use super::DataSource;
use crate::config::{Config, ConfigError};
use crate::geography::{Coordinate, HaversineMetricSpace, MetricSpace};

// ─── Provider schema ─────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MarketLink {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
}

/// One market as published by data.ny.gov.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NewYorkRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub county: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub market_name: String,
    /// General place where the market is set up.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub market_location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub address_line_1: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    /// Two-letter state code.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub zip: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone: String,
    #[serde(default)]
    pub market_link: Option<MarketLink>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub operation_hours: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub operation_season: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub operation_months_code: String,
    /// `"Y"` when the market takes part in the Farmers Market Nutrition Program.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fmnp: String,
    /// `"Y"` when the market accepts SNAP.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub snap_status: String,
    #[serde(default)]
    pub latitude: Option<NumberOrString>,
    #[serde(default)]
    pub longitude: Option<NumberOrString>,
}

impl NewYorkRecord {
    /// Convert to the common schema. `index` locates the record in error
    /// messages.
    pub fn to_facility(&self, index: usize) -> Result<FacilityRecord, SourceError> {
        let latitude = parse_float(index, "latitude", self.latitude.as_ref())?;
        let longitude = parse_float(index, "longitude", self.longitude.as_ref())?;

        Ok(FacilityRecord {
            name: self.market_name.clone(),
            description: String::new(),
            address: Address {
                street: self.address_line_1.clone(),
                city: self.city.clone(),
                state: self.state.clone(),
                zip_code: self.zip.clone(),
            },
            distance: DISTANCE_NOT_COMPUTED,
            website: self
                .market_link
                .as_ref()
                .map(|link| link.url.clone())
                .unwrap_or_default(),
            location: Coordinate::new(latitude, longitude),
            operation_hours: self.operation_hours.clone(),
            operation_season: self.operation_season.clone(),
            operation_months_code: self.operation_months_code.clone(),
            farmers_market_nutrition_program: parse_flag(index, "fmnp", &self.fmnp)?,
            snap_status: parse_flag(index, "snap_status", &self.snap_status)?,
        })
    }
}

/// Decode a data.ny.gov response body.
pub fn parse_dataset(body: &[u8]) -> Result<Vec<NewYorkRecord>, SourceError> {
    serde_json::from_slice(body).map_err(|source| SourceError::Decode {
        what: "new york farmers' market",
        source,
    })
}

/// Decode and normalize a response body. One bad record rejects the batch.
pub fn parse_facilities(body: &[u8]) -> Result<Vec<FacilityRecord>, SourceError> {
    parse_dataset(body)?
        .iter()
        .enumerate()
        .map(|(index, record)| record.to_facility(index))
        .collect()
}

// ─── Adapter ─────────────────────────────────────────────────────

struct Snapshot {
    records: Vec<FacilityRecord>,
    refreshed_at: DateTime<Utc>,
}

/// Cache-on-demand adapter over the New York State dataset.
pub struct NewYorkSource {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    metric: Arc<dyn MetricSpace>,
    resolver: Arc<dyn ZipCodeResolver>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    // Held for the whole fetch-and-swap. Cold queries fetch once and a
    // slow refresh can never overwrite a newer snapshot.
    loading: Mutex<()>,
}

impl NewYorkSource {
    pub const NAME: &'static str = "newyork";

    pub fn new(config: &Config, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        let resolver = Arc::new(GeoNamesResolver::new(config, Arc::clone(&http))?);
        Ok(Self::with_parts(
            config.newyork_endpoint.clone(),
            http,
            Arc::new(HaversineMetricSpace),
            resolver,
        ))
    }

    pub fn with_parts(
        endpoint: String,
        http: Arc<dyn HttpClient>,
        metric: Arc<dyn MetricSpace>,
        resolver: Arc<dyn ZipCodeResolver>,
    ) -> Self {
        Self {
            http,
            endpoint,
            metric,
            resolver,
            snapshot: RwLock::new(None),
            loading: Mutex::new(()),
        }
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_loading(&self) -> MutexGuard<'_, ()> {
        self.loading.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch, parse and swap in a new snapshot. Callers hold `loading`.
    fn load(&self, _loading: &MutexGuard<'_, ()>) -> Result<Arc<Snapshot>, SourceError> {
        debug!(source = Self::NAME, endpoint = %self.endpoint, "fetching dataset");
        let body = self
            .http
            .get(&self.endpoint, &[], &[("Accept", "application/json")])?;
        let records = parse_facilities(&body)?;

        let snapshot = Arc::new(Snapshot {
            records,
            refreshed_at: Utc::now(),
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        info!(
            source = Self::NAME,
            records = snapshot.records.len(),
            "dataset refreshed"
        );
        Ok(snapshot)
    }

    fn loaded(&self) -> Result<Arc<Snapshot>, SourceError> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        let guard = self.lock_loading();
        // Another caller may have finished loading while we waited.
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }
        self.load(&guard)
    }
}

impl DataSource for NewYorkSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn policy(&self) -> RefreshPolicy {
        RefreshPolicy::CacheOnDemand
    }

    fn refresh(&self) -> Result<(), SourceError> {
        let guard = self.lock_loading();
        self.load(&guard).map(|_| ())
    }

    fn nearest_n(&self, n: i64, origin: Coordinate) -> Result<Vec<FacilityRecord>, SourceError> {
        let selection = ranking::Selection::from_count(n)?;
        let snapshot = self.loaded()?;
        let ranked = ranking::rank_by_distance(self.metric.as_ref(), &origin, &snapshot.records)?;
        ranking::select(ranked, selection)
    }

    fn zip_resolver(&self) -> &dyn ZipCodeResolver {
        self.resolver.as_ref()
    }

    fn status(&self) -> SourceStatus {
        let snapshot = self.current();
        SourceStatus {
            name: Self::NAME.to_string(),
            policy: self.policy(),
            loaded: snapshot.is_some(),
            records: snapshot.as_ref().map(|s| s.records.len()),
            refreshed_at: snapshot.as_ref().map(|s| s.refreshed_at),
        }
    }
}
