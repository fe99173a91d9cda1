//! Farmers' market data sources.
//!
//! Each provider publishes its own schema; adapters normalize them into
//! [`FacilityRecord`] and answer nearest-N queries through the common
//! [`DataSource`] trait. A [`Registry`] maps source names to adapters.

pub mod http;
pub mod newyork;
pub mod normalize;
pub mod ranking;
pub mod registry;
pub mod types;
pub mod usda;
pub mod zipcode;

pub use http::{HttpClient, UreqClient};
pub use newyork::NewYorkSource;
pub use ranking::{Selection, ALL_RECORDS};
pub use registry::{Registry, RegistryError};
pub use types::{
    Address, FacilityRecord, OperatingSeason, RefreshPolicy, SourceError, SourceStatus,
};
pub use usda::UsdaSource;
pub use zipcode::{GeoNamesResolver, ZipCodeResolver};

use crate::geography::Coordinate;

/// The capability set every provider adapter offers.
pub trait DataSource: Send + Sync {
    /// Registry key for this source.
    fn name(&self) -> &str;

    fn policy(&self) -> RefreshPolicy;

    /// Reload the in-memory record set. Sources without one succeed
    /// without doing anything.
    fn refresh(&self) -> Result<(), SourceError>;

    /// The `n` records nearest `origin`, ascending by distance.
    /// `n == -1` returns every record.
    fn nearest_n(&self, n: i64, origin: Coordinate) -> Result<Vec<FacilityRecord>, SourceError>;

    /// Resolver used by [`DataSource::nearest_n_by_zip_code`].
    fn zip_resolver(&self) -> &dyn ZipCodeResolver;

    /// Like [`DataSource::nearest_n`], centered on a US zip code.
    /// Resolver errors are returned as-is.
    fn nearest_n_by_zip_code(
        &self,
        n: i64,
        zip_code: &str,
    ) -> Result<Vec<FacilityRecord>, SourceError> {
        let origin = self.zip_resolver().resolve(zip_code)?;
        self.nearest_n(n, origin)
    }

    fn status(&self) -> SourceStatus;
}
