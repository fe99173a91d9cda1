//! US zip code → coordinate lookup via geonames.org.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::http::HttpClient;
use super::types::SourceError;
use crate::config::{Config, ConfigError};
use crate::geography::Coordinate;

/// Anything that can turn a postal code into a coordinate.
pub trait ZipCodeResolver: Send + Sync {
    fn resolve(&self, zip_code: &str) -> Result<Coordinate, SourceError>;
}

#[derive(Deserialize, Debug)]
struct GeoNamesResponse {
    #[serde(default)]
    postalcodes: Vec<GeoNamesRecord>,
    /// Present instead of `postalcodes` when the account is invalid or
    /// over its quota.
    #[serde(default)]
    status: Option<GeoNamesStatus>,
}

#[derive(Deserialize, Debug)]
struct GeoNamesStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    value: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GeoNamesRecord {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, rename = "postalcode")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub place_name: Option<String>,
    #[serde(default)]
    pub admin_code1: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Live geonames.org lookup; one request per call, no caching.
pub struct GeoNamesResolver {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    username: String,
}

impl GeoNamesResolver {
    pub fn new(config: &Config, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        Ok(Self {
            http,
            endpoint: config.geonames_endpoint.clone(),
            username: config.geonames_username()?.to_string(),
        })
    }
}

impl ZipCodeResolver for GeoNamesResolver {
    fn resolve(&self, zip_code: &str) -> Result<Coordinate, SourceError> {
        let body = self.http.get(
            &self.endpoint,
            &[
                ("username", self.username.as_str()),
                ("country", "US"),
                ("postalcode", zip_code),
            ],
            &[],
        )?;

        let record = first_postal_code(&body, zip_code)?;
        debug!(
            zip_code,
            place = record.place_name.as_deref().unwrap_or(""),
            lat = record.lat,
            lng = record.lng,
            "zip code resolved"
        );
        Ok(Coordinate::new(record.lat, record.lng))
    }
}

/// Pick the first record of a geonames response.
///
/// A `status` payload is a provider error, not an unknown zip code.
///
/// geonames can return several places for one postal code. The first is
/// taken as-is; whether that ordering is meaningful is not documented
/// upstream.
pub fn first_postal_code(body: &[u8], zip_code: &str) -> Result<GeoNamesRecord, SourceError> {
    let response: GeoNamesResponse =
        serde_json::from_slice(body).map_err(|source| SourceError::Decode {
            what: "geonames",
            source,
        })?;

    if let Some(status) = response.status {
        return Err(SourceError::Provider {
            provider: "geonames",
            message: match status.value {
                Some(code) => format!("{} (code {})", status.message, code),
                None => status.message,
            },
        });
    }

    response
        .postalcodes
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::NotFound(zip_code.to_string()))
}
