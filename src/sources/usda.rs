//! USDA Local Food Portal, queried live.
//!
//! The portal does its own proximity search and returns records already
//! sorted by distance (in miles), so nothing is cached or re-ranked here.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::http::HttpClient;
use super::normalize::{null_as_empty, parse_float, NumberOrString};
use super::ranking::{self, Selection};
use super::types::{Address, FacilityRecord, RefreshPolicy, SourceError, SourceStatus};
use super::zipcode::{GeoNamesResolver, ZipCodeResolver};
use super::DataSource;
use crate::config::{Config, ConfigError};
use crate::geography::Coordinate;

#[derive(Deserialize, Debug, Default)]
struct UsdaResponse {
    #[serde(default)]
    data: Vec<UsdaRecord>,
}

/// One listing from the portal. Most fields may be `null`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UsdaRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub brief_desc: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_phone: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub directory_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub directory_type: String,
    #[serde(default)]
    pub distance: Option<NumberOrString>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub listing_desc: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub listing_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub listing_image: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub listing_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location_address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location_city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location_state: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location_street: String,
    /// Longitude.
    #[serde(default)]
    pub location_x: Option<NumberOrString>,
    /// Latitude.
    #[serde(default)]
    pub location_y: Option<NumberOrString>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location_zipcode: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub media_website: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub updatetime: String,
}

impl UsdaRecord {
    pub fn to_facility(&self, index: usize) -> Result<FacilityRecord, SourceError> {
        let distance = parse_float(index, "distance", self.distance.as_ref())?;
        let latitude = parse_float(index, "location_y", self.location_y.as_ref())?;
        let longitude = parse_float(index, "location_x", self.location_x.as_ref())?;

        let mut record = FacilityRecord::new(
            self.listing_name.clone(),
            Coordinate::new(latitude, longitude),
        );
        record.description = self.brief_desc.clone();
        record.address = Address {
            street: self.location_street.clone(),
            city: self.location_city.clone(),
            state: self.location_state.clone(),
            zip_code: self.location_zipcode.clone(),
        };
        record.distance = distance;
        record.website = self.media_website.clone();
        Ok(record)
    }
}

pub fn parse_dataset(body: &[u8]) -> Result<Vec<UsdaRecord>, SourceError> {
    let response: UsdaResponse =
        serde_json::from_slice(body).map_err(|source| SourceError::Decode {
            what: "usda farmers' market",
            source,
        })?;
    Ok(response.data)
}

/// Decode and normalize, keeping the provider's order.
pub fn parse_facilities(body: &[u8]) -> Result<Vec<FacilityRecord>, SourceError> {
    parse_dataset(body)?
        .iter()
        .enumerate()
        .map(|(index, record)| record.to_facility(index))
        .collect()
}

/// Live-query adapter over the USDA portal.
pub struct UsdaSource {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    api_key: String,
    radius_miles: u32,
    user_agent: String,
    resolver: Arc<dyn ZipCodeResolver>,
}

impl UsdaSource {
    pub const NAME: &'static str = "usda";

    /// Needs both the USDA key and a geonames username.
    pub fn new(config: &Config, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        config.usda_api_key()?;
        let resolver = Arc::new(GeoNamesResolver::new(config, Arc::clone(&http))?);
        Ok(Self::with_resolver(config, http, resolver))
    }

    /// Endpoint, radius and User-Agent from `config`; the API key is taken
    /// as-is and may be empty.
    pub fn with_resolver(
        config: &Config,
        http: Arc<dyn HttpClient>,
        resolver: Arc<dyn ZipCodeResolver>,
    ) -> Self {
        Self {
            http,
            endpoint: config.usda_endpoint.clone(),
            api_key: config.usda_api_key.clone().unwrap_or_default(),
            radius_miles: config.usda_radius_miles,
            user_agent: config.usda_user_agent.clone(),
            resolver,
        }
    }

    fn fetch(&self, origin: &Coordinate) -> Result<Vec<FacilityRecord>, SourceError> {
        let x = origin.longitude.to_string();
        let y = origin.latitude.to_string();
        let radius = self.radius_miles.to_string();

        debug!(source = Self::NAME, %origin, radius_miles = self.radius_miles, "live query");
        let body = self.http.get(
            &self.endpoint,
            &[
                ("apikey", self.api_key.as_str()),
                ("x", x.as_str()),
                ("y", y.as_str()),
                ("radius", radius.as_str()),
            ],
            &[("User-Agent", self.user_agent.as_str())],
        )?;
        parse_facilities(&body)
    }
}

impl DataSource for UsdaSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn policy(&self) -> RefreshPolicy {
        RefreshPolicy::LiveQuery
    }

    fn refresh(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn nearest_n(&self, n: i64, origin: Coordinate) -> Result<Vec<FacilityRecord>, SourceError> {
        let selection = Selection::from_count(n)?;
        let records = self.fetch(&origin)?;
        ranking::select(records, selection)
    }

    fn zip_resolver(&self) -> &dyn ZipCodeResolver {
        self.resolver.as_ref()
    }

    fn status(&self) -> SourceStatus {
        SourceStatus {
            name: Self::NAME.to_string(),
            policy: self.policy(),
            loaded: true,
            records: None,
            refreshed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BROWSER_USER_AGENT, DEFAULT_GEONAMES_ENDPOINT, DEFAULT_USDA_ENDPOINT};
    use crate::sources::http::mock::{MockHttpClient, Reply};
    use approx::assert_relative_eq;

    const ENDPOINT: &str = DEFAULT_USDA_ENDPOINT;

    const TWO_MARKETS: &str = r#"{"data": [
        {
            "brief_desc": "",
            "contact_email": null,
            "contact_name": null,
            "directory_name": "farmers market",
            "directory_type": "farmersmarket",
            "distance": "0.2492313843284663",
            "listing_desc": null,
            "listing_id": "312052",
            "listing_image": "default-farmersmarket-4-3.jpg",
            "listing_name": "Potsdam Farmers Market",
            "location_address": "3 Riverside Dr, New York, New York 10023",
            "location_city": "New York",
            "location_state": "New York",
            "location_street": "3 Riverside Dr",
            "location_x": "-73.98557883420489",
            "location_y": "40.7805342225485",
            "location_zipcode": "10023",
            "media_website": null,
            "updatetime": "Mar 27th, 2023"
        },
        {
            "brief_desc": "Producer-only market",
            "distance": "0.3345007893966277",
            "listing_desc": null,
            "listing_id": "311799",
            "listing_name": "79th Street Greenmarket",
            "location_city": "New York",
            "location_state": "New York",
            "location_street": "366 Columbus Ave",
            "location_x": "-73.97616213937675",
            "location_y": "40.78102834727456",
            "location_zipcode": "10024",
            "media_website": "https://www.grownyc.org/greenmarket"
        }
    ]}"#;

    const GEONAMES_10023: &str =
        r#"{"postalcodes":[{"lat":40.776,"lng":-73.982,"postalcode":"10023","placeName":"New York"}]}"#;

    fn source(client: Arc<MockHttpClient>) -> UsdaSource {
        UsdaSource::new(&Config::with_credentials("demo", "secret"), client).unwrap()
    }

    #[test]
    fn test_empty_dataset() {
        assert!(parse_dataset(br#"{"data": []}"#).unwrap().is_empty());
        assert!(parse_facilities(br#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_raw_records() {
        let records = parse_dataset(TWO_MARKETS.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].listing_id, "312052");
        assert_eq!(records[0].contact_email, "");
        assert_eq!(records[0].updatetime, "Mar 27th, 2023");
    }

    #[test]
    fn test_normalize_record() {
        let facilities = parse_facilities(TWO_MARKETS.as_bytes()).unwrap();
        let f = &facilities[0];
        assert_eq!(f.name, "Potsdam Farmers Market");
        assert_eq!(f.address.street, "3 Riverside Dr");
        assert_eq!(f.address.zip_code, "10023");
        assert_relative_eq!(f.distance, 0.2492313843284663);
        assert_relative_eq!(f.location.latitude, 40.7805342225485);
        assert_relative_eq!(f.location.longitude, -73.98557883420489);
        assert!(f.website.is_empty());
        assert!(!f.snap_status);

        assert_eq!(facilities[1].description, "Producer-only market");
        assert_eq!(facilities[1].website, "https://www.grownyc.org/greenmarket");
    }

    #[test]
    fn test_bad_distance_rejects_batch() {
        let body = r#"{"data": [{"listing_name": "x", "distance": "far", "location_x": "1", "location_y": "2"}]}"#;
        let err = parse_facilities(body.as_bytes()).unwrap_err();
        assert!(matches!(err, SourceError::Parse { index: 0, field: "distance", .. }));
    }

    #[test]
    fn test_query_parameters_and_user_agent() {
        let client = Arc::new(MockHttpClient::new().reply(ENDPOINT, Reply::Body(TWO_MARKETS.into())));
        let usda = source(client.clone());

        usda.nearest_n(1, Coordinate::new(40.78, -73.98)).unwrap();

        let req = &client.requests()[0];
        assert_eq!(req.url, ENDPOINT);
        assert_eq!(req.param("apikey"), Some("secret"));
        assert_eq!(req.param("x"), Some("-73.98"));
        assert_eq!(req.param("y"), Some("40.78"));
        assert_eq!(req.param("radius"), Some("100"));
        assert_eq!(req.header("User-Agent"), Some(BROWSER_USER_AGENT));
    }

    #[test]
    fn test_provider_order_is_kept() {
        let client = Arc::new(MockHttpClient::new().reply(ENDPOINT, Reply::Body(TWO_MARKETS.into())));
        let usda = source(client.clone());

        // An origin far from both markets; the provider's order still wins.
        let records = usda.nearest_n(-1, Coordinate::new(0.0, 0.0)).unwrap();
        assert_eq!(records[0].name, "Potsdam Farmers Market");
        assert_eq!(records[1].name, "79th Street Greenmarket");

        // Live queries are never cached.
        usda.nearest_n(-1, Coordinate::new(0.0, 0.0)).unwrap();
        assert_eq!(client.calls_to(ENDPOINT), 2);
    }

    #[test]
    fn test_insufficient_records() {
        let client = Arc::new(MockHttpClient::new().reply(ENDPOINT, Reply::Body(TWO_MARKETS.into())));
        let err = source(client).nearest_n(3, Coordinate::default()).unwrap_err();
        match err {
            SourceError::InsufficientRecords { requested, partial } => {
                assert_eq!(requested, 3);
                assert_eq!(partial.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_count_skips_fetch() {
        let client = Arc::new(MockHttpClient::new().reply(ENDPOINT, Reply::Body(TWO_MARKETS.into())));
        let usda = source(client.clone());
        let err = usda.nearest_n(-2, Coordinate::default()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidCount(-2)));
        assert_eq!(client.calls_to(ENDPOINT), 0);
    }

    #[test]
    fn test_forbidden_is_unexpected_status() {
        let client = Arc::new(MockHttpClient::new().reply(ENDPOINT, Reply::Status(403)));
        let err = source(client).nearest_n(1, Coordinate::default()).unwrap_err();
        assert!(matches!(err, SourceError::UnexpectedStatus { status: 403, .. }));
        assert!(err.is_provider_failure());
    }

    #[test]
    fn test_refresh_is_a_no_op() {
        let client = Arc::new(MockHttpClient::new());
        let usda = source(client.clone());
        usda.refresh().unwrap();
        assert!(client.requests().is_empty());
        assert_eq!(usda.status().policy, RefreshPolicy::LiveQuery);
    }

    #[test]
    fn test_by_zip_code_resolves_then_queries() {
        let client = Arc::new(
            MockHttpClient::new()
                .reply(DEFAULT_GEONAMES_ENDPOINT, Reply::Body(GEONAMES_10023.into()))
                .reply(ENDPOINT, Reply::Body(TWO_MARKETS.into())),
        );
        let usda = source(client.clone());

        let records = usda.nearest_n_by_zip_code(2, "10023").unwrap();
        assert_eq!(records.len(), 2);

        let requests = client.requests();
        assert_eq!(requests[0].url, DEFAULT_GEONAMES_ENDPOINT);
        assert_eq!(requests[1].param("y"), Some("40.776"));
        assert_eq!(requests[1].param("x"), Some("-73.982"));
    }

    #[test]
    fn test_zip_not_found_propagates() {
        let client = Arc::new(
            MockHttpClient::new()
                .reply(DEFAULT_GEONAMES_ENDPOINT, Reply::Body(r#"{"postalcodes":[]}"#.into())),
        );
        let usda = source(client.clone());
        let err = usda.nearest_n_by_zip_code(2, "99999").unwrap_err();
        assert!(matches!(err, SourceError::NotFound(ref z) if z == "99999"));
        assert_eq!(client.calls_to(ENDPOINT), 0);
    }

    #[test]
    fn test_requires_both_credentials() {
        let http: Arc<dyn HttpClient> = Arc::new(MockHttpClient::new());
        let mut config = Config::with_credentials("demo", "secret");
        config.usda_api_key = None;
        assert!(matches!(
            UsdaSource::new(&config, Arc::clone(&http)),
            Err(ConfigError::MissingVariable(_))
        ));

        let mut config = Config::with_credentials("demo", "secret");
        config.geonames_username = None;
        assert!(UsdaSource::new(&config, http).is_err());
    }
}
