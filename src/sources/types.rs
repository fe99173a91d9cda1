//! Core types shared by every data source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::geography::{Coordinate, GeoError};

/// Distance value of a record that has not been ranked yet.
pub const DISTANCE_NOT_COMPUTED: f64 = -1.0;

/// Street address of a facility.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// The normalized record every provider converges on.
///
/// Aside from the name, the address, the distance and the location,
/// everything is optional and left at its zero value when a provider
/// has no such field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub address: Address,
    /// Distance from the query point. Meters when computed locally; the
    /// provider's own unit for live-query sources. `-1` until ranked.
    pub distance: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub website: String,
    pub location: Coordinate,
    /// Day and hours the market is open.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation_hours: String,
    /// Dates the market opens and closes for the year.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation_season: String,
    /// Raw season code, see [`OperatingSeason`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation_months_code: String,
    /// Part of the Farmers Market Nutrition Program.
    #[serde(rename = "fmnp", default, skip_serializing_if = "is_false")]
    pub farmers_market_nutrition_program: bool,
    /// Accepts SNAP benefits.
    #[serde(default, skip_serializing_if = "is_false")]
    pub snap_status: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FacilityRecord {
    /// A record with only a name and location; every other field zeroed.
    pub fn new(name: impl Into<String>, location: Coordinate) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            address: Address::default(),
            distance: DISTANCE_NOT_COMPUTED,
            website: String::new(),
            location,
            operation_hours: String::new(),
            operation_season: String::new(),
            operation_months_code: String::new(),
            farmers_market_nutrition_program: false,
            snap_status: false,
        }
    }

    /// Decode `operation_months_code` into seasons, in the order given.
    pub fn operating_seasons(&self) -> Vec<OperatingSeason> {
        OperatingSeason::parse_code(&self.operation_months_code)
    }
}

/// Seasons encoded in a market's operation-months code.
///
/// Categories are not mutually exclusive; a market open in June and
/// December carries both `M` and `X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingSeason {
    /// `P`: April or May.
    Spring,
    /// `M`: June through November.
    Summer,
    /// `X`: December.
    Extended,
    /// `W`: January through March.
    Winter,
    /// `YR`: continually operating at the same location.
    YearRound,
}

impl OperatingSeason {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "P" => Some(Self::Spring),
            "M" => Some(Self::Summer),
            "X" => Some(Self::Extended),
            "W" => Some(Self::Winter),
            "YR" => Some(Self::YearRound),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Spring => "P",
            Self::Summer => "M",
            Self::Extended => "X",
            Self::Winter => "W",
            Self::YearRound => "YR",
        }
    }

    /// Split a combined code ("M, X", "P/M", "YR") into seasons.
    /// Unknown tokens are skipped and duplicates collapsed.
    pub fn parse_code(raw: &str) -> Vec<Self> {
        let mut seasons = Vec::new();
        for token in raw.split(|c: char| !c.is_ascii_alphanumeric()) {
            if let Some(season) = Self::from_code(token) {
                if !seasons.contains(&season) {
                    seasons.push(season);
                }
            }
        }
        seasons
    }
}

impl fmt::Display for OperatingSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spring => write!(f, "Spring"),
            Self::Summer => write!(f, "Summer"),
            Self::Extended => write!(f, "Extended season"),
            Self::Winter => write!(f, "Winter"),
            Self::YearRound => write!(f, "Year-round"),
        }
    }
}

/// How a source keeps its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Full dataset fetched on first use and held until refreshed.
    CacheOnDemand,
    /// Every query is a fresh provider request.
    LiveQuery,
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheOnDemand => write!(f, "cache-on-demand"),
            Self::LiveQuery => write!(f, "live-query"),
        }
    }
}

/// Point-in-time view of a data source, for status listings.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub policy: RefreshPolicy,
    pub loaded: bool,
    pub records: Option<usize>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Errors from resolving, fetching, converting and ranking records.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The provider answered with a non-success status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The response body is not the JSON shape we expect.
    #[error("could not decode {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The provider answered 200 but reported an error in the body, such
    /// as an exhausted geonames quota.
    #[error("{provider} reported an error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// The zip code lookup returned no candidates.
    #[error("failed to find zip code: {0}")]
    NotFound(String),

    /// A field in a provider record could not be converted. The whole
    /// batch is rejected.
    #[error("record {index}: {field} malformed ({value:?}): {reason}")]
    Parse {
        index: usize,
        field: &'static str,
        value: String,
        reason: String,
    },

    /// A negative count other than the `-1` sentinel.
    #[error("invalid value for n: {0}")]
    InvalidCount(i64),

    /// Fewer records exist than were requested. `partial` holds the
    /// records that were found, already sorted.
    #[error("did not find all n records: requested {requested}, found {}", .partial.len())]
    InsufficientRecords {
        requested: usize,
        partial: Vec<FacilityRecord>,
    },

    /// Distance computation failed.
    #[error("could not compute distance: {0}")]
    Geo(#[from] GeoError),
}

impl SourceError {
    /// The truncated result carried by [`SourceError::InsufficientRecords`].
    pub fn into_partial(self) -> Option<Vec<FacilityRecord>> {
        match self {
            Self::InsufficientRecords { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// True when the failure came from talking to an external provider.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::UnexpectedStatus { .. }
                | Self::Decode { .. }
                | Self::Provider { .. }
                | Self::Parse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_sentinel_distance() {
        let r = FacilityRecord::new("Market", Coordinate::new(1.0, 2.0));
        assert_eq!(r.distance, DISTANCE_NOT_COMPUTED);
        assert!(r.description.is_empty());
        assert!(!r.snap_status);
    }

    #[test]
    fn test_record_json_field_names() {
        let mut r = FacilityRecord::new("82nd Street Greenmarket", Coordinate::new(40.77394, -73.9506));
        r.address = Address {
            street: "408 East 82nd Street".into(),
            city: "New York".into(),
            state: "NY".into(),
            zip_code: "10128".into(),
        };
        r.farmers_market_nutrition_program = true;

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["name"], "82nd Street Greenmarket");
        assert_eq!(json["address"]["zipCode"], "10128");
        assert_eq!(json["address"]["street"], "408 East 82nd Street");
        assert_eq!(json["location"]["latitude"], 40.77394);
        assert_eq!(json["distance"], -1.0);
        assert_eq!(json["fmnp"], true);
        // Empty and false optionals are omitted.
        assert!(json.get("description").is_none());
        assert!(json.get("website").is_none());
        assert!(json.get("snap_status").is_none());
    }

    #[test]
    fn test_season_codes() {
        assert_eq!(OperatingSeason::from_code("yr"), Some(OperatingSeason::YearRound));
        assert_eq!(OperatingSeason::from_code("Q"), None);
        assert_eq!(
            OperatingSeason::parse_code("M, X"),
            vec![OperatingSeason::Summer, OperatingSeason::Extended]
        );
        assert_eq!(
            OperatingSeason::parse_code("P/M/M"),
            vec![OperatingSeason::Spring, OperatingSeason::Summer]
        );
        assert!(OperatingSeason::parse_code("").is_empty());
        assert_eq!(OperatingSeason::Winter.code(), "W");
    }

    #[test]
    fn test_record_operating_seasons() {
        let mut r = FacilityRecord::new("m", Coordinate::default());
        r.operation_months_code = "W,YR".into();
        assert_eq!(
            r.operating_seasons(),
            vec![OperatingSeason::Winter, OperatingSeason::YearRound]
        );
    }

    #[test]
    fn test_into_partial() {
        let partial = vec![FacilityRecord::new("a", Coordinate::default())];
        let err = SourceError::InsufficientRecords {
            requested: 3,
            partial: partial.clone(),
        };
        assert_eq!(err.to_string(), "did not find all n records: requested 3, found 1");
        assert_eq!(err.into_partial(), Some(partial));
        assert_eq!(SourceError::InvalidCount(-2).into_partial(), None);
    }

    #[test]
    fn test_provider_failure_classification() {
        assert!(SourceError::UnexpectedStatus { url: "u".into(), status: 403 }.is_provider_failure());
        assert!(SourceError::Provider { provider: "geonames", message: "limit".into() }
            .is_provider_failure());
        assert!(!SourceError::NotFound("00000".into()).is_provider_failure());
        assert!(!SourceError::InvalidCount(-5).is_provider_failure());
    }
}
