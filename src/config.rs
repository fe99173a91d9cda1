//! Runtime configuration: provider credentials and endpoints.
//!
//! Built once at startup and handed to each data-source constructor.

use std::env;

use thiserror::Error;

/// Environment variable holding the USDA Local Food Portal API key.
pub const USDA_CREDENTIALS_VAR: &str = "LILYFARM_USDA_CREDENTIALS";

/// Environment variable holding the geonames.org username used for zip
/// code lookups.
pub const GEONAMES_CREDENTIALS_VAR: &str = "LILYFARM_GEONAMES_CREDENTIALS";

pub const DEFAULT_GEONAMES_ENDPOINT: &str = "http://api.geonames.org/postalCodeLookupJSON";
pub const DEFAULT_NEWYORK_ENDPOINT: &str = "https://data.ny.gov/resource/farmersmarkets.json";
pub const DEFAULT_USDA_ENDPOINT: &str = "https://www.usdalocalfoodportal.com/api/farmersmarket";

/// Search radius for live USDA queries, in miles.
pub const DEFAULT_USDA_RADIUS_MILES: u32 = 100;

/// The USDA portal answers 403 to non-browser User-Agents, even with a
/// valid key.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("credentials not found in environment variable: {0}")]
    MissingVariable(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub geonames_username: Option<String>,
    pub usda_api_key: Option<String>,
    pub geonames_endpoint: String,
    pub newyork_endpoint: String,
    pub usda_endpoint: String,
    pub usda_radius_miles: u32,
    pub usda_user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geonames_username: None,
            usda_api_key: None,
            geonames_endpoint: DEFAULT_GEONAMES_ENDPOINT.to_string(),
            newyork_endpoint: DEFAULT_NEWYORK_ENDPOINT.to_string(),
            usda_endpoint: DEFAULT_USDA_ENDPOINT.to_string(),
            usda_radius_miles: DEFAULT_USDA_RADIUS_MILES,
            usda_user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Defaults plus whatever credentials the environment provides.
    /// Nothing is validated here. Missing credentials surface as
    /// [`ConfigError::MissingVariable`] from the constructor that needs them,
    /// and `Registry::from_config` fails on the first one.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            geonames_username: non_empty(GEONAMES_CREDENTIALS_VAR),
            usda_api_key: non_empty(USDA_CREDENTIALS_VAR),
            ..Self::default()
        }
    }

    pub fn geonames_username(&self) -> Result<&str, ConfigError> {
        self.geonames_username
            .as_deref()
            .ok_or(ConfigError::MissingVariable(GEONAMES_CREDENTIALS_VAR))
    }

    pub fn usda_api_key(&self) -> Result<&str, ConfigError> {
        self.usda_api_key
            .as_deref()
            .ok_or(ConfigError::MissingVariable(USDA_CREDENTIALS_VAR))
    }

    /// Test helper: credentials filled in, endpoints left at defaults.
    pub fn with_credentials(geonames: &str, usda: &str) -> Self {
        Self {
            geonames_username: Some(geonames.to_string()),
            usda_api_key: Some(usda.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.usda_radius_miles, 100);
        assert_eq!(c.newyork_endpoint, DEFAULT_NEWYORK_ENDPOINT);
        assert!(c.usda_user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_from_lookup_reads_credentials() {
        let c = Config::from_lookup(|name| match name {
            GEONAMES_CREDENTIALS_VAR => Some("demo".into()),
            USDA_CREDENTIALS_VAR => Some("key".into()),
            _ => None,
        });
        assert_eq!(c.geonames_username().unwrap(), "demo");
        assert_eq!(c.usda_api_key().unwrap(), "key");
    }

    #[test]
    fn test_empty_variable_counts_as_missing() {
        let c = Config::from_lookup(|name| match name {
            GEONAMES_CREDENTIALS_VAR => Some("   ".into()),
            _ => None,
        });
        assert_eq!(
            c.geonames_username(),
            Err(ConfigError::MissingVariable(GEONAMES_CREDENTIALS_VAR))
        );
        assert_eq!(
            c.usda_api_key().unwrap_err().to_string(),
            "credentials not found in environment variable: LILYFARM_USDA_CREDENTIALS"
        );
    }
}
