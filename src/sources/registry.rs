//! Name → data source lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::http::HttpClient;
use super::newyork::NewYorkSource;
use super::types::SourceStatus;
use super::usda::UsdaSource;
use super::DataSource;
use crate::config::{Config, ConfigError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("data source already registered: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Registered data sources, keyed by [`DataSource::name`].
#[derive(Default, Clone)]
pub struct Registry {
    sources: BTreeMap<String, Arc<dyn DataSource>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("sources", &self.names())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in source. Fails if any of them lacks credentials.
    pub fn from_config(config: &Config, http: Arc<dyn HttpClient>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Arc::new(UsdaSource::new(config, Arc::clone(&http))?))?;
        registry.register(Arc::new(NewYorkSource::new(config, http)?))?;
        Ok(registry)
    }

    pub fn register(&mut self, source: Arc<dyn DataSource>) -> Result<(), RegistryError> {
        let name = source.name().to_string();
        if self.sources.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.sources.insert(name, source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn statuses(&self) -> Vec<SourceStatus> {
        self.sources.values().map(|source| source.status()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
