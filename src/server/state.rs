use crate::sources::{DataSource, Registry};
use std::sync::Arc;

pub struct AppState {
    pub registry: Registry,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn source(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.registry.get(name)
    }
}
