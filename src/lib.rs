//! Nearest farmers' market engine.
//!
//! Facilities from heterogeneous public datasets are normalized into one
//! record shape and ranked by great-circle distance from a coordinate or a
//! US zip code.

pub mod config;
pub mod geography;
pub mod logging;
pub mod server;
pub mod sources;
