//! Geographic primitives: points, metric spaces, and great-circle distance.
//!
//! Ranking code talks to [`MetricSpace`] only, so a different metric can be
//! dropped in without touching the selection logic.

pub mod haversine;
pub mod metric;

pub use haversine::{
    meters_to_kilometers, meters_to_miles, Coordinate, HaversineMetricSpace, EARTH_RADIUS_METERS,
    METERS_TO_MILES,
};
pub use metric::{GeoError, MetricSpace, Point};
