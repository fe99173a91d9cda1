//! Great-circle distance on a spherical earth (haversine formula).
//!
//! Inputs are degrees, output is meters. Accuracy is that of a perfect
//! sphere of radius [`EARTH_RADIUS_METERS`]; no ellipsoid correction.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::metric::{require_dimensions, GeoError, MetricSpace, Point};

/// Earth radius used by the haversine metric, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

/// Miles per meter.
pub const METERS_TO_MILES: f64 = 0.000621371;

const DEG: f64 = std::f64::consts::PI / 180.0;

/// A latitude/longitude pair in signed degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

impl Point for Coordinate {
    fn dimensions(&self) -> usize {
        2
    }

    fn value(&self, dimension: usize) -> Result<f64, GeoError> {
        match dimension {
            0 => Ok(self.latitude),
            1 => Ok(self.longitude),
            other => Err(GeoError::InvalidDimension(other)),
        }
    }
}

/// Metric space over [`Coordinate`]-like points using haversine distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineMetricSpace;

/// haversin(θ) = sin²(θ/2)
fn hsin(theta: f64) -> f64 {
    (theta / 2.0).sin().powi(2)
}

/// Distance in meters between two lat/lon pairs given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (la1, lo1) = (lat1 * DEG, lon1 * DEG);
    let (la2, lo2) = (lat2 * DEG, lon2 * DEG);

    let h = hsin(la2 - la1) + la1.cos() * la2.cos() * hsin(lo2 - lo1);

    // Rounding can push h a hair past 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_METERS * h.clamp(0.0, 1.0).sqrt().asin()
}

impl MetricSpace for HaversineMetricSpace {
    fn distance(&self, a: &dyn Point, b: &dyn Point) -> Result<f64, GeoError> {
        require_dimensions("a", a, 2)?;
        require_dimensions("b", b, 2)?;

        let la1 = a.value(0)?;
        let lo1 = a.value(1)?;
        let la2 = b.value(0)?;
        let lo2 = b.value(1)?;

        Ok(haversine_distance(la1, lo1, la2, lo2))
    }
}

/// Meters to whole kilometers, truncating toward zero. Display only.
pub fn meters_to_kilometers(meters: f64) -> i64 {
    (meters / 1000.0) as i64
}

/// Meters to miles. Display only.
pub fn meters_to_miles(meters: f64) -> f64 {
    meters * METERS_TO_MILES
}
