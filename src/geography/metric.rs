//! Point and metric-space contracts.

use thiserror::Error;

/// Errors raised when a point is used outside its dimensionality.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// A dimension index past the point's last axis was read.
    #[error("invalid dimension: {0}")]
    InvalidDimension(usize),
    /// A point handed to a metric space has the wrong number of axes.
    #[error("point {which} has {dimensions} dimensions, expected {expected}")]
    DimensionMismatch {
        which: &'static str,
        dimensions: usize,
        expected: usize,
    },
}

/// Any point in a metric space.
pub trait Point {
    /// Number of axes this point carries.
    fn dimensions(&self) -> usize;

    /// Scalar value along axis `dimension`.
    fn value(&self, dimension: usize) -> Result<f64, GeoError>;
}

/// A set of points together with a distance function.
///
/// The interface is dimension-generic, but implementations are free to
/// require a fixed dimensionality and reject anything else with
/// [`GeoError::DimensionMismatch`].
pub trait MetricSpace: Send + Sync {
    /// Non-negative, finite distance between `a` and `b`.
    fn distance(&self, a: &dyn Point, b: &dyn Point) -> Result<f64, GeoError>;
}

/// Reject a point whose dimensionality differs from `expected`.
pub(crate) fn require_dimensions(
    which: &'static str,
    point: &dyn Point,
    expected: usize,
) -> Result<(), GeoError> {
    let dimensions = point.dimensions();
    if dimensions != expected {
        return Err(GeoError::DimensionMismatch {
            which,
            dimensions,
            expected,
        });
    }
    Ok(())
}
