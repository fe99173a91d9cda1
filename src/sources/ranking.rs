//! Nearest-N ranking: annotate, sort, select.
//!
//! Nothing here logs or touches the network; failures are returned for
//! the caller to report.

use crate::geography::{Coordinate, MetricSpace};

use super::types::{FacilityRecord, SourceError};

/// Count sentinel meaning "every record".
pub const ALL_RECORDS: i64 = -1;

/// How many records a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    First(usize),
}

impl Selection {
    /// Interpret a raw count. `-1` is [`Selection::All`]; any other
    /// negative value is rejected.
    pub fn from_count(n: i64) -> Result<Self, SourceError> {
        match n {
            ALL_RECORDS => Ok(Self::All),
            n if n < 0 => Err(SourceError::InvalidCount(n)),
            n => usize::try_from(n)
                .map(Self::First)
                .map_err(|_| SourceError::InvalidCount(n)),
        }
    }
}

/// Distance-annotated copy of `records`, sorted ascending by distance.
///
/// The input slice is left untouched. Ties keep their input order.
pub fn rank_by_distance(
    metric: &dyn MetricSpace,
    origin: &Coordinate,
    records: &[FacilityRecord],
) -> Result<Vec<FacilityRecord>, SourceError> {
    let mut ranked = records.to_vec();
    for record in ranked.iter_mut() {
        record.distance = metric.distance(&record.location, origin)?;
    }

    // `sort_by` is stable.
    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Ok(ranked)
}

/// Keep the first records of an already ordered list.
///
/// When fewer records exist than requested, the truncated list travels
/// inside [`SourceError::InsufficientRecords`].
pub fn select(
    ordered: Vec<FacilityRecord>,
    selection: Selection,
) -> Result<Vec<FacilityRecord>, SourceError> {
    match selection {
        Selection::All => Ok(ordered),
        Selection::First(n) if ordered.len() >= n => {
            let mut ordered = ordered;
            ordered.truncate(n);
            Ok(ordered)
        }
        Selection::First(n) => Err(SourceError::InsufficientRecords {
            requested: n,
            partial: ordered,
        }),
    }
}

/// Rank `records` around `origin` and keep the nearest `n`.
pub fn nearest_n(
    metric: &dyn MetricSpace,
    origin: &Coordinate,
    records: &[FacilityRecord],
    n: i64,
) -> Result<Vec<FacilityRecord>, SourceError> {
    let selection = Selection::from_count(n)?;
    let ranked = rank_by_distance(metric, origin, records)?;
    select(ranked, selection)
}
