//! Grid-bucket spatial index over responder positions.
//!
//! Positions land in fixed-size lat/lon cells; a radius query scans the cell
//! neighborhood covering the radius and filters by true Haversine distance.
//! Bucket-constant updates are plenty at this data scale — a k-d tree would
//! buy nothing here.
//!
//! The index is an approximation for *finding* nearby responders, never the
//! source of truth for ranking: the assigner re-sorts results by Haversine
//! distance against the registry's authoritative positions.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::common::{GeoPoint, ResponderId};

/// Cell edge in degrees (~55 km of latitude).
const CELL_SIZE_DEG: f64 = 0.5;
/// Approximate km per degree of latitude.
const KM_PER_DEG_LAT: f64 = 111.0;
/// Number of longitude cells around the globe, for wraparound.
const LON_CELLS: i32 = (360.0 / CELL_SIZE_DEG) as i32;

type Cell = (i32, i32);

#[derive(Default)]
struct Buckets {
    cells: HashMap<Cell, HashSet<ResponderId>>,
    // Reverse map so upsert can relocate and remove is O(1).
    positions: HashMap<ResponderId, (Cell, GeoPoint)>,
}

/// Spatial index with multi-reader/single-writer synchronization: radius
/// queries take a read lock and may run concurrently; upsert/remove take the
/// write lock briefly.
#[derive(Default)]
pub struct GeoIndex {
    inner: RwLock<Buckets>,
}

fn cell_for(point: &GeoPoint) -> Cell {
    let lat = (point.lat() / CELL_SIZE_DEG).floor() as i32;
    let lon = (point.lon() / CELL_SIZE_DEG).floor() as i32;
    (lat, lon.rem_euclid(LON_CELLS))
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or relocate a responder. Idempotent: re-upserting the same
    /// position is a no-op beyond the bucket lookup.
    pub fn upsert(&self, id: ResponderId, location: GeoPoint) {
        let cell = cell_for(&location);
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some((old_cell, _)) = inner.positions.get(&id).copied() {
            if old_cell != cell {
                let emptied = match inner.cells.get_mut(&old_cell) {
                    Some(bucket) => {
                        bucket.remove(&id);
                        bucket.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    inner.cells.remove(&old_cell);
                }
            }
        }

        inner.cells.entry(cell).or_default().insert(id);
        inner.positions.insert(id, (cell, location));
    }

    /// Remove a responder from the index. Safe to call when absent.
    pub fn remove(&self, id: &ResponderId) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some((cell, _)) = inner.positions.remove(id) {
            let emptied = match inner.cells.get_mut(&cell) {
                Some(bucket) => {
                    bucket.remove(id);
                    bucket.is_empty()
                }
                None => false,
            };
            if emptied {
                inner.cells.remove(&cell);
            }
        }
    }

    /// All responders within `radius_km` of `point`, unordered.
    pub fn query_within_radius(&self, point: &GeoPoint, radius_km: f64) -> Vec<ResponderId> {
        if radius_km <= 0.0 {
            return Vec::new();
        }

        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        let lat_span = (radius_km / (KM_PER_DEG_LAT * CELL_SIZE_DEG)).ceil() as i32;
        // Longitude degrees shrink with latitude; clamp the cosine so polar
        // queries degrade to a wide scan instead of dividing by zero.
        let cos_lat = point.lat().to_radians().cos().max(0.01);
        let lon_span = (radius_km / (KM_PER_DEG_LAT * cos_lat * CELL_SIZE_DEG)).ceil() as i32;
        let lon_span = lon_span.min(LON_CELLS / 2);

        let (center_lat, center_lon) = cell_for(point);
        let mut results = Vec::new();

        for dlat in -lat_span..=lat_span {
            for dlon in -lon_span..=lon_span {
                let cell = (center_lat + dlat, (center_lon + dlon).rem_euclid(LON_CELLS));
                let Some(bucket) = inner.cells.get(&cell) else {
                    continue;
                };
                for id in bucket {
                    if let Some((_, location)) = inner.positions.get(id) {
                        if point.distance_km(location) <= radius_km {
                            results.push(*id);
                        }
                    }
                }
            }
        }

        results
    }

    /// Number of indexed responders.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .positions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
