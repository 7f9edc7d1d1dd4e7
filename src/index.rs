//! In-memory hazard store with radius queries.
//!
//! Records live in an id-keyed map, tombstones included. Active records are
//! also kept in an R-tree over `[lon, lat]`, which narrows a radius query to
//! a bounding box before the exact haversine test runs.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rstar::{AABB, RTree, RTreeObject};

use crate::error::{HazardError, Result};
use crate::geo_math::{EARTH_RADIUS_METERS, GeoPoint, haversine_distance};
use crate::hazard::{
    HazardCategory, HazardFilter, HazardId, HazardPatch, HazardRecord, HazardState, NearbyHazard,
    NewHazard, ReporterId,
};

// Slack added to bounding boxes, in degrees, to absorb rounding.
const ENVELOPE_PADDING_DEG: f64 = 1e-9;

/// Read side of a hazard store: the queries the rest of the crate needs.
///
/// [`HazardIndex`] is the in-process implementation; a store with native
/// geo queries can stand in as long as it keeps the same semantics
/// (inclusive radius, no tombstones, ordered by distance then id).
pub trait HazardSource: Send + Sync {
    fn find_within_radius(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
        filter: &HazardFilter,
    ) -> Result<Vec<NearbyHazard>>;

    fn find_by_category(&self, category: HazardCategory) -> Vec<HazardRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedHazard {
    id: HazardId,
    coords: [f64; 2],
}

impl IndexedHazard {
    fn of(record: &HazardRecord) -> Self {
        Self {
            id: record.id,
            coords: [record.location.longitude(), record.location.latitude()],
        }
    }
}

impl RTreeObject for IndexedHazard {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

#[derive(Default)]
struct IndexState {
    records: HashMap<HazardId, HazardRecord>,
    spatial: RTree<IndexedHazard>,
    next_id: u64,
}

/// The authoritative hazard collection.
///
/// One lock covers the map and the R-tree, so a reader sees a write either
/// fully applied or not at all.
#[derive(Default)]
pub struct HazardIndex {
    inner: RwLock<IndexState>,
}

impl HazardIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, new: NewHazard) -> Result<HazardRecord> {
        let location = GeoPoint::new(new.latitude, new.longitude)?;

        let mut state = self.write();
        state.next_id += 1;
        let record = HazardRecord {
            id: HazardId(state.next_id),
            category: new.category,
            location,
            description: new.description,
            image_ref: new.image_ref,
            reporter_id: new.reporter_id,
            created_at: Utc::now(),
            state: HazardState::Active,
        };
        state.spatial.insert(IndexedHazard::of(&record));
        state.records.insert(record.id, record.clone());

        tracing::info!(
            "Hazard {} reported: {} at ({}, {})",
            record.id,
            record.category,
            location.latitude(),
            location.longitude()
        );
        Ok(record)
    }

    /// Applies `patch` to an active record, keeping id, reporter and
    /// creation time.
    pub fn update(&self, id: HazardId, patch: HazardPatch) -> Result<HazardRecord> {
        let new_location = patch
            .location
            .map(|(lat, lon)| GeoPoint::new(lat, lon))
            .transpose()?;

        let mut state = self.write();
        let current = match state.records.get(&id) {
            Some(r) if r.is_active() => r.clone(),
            _ => return Err(HazardError::NotFound(id)),
        };

        let mut updated = current.clone();
        if let Some(category) = patch.category {
            updated.category = category;
        }
        if let Some(description) = patch.description {
            updated.description = Some(description);
        }
        if let Some(image_ref) = patch.image_ref {
            updated.image_ref = Some(image_ref);
        }
        if let Some(location) = new_location {
            updated.location = location;
        }

        if updated.location != current.location {
            state.spatial.remove(&IndexedHazard::of(&current));
            state.spatial.insert(IndexedHazard::of(&updated));
        }
        state.records.insert(id, updated.clone());

        tracing::info!("Hazard {} updated", id);
        Ok(updated)
    }

    /// Tombstones a record. The record stays retrievable through [`get`].
    ///
    /// [`get`]: HazardIndex::get
    pub fn soft_delete(&self, id: HazardId) -> Result<HazardRecord> {
        let mut state = self.write();
        let record = state.records.get(&id).ok_or(HazardError::NotFound(id))?;
        if !record.is_active() {
            return Err(HazardError::AlreadyDeleted(id));
        }

        let indexed = IndexedHazard::of(record);
        state.spatial.remove(&indexed);

        let record = state
            .records
            .get_mut(&id)
            .ok_or(HazardError::NotFound(id))?;
        record.state = HazardState::Deleted { at: Utc::now() };
        let deleted = record.clone();

        tracing::info!("Hazard {} deleted", id);
        Ok(deleted)
    }

    /// Direct lookup, tombstoned records included.
    pub fn get(&self, id: HazardId) -> Result<HazardRecord> {
        self.read()
            .records
            .get(&id)
            .cloned()
            .ok_or(HazardError::NotFound(id))
    }

    pub fn reporter_of(&self, id: HazardId) -> Result<ReporterId> {
        self.read()
            .records
            .get(&id)
            .map(|r| r.reporter_id.clone())
            .ok_or(HazardError::NotFound(id))
    }

    pub fn active_count(&self) -> usize {
        self.read().spatial.size()
    }

    pub fn find_within_radius(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
        filter: &HazardFilter,
    ) -> Result<Vec<NearbyHazard>> {
        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(HazardError::validation(format!(
                "radius must be a non-negative number of meters, got {}",
                radius_meters
            )));
        }

        let state = self.read();
        let within = |indexed: &IndexedHazard| -> Option<NearbyHazard> {
            let record = state.records.get(&indexed.id)?;
            if !record.is_active() || !filter.matches(record) {
                return None;
            }
            let distance = haversine_distance(center, &record.location);
            (distance <= radius_meters).then(|| NearbyHazard {
                hazard: record.clone(),
                distance_meters: distance,
            })
        };

        let mut hits: Vec<NearbyHazard> = match search_envelope(center, radius_meters) {
            Some(envelope) => state
                .spatial
                .locate_in_envelope_intersecting(&envelope)
                .filter_map(within)
                .collect(),
            None => state.spatial.iter().filter_map(within).collect(),
        };
        drop(state);

        hits.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then(a.hazard.id.cmp(&b.hazard.id))
        });

        tracing::debug!(
            "{} hazards within {}m of ({}, {})",
            hits.len(),
            radius_meters,
            center.latitude(),
            center.longitude()
        );
        Ok(hits)
    }

    /// Active records of `category`, ordered by id.
    pub fn find_by_category(&self, category: HazardCategory) -> Vec<HazardRecord> {
        let mut found: Vec<HazardRecord> = self
            .read()
            .records
            .values()
            .filter(|r| r.is_active() && r.category == category)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        found
    }
}

impl HazardSource for HazardIndex {
    fn find_within_radius(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
        filter: &HazardFilter,
    ) -> Result<Vec<NearbyHazard>> {
        HazardIndex::find_within_radius(self, center, radius_meters, filter)
    }

    fn find_by_category(&self, category: HazardCategory) -> Vec<HazardRecord> {
        HazardIndex::find_by_category(self, category)
    }
}

/// Lon/lat box containing every point within `radius_meters` of `center`.
///
/// Returns `None` when the box would reach a pole or cross the antimeridian;
/// callers then scan all active records instead.
fn search_envelope(center: &GeoPoint, radius_meters: f64) -> Option<AABB<[f64; 2]>> {
    let angular = radius_meters / EARTH_RADIUS_METERS;
    let delta_lat = angular.to_degrees() + ENVELOPE_PADDING_DEG;

    let min_lat = center.latitude() - delta_lat;
    let max_lat = center.latitude() + delta_lat;
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return None;
    }

    // Widest longitude span is at the latitude farthest from the equator.
    let widest = min_lat.abs().max(max_lat.abs()).to_radians();
    let ratio = (angular / 2.0).sin() / widest.cos();
    if ratio >= 1.0 {
        return None;
    }
    let delta_lon = (2.0 * ratio.asin()).to_degrees() + ENVELOPE_PADDING_DEG;

    let min_lon = center.longitude() - delta_lon;
    let max_lon = center.longitude() + delta_lon;
    if min_lon < -180.0 || max_lon > 180.0 {
        return None;
    }

    Some(AABB::from_corners([min_lon, min_lat], [max_lon, max_lat]))
}
