use std::sync::Arc;

use crate::error::Result;
use crate::geo_math::{GeoPoint, validate_distance};
use crate::hazard::{HazardCategory, HazardFilter, HazardRecord, NearbyHazard};
use crate::index::HazardSource;

pub const DEFAULT_SEARCH_RADIUS_METERS: f64 = 1000.0;

/// Read-only queries over a [`HazardSource`]: hazards near a point and
/// hazards of one category.
#[derive(Clone)]
pub struct ProximityQueryService {
    source: Arc<dyn HazardSource>,
    default_radius_meters: f64,
}

impl ProximityQueryService {
    pub fn new(source: Arc<dyn HazardSource>) -> Self {
        Self {
            source,
            default_radius_meters: DEFAULT_SEARCH_RADIUS_METERS,
        }
    }

    pub fn with_default_radius(mut self, radius_meters: f64) -> Result<Self> {
        self.default_radius_meters = validate_distance("default radius", radius_meters)?;
        Ok(self)
    }

    pub fn default_radius(&self) -> f64 {
        self.default_radius_meters
    }

    /// Active hazards within `radius_meters` (default radius when `None`),
    /// closest first.
    pub fn find_within_radius(
        &self,
        center: &GeoPoint,
        radius_meters: Option<f64>,
        filter: &HazardFilter,
    ) -> Result<Vec<NearbyHazard>> {
        let radius = validate_distance(
            "radius",
            radius_meters.unwrap_or(self.default_radius_meters),
        )?;
        self.source.find_within_radius(center, radius, filter)
    }

    /// Same as [`find_within_radius`](Self::find_within_radius) from raw
    /// coordinates.
    pub fn nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: Option<f64>,
        filter: &HazardFilter,
    ) -> Result<Vec<NearbyHazard>> {
        let center = GeoPoint::new(latitude, longitude)?;
        self.find_within_radius(&center, radius_meters, filter)
    }

    pub fn by_category(&self, category: HazardCategory) -> Vec<HazardRecord> {
        self.source.find_by_category(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HazardError;
    use crate::hazard::{NewHazard, ReporterId};
    use crate::index::HazardIndex;

    fn service_with(points: &[(HazardCategory, f64, f64)]) -> ProximityQueryService {
        let index = Arc::new(HazardIndex::new());
        for &(category, latitude, longitude) in points {
            index
                .insert(NewHazard {
                    reporter_id: ReporterId::from("walker-1"),
                    category,
                    description: None,
                    latitude,
                    longitude,
                    image_ref: None,
                })
                .unwrap();
        }
        ProximityQueryService::new(index)
    }

    #[test]
    fn test_default_radius_is_one_kilometer() {
        let service = service_with(&[
            (HazardCategory::Leash, 37.5080, 127.0),  // ~890 m
            (HazardCategory::Leash, 37.5100, 127.0),  // ~1112 m
        ]);
        let hits = service
            .nearby(37.5, 127.0, None, &HazardFilter::default())
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(service.default_radius(), DEFAULT_SEARCH_RADIUS_METERS);
    }

    #[test]
    fn test_scenario_radius_includes_then_excludes() {
        let service = service_with(&[(HazardCategory::AggressiveDog, 37.5000, 127.0000)]);

        let wide = service
            .nearby(37.5005, 127.0000, Some(1000.0), &HazardFilter::default())
            .unwrap();
        assert_eq!(wide.len(), 1);
        assert!((wide[0].distance_meters - 55.5).abs() < 1.0);

        let narrow = service
            .nearby(37.5005, 127.0000, Some(10.0), &HazardFilter::default())
            .unwrap();
        assert!(narrow.is_empty());
    }

    #[test]
    fn test_larger_radius_is_superset() {
        let service = service_with(&[
            (HazardCategory::Wildlife, 37.501, 127.001),
            (HazardCategory::Wildlife, 37.504, 126.998),
            (HazardCategory::LowLight, 37.510, 127.010),
            (HazardCategory::BikeCar, 37.530, 127.030),
        ]);
        let center = GeoPoint::new(37.5, 127.0).unwrap();
        for r in [100.0, 400.0, 1500.0, 5000.0] {
            let big = service
                .find_within_radius(&center, Some(r), &HazardFilter::default())
                .unwrap();
            let small = service
                .find_within_radius(&center, Some(r / 2.0), &HazardFilter::default())
                .unwrap();
            for hit in &small {
                assert!(big.iter().any(|h| h.hazard.id() == hit.hazard.id()));
            }
        }
    }

    #[test]
    fn test_rejects_non_positive_radius_and_bad_center() {
        let service = service_with(&[]);
        for radius in [0.0, -10.0, f64::NAN] {
            assert!(matches!(
                service.nearby(37.5, 127.0, Some(radius), &HazardFilter::default()),
                Err(HazardError::Validation(_))
            ));
        }
        assert!(matches!(
            service.nearby(-100.0, 127.0, None, &HazardFilter::default()),
            Err(HazardError::Validation(_))
        ));
        assert!(service.clone().with_default_radius(0.0).is_err());
    }

    #[test]
    fn test_reported_since_filter() {
        let index = Arc::new(HazardIndex::new());
        let report = |category| {
            index
                .insert(NewHazard {
                    reporter_id: ReporterId::from("walker-1"),
                    category,
                    description: None,
                    latitude: 37.5,
                    longitude: 127.0,
                    image_ref: None,
                })
                .unwrap()
        };
        let old = report(HazardCategory::Leash);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let fresh = report(HazardCategory::Leash);
        let service = ProximityQueryService::new(index.clone());

        let recent = service
            .nearby(37.5, 127.0, None, &HazardFilter::default().since(fresh.created_at()))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].hazard.id(), fresh.id());

        let all = service
            .nearby(37.5, 127.0, None, &HazardFilter::default().since(old.created_at()))
            .unwrap();
        assert_eq!(all.len(), 2);

        let later = fresh.created_at() + chrono::Duration::hours(1);
        let none = service
            .nearby(37.5, 127.0, None, &HazardFilter::default().since(later))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_by_category() {
        let service = service_with(&[
            (HazardCategory::PoopLeft, 37.5, 127.0),
            (HazardCategory::PoopLeft, 35.1, 129.0),
            (HazardCategory::Muzzle, 37.5, 127.0),
        ]);
        assert_eq!(service.by_category(HazardCategory::PoopLeft).len(), 2);
        assert!(service.by_category(HazardCategory::Wildlife).is_empty());
    }
}
