//! Straight-line route checks against reported hazards.
//!
//! Each segment of a route is covered by one circle centered on the
//! segment's midpoint with radius `max(buffer, length / 2 + buffer)`. That
//! circle contains the full buffer around the segment, so a check can give
//! false positives but never misses a hazard inside the buffer.

use geo::{Coord, Line, LineString};
use itertools::Itertools;
use serde::Serialize;

use crate::error::{HazardError, Result};
use crate::geo_math::{GeoPoint, haversine_distance, validate_distance};
use crate::hazard::{HazardFilter, HazardRecord};
use crate::proximity::ProximityQueryService;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSafety {
    pub has_hazard: bool,
    /// Hazards found near any segment, ordered by id.
    pub hazards: Vec<HazardRecord>,
    pub segments_checked: usize,
}

#[derive(Clone)]
pub struct RouteSafetyEvaluator {
    proximity: ProximityQueryService,
}

impl RouteSafetyEvaluator {
    pub fn new(proximity: ProximityQueryService) -> Self {
        Self { proximity }
    }

    pub fn evaluate_segment(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        buffer_meters: f64,
    ) -> Result<RouteSafety> {
        self.evaluate(&[start, end], buffer_meters)
    }

    /// Checks every consecutive pair of `route` and unions the hazards found.
    pub fn evaluate(&self, route: &[GeoPoint], buffer_meters: f64) -> Result<RouteSafety> {
        let buffer = validate_distance("buffer", buffer_meters)?;
        if route.len() < 2 {
            return Err(HazardError::validation(format!(
                "a route needs at least 2 points, got {}",
                route.len()
            )));
        }

        let line: LineString<f64> = route.iter().map(|p| Coord::from(*p)).collect();
        let mut found = Vec::new();
        let mut segments_checked = 0;
        for segment in line.lines() {
            let (center, radius) = search_circle(&segment, buffer)?;
            let hits = self
                .proximity
                .find_within_radius(&center, Some(radius), &HazardFilter::default())?;
            found.extend(hits.into_iter().map(|hit| hit.hazard));
            segments_checked += 1;
        }

        let hazards: Vec<HazardRecord> = found
            .into_iter()
            .sorted_by_key(|h| h.id())
            .dedup_by(|a, b| a.id() == b.id())
            .collect();

        tracing::debug!(
            "Route of {} segments checked with {}m buffer: {} hazards",
            segments_checked,
            buffer,
            hazards.len()
        );

        Ok(RouteSafety {
            has_hazard: !hazards.is_empty(),
            hazards,
            segments_checked,
        })
    }
}

/// Midpoint (plain lat/lon average) and covering radius for one segment.
fn search_circle(segment: &Line<f64>, buffer: f64) -> Result<(GeoPoint, f64)> {
    let start = GeoPoint::try_from(segment.start)?;
    let end = GeoPoint::try_from(segment.end)?;
    let center = GeoPoint::try_from((segment.start + segment.end) / 2.0)?;

    let length = haversine_distance(&start, &end);
    let radius = buffer.max(length / 2.0 + buffer);
    Ok((center, radius))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::{HazardCategory, NewHazard, ReporterId};
    use crate::index::HazardIndex;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn evaluator_with(points: &[(f64, f64)]) -> RouteSafetyEvaluator {
        let index = Arc::new(HazardIndex::new());
        for &(latitude, longitude) in points {
            index
                .insert(NewHazard {
                    reporter_id: ReporterId::from("walker-1"),
                    category: HazardCategory::AggressiveDog,
                    description: None,
                    latitude,
                    longitude,
                    image_ref: None,
                })
                .unwrap();
        }
        RouteSafetyEvaluator::new(ProximityQueryService::new(index))
    }

    #[test]
    fn test_hazard_at_midpoint_is_found() {
        let evaluator = evaluator_with(&[(37.50, 127.005)]);
        let safety = evaluator
            .evaluate_segment(p(37.50, 127.00), p(37.50, 127.01), 50.0)
            .unwrap();
        assert!(safety.has_hazard);
        assert_eq!(safety.hazards.len(), 1);
        assert_eq!(safety.segments_checked, 1);
    }

    #[test]
    fn test_unobstructed_route_is_clear() {
        let evaluator = evaluator_with(&[(37.60, 127.10)]);
        let safety = evaluator
            .evaluate_segment(p(37.50, 127.00), p(37.518, 127.00), 100.0)
            .unwrap();
        assert!(!safety.has_hazard);
        assert!(safety.hazards.is_empty());
    }

    #[test]
    fn test_search_circle_covers_segment() {
        let segment = Line::new(Coord::from(p(37.50, 127.00)), Coord::from(p(37.50, 127.01)));
        let (center, radius) = search_circle(&segment, 50.0).unwrap();
        assert_relative_eq!(center.longitude(), 127.005, epsilon = 1e-12);
        let length = haversine_distance(&p(37.50, 127.00), &p(37.50, 127.01));
        assert_relative_eq!(radius, length / 2.0 + 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_length_route_uses_buffer() {
        let segment = Line::new(Coord::from(p(37.5, 127.0)), Coord::from(p(37.5, 127.0)));
        let (_, radius) = search_circle(&segment, 75.0).unwrap();
        assert_eq!(radius, 75.0);

        let evaluator = evaluator_with(&[(37.5006, 127.0)]); // ~67 m north
        let near = evaluator
            .evaluate_segment(p(37.5, 127.0), p(37.5, 127.0), 75.0)
            .unwrap();
        assert!(near.has_hazard);
        let far = evaluator
            .evaluate_segment(p(37.5, 127.0), p(37.5, 127.0), 50.0)
            .unwrap();
        assert!(!far.has_hazard);
    }

    #[test]
    fn test_polyline_unions_segments_without_duplicates() {
        // one hazard near the corner, seen by both segments; one near the end
        let evaluator = evaluator_with(&[(37.51, 127.0001), (37.51, 127.0195)]);
        let route = [p(37.50, 127.00), p(37.51, 127.00), p(37.51, 127.02)];
        let safety = evaluator.evaluate(&route, 100.0).unwrap();
        assert_eq!(safety.segments_checked, 2);
        assert_eq!(safety.hazards.len(), 2);
        assert!(safety.hazards[0].id() < safety.hazards[1].id());
    }

    #[test]
    fn test_rejects_short_route_and_bad_buffer() {
        let evaluator = evaluator_with(&[]);
        assert!(matches!(
            evaluator.evaluate(&[p(37.5, 127.0)], 100.0),
            Err(HazardError::Validation(_))
        ));
        assert!(matches!(
            evaluator.evaluate_segment(p(37.5, 127.0), p(37.6, 127.0), 0.0),
            Err(HazardError::Validation(_))
        ));
    }
}
