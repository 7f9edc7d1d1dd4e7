//! Emergency handling and safe-route recommendations.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::Result;
use crate::geo_math::{GeoPoint, validate_distance};
use crate::hazard::HazardFilter;
use crate::proximity::ProximityQueryService;
use crate::route::RouteSafetyEvaluator;

pub const EMERGENCY_RADIUS_METERS: f64 = 500.0;
pub const ROUTE_BUFFER_METERS: f64 = 100.0;

const GENERIC_GUIDE: &str = "\
General emergency guide:
1. Stay calm and assess the situation
2. Call emergency services (119) if needed
3. Move to a safe place
4. Ask people nearby for help";

lazy_static! {
    /// Guide text per emergency type. Keys are upper case.
    static ref EMERGENCY_GUIDES: HashMap<&'static str, &'static str> = HashMap::from([
        (
            "AGGRESSIVE_DOG",
            "\
Aggressive dog guide:
1. Avoid sudden movements and back away slowly
2. Avoid direct eye contact
3. Stay calm and do not shout
4. Shield yourself with an object and call 119",
        ),
        (
            "TRAFFIC_ACCIDENT",
            "\
Traffic accident guide:
1. Move to a safe place immediately
2. Call 119 and 112
3. Give first aid to anyone injured
4. Preserve the scene and take photos",
        ),
        (
            "LOST_PET",
            "\
Lost pet guide:
1. Search the area right away and call your pet's name
2. Check the places you visited recently
3. Report to the local animal shelter and police
4. Post a missing notice on social media and community boards",
        ),
    ]);
}

/// Guide for `emergency_type`, or the generic guide when the type is unknown.
pub fn guide_for(emergency_type: &str) -> &'static str {
    let key = emergency_type.trim().to_ascii_uppercase();
    EMERGENCY_GUIDES
        .get(key.as_str())
        .copied()
        .unwrap_or(GENERIC_GUIDE)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub emergency_type: String,
    pub has_nearby_hazards: bool,
    pub nearby_hazard_count: usize,
    pub recommendation: String,
    pub guide_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeRouteRecommendation {
    pub has_alternative_route: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recommendation: String,
}

#[derive(Clone)]
pub struct EmergencyCoordinator {
    proximity: ProximityQueryService,
    routes: RouteSafetyEvaluator,
    emergency_radius_meters: f64,
    route_buffer_meters: f64,
}

impl EmergencyCoordinator {
    pub fn new(proximity: ProximityQueryService) -> Self {
        Self {
            routes: RouteSafetyEvaluator::new(proximity.clone()),
            proximity,
            emergency_radius_meters: EMERGENCY_RADIUS_METERS,
            route_buffer_meters: ROUTE_BUFFER_METERS,
        }
    }

    pub fn with_distances(
        mut self,
        emergency_radius_meters: f64,
        route_buffer_meters: f64,
    ) -> Result<Self> {
        self.emergency_radius_meters =
            validate_distance("emergency radius", emergency_radius_meters)?;
        self.route_buffer_meters = validate_distance("route buffer", route_buffer_meters)?;
        Ok(self)
    }

    /// Counts hazards around the caller and attaches the guide for
    /// `emergency_type`. Never writes to the index.
    pub fn handle_emergency(
        &self,
        latitude: f64,
        longitude: f64,
        emergency_type: &str,
    ) -> Result<EmergencyResponse> {
        let point = GeoPoint::new(latitude, longitude)?;
        tracing::info!(
            "Emergency reported: type={}, location=({}, {})",
            emergency_type,
            latitude,
            longitude
        );

        let nearby = self.proximity.find_within_radius(
            &point,
            Some(self.emergency_radius_meters),
            &HazardFilter::default(),
        )?;
        let count = nearby.len();
        let recommendation = if count > 0 {
            format!("Hazards nearby: {}. Move along a safe route.", count)
        } else {
            "Your current location is relatively safe. Move to the nearest safe area.".to_string()
        };

        Ok(EmergencyResponse {
            latitude,
            longitude,
            emergency_type: emergency_type.to_string(),
            has_nearby_hazards: count > 0,
            nearby_hazard_count: count,
            recommendation,
            guide_text: guide_for(emergency_type).to_string(),
        })
    }

    pub fn recommend_safe_route(
        &self,
        start_lat: f64,
        start_lon: f64,
        end_lat: f64,
        end_lon: f64,
    ) -> Result<SafeRouteRecommendation> {
        let start = GeoPoint::new(start_lat, start_lon)?;
        let end = GeoPoint::new(end_lat, end_lon)?;
        self.recommend_safe_route_via(&[start, end])
    }

    pub fn recommend_safe_route_via(
        &self,
        waypoints: &[GeoPoint],
    ) -> Result<SafeRouteRecommendation> {
        let safety = self.routes.evaluate(waypoints, self.route_buffer_meters)?;

        if safety.has_hazard {
            tracing::info!(
                "Route of {} segments passes {} hazards",
                safety.segments_checked,
                safety.hazards.len()
            );
            Ok(SafeRouteRecommendation {
                has_alternative_route: true,
                reason: Some("Hazards were found along the direct route.".to_string()),
                recommendation: "Take a detour or travel at a different time.".to_string(),
            })
        } else {
            Ok(SafeRouteRecommendation {
                has_alternative_route: false,
                reason: None,
                recommendation: "The current route is safe.".to_string(),
            })
        }
    }
}
