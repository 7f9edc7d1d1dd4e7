//! Hazard reports for dog walkers: a spatial index of reported hazards,
//! radius and category queries over it, straight-line route checks, and
//! emergency guidance built on top.

pub mod api;
pub mod config;
pub mod emergency;
pub mod error;
pub mod geo_math;
pub mod hazard;
pub mod index;
pub mod proximity;
pub mod route;

pub use emergency::{EmergencyCoordinator, EmergencyResponse, SafeRouteRecommendation};
pub use error::{HazardError, Result};
pub use geo_math::{GeoPoint, haversine_distance};
pub use hazard::{
    HazardCategory, HazardFilter, HazardId, HazardPatch, HazardRecord, HazardState, NearbyHazard,
    NewHazard, ReporterId,
};
pub use index::{HazardIndex, HazardSource};
pub use proximity::ProximityQueryService;
pub use route::{RouteSafety, RouteSafetyEvaluator};
