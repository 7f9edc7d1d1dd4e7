use std::env;

use crate::emergency::{EMERGENCY_RADIUS_METERS, ROUTE_BUFFER_METERS};
use crate::proximity::DEFAULT_SEARCH_RADIUS_METERS;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Radius used by nearby-hazard queries that do not give one
    pub default_search_radius_meters: f64,
    /// Radius checked around an emergency location
    pub emergency_radius_meters: f64,
    /// Buffer around a route when recommending safe routes
    pub route_buffer_meters: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            default_search_radius_meters: DEFAULT_SEARCH_RADIUS_METERS,
            emergency_radius_meters: EMERGENCY_RADIUS_METERS,
            route_buffer_meters: ROUTE_BUFFER_METERS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // .env is optional
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| format!("Invalid PORT: {}", e))?,
            None => defaults.port,
        };

        Ok(Self {
            host,
            port,
            default_search_radius_meters: meters(
                &lookup,
                "DEFAULT_SEARCH_RADIUS_METERS",
                defaults.default_search_radius_meters,
            )?,
            emergency_radius_meters: meters(
                &lookup,
                "EMERGENCY_RADIUS_METERS",
                defaults.emergency_radius_meters,
            )?,
            route_buffer_meters: meters(
                &lookup,
                "ROUTE_BUFFER_METERS",
                defaults.route_buffer_meters,
            )?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn meters<F>(lookup: &F, key: &str, default: f64) -> Result<f64, String>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        Ok(value) => Err(format!("{} must be positive, got {}", key, value)),
        Err(e) => Err(format!("Invalid {}: {}", key, e)),
    }
}
