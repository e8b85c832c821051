use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::location::LocationFix;

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Shown while no address is known for the fix
    pub placeholder: String,
    /// Upper bound on address lookup during a capture
    pub resolve_timeout_ms: u64,
    pub places: Vec<KnownPlace>,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            placeholder: "Loading address...".to_string(),
            resolve_timeout_ms: 500,
            places: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnownPlace {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,
}

fn default_radius_m() -> f64 {
    100.0
}

#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, fix: &LocationFix) -> Option<String>;
    fn name(&self) -> &str;
}

pub type DynAddressResolver = Arc<dyn AddressResolver>;

pub fn create_resolver(config: &AddressConfig) -> DynAddressResolver {
    if config.places.is_empty() {
        Arc::new(PlaceholderResolver)
    } else {
        Arc::new(KnownPlacesResolver::new(config.places.clone()))
    }
}

/// Look up the address for `fix`, falling back to `placeholder` when the
/// resolver has nothing or takes longer than `timeout`
pub async fn resolve_or_placeholder(
    resolver: &dyn AddressResolver,
    fix: &LocationFix,
    timeout: Duration,
    placeholder: &str,
) -> String {
    match tokio::time::timeout(timeout, resolver.resolve(fix)).await {
        Ok(Some(address)) => address,
        Ok(None) => placeholder.to_string(),
        Err(_) => {
            debug!(
                "Address lookup via {} timed out after {:?}",
                resolver.name(),
                timeout
            );
            placeholder.to_string()
        }
    }
}

/// Great-circle distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Names the closest configured place whose radius covers the fix
pub struct KnownPlacesResolver {
    places: Vec<KnownPlace>,
}

impl KnownPlacesResolver {
    pub fn new(places: Vec<KnownPlace>) -> Self {
        Self { places }
    }

    pub fn nearest(&self, fix: &LocationFix) -> Option<&KnownPlace> {
        self.places
            .iter()
            .map(|place| {
                let distance =
                    haversine_distance(fix.latitude, fix.longitude, place.latitude, place.longitude);
                (place, distance)
            })
            .filter(|(place, distance)| *distance <= place.radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(place, _)| place)
    }
}

#[async_trait]
impl AddressResolver for KnownPlacesResolver {
    async fn resolve(&self, fix: &LocationFix) -> Option<String> {
        self.nearest(fix).map(|place| place.name.clone())
    }

    fn name(&self) -> &str {
        "Known Places"
    }
}

/// Never knows an address
pub struct PlaceholderResolver;

#[async_trait]
impl AddressResolver for PlaceholderResolver {
    async fn resolve(&self, _fix: &LocationFix) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        "Placeholder"
    }
}
