use async_trait::async_trait;

use crate::PermissionStatus;
use crate::location::{
    FixedLocationConfig, LocationError, LocationFeed, LocationFix, LocationProvider,
};

/// Reports a single configured position, stamped with the time it was read
pub struct FixedProvider {
    config: FixedLocationConfig,
}

impl FixedProvider {
    pub fn new(config: &FixedLocationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl LocationProvider for FixedProvider {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn run(&self, feed: LocationFeed) -> Result<(), LocationError> {
        feed.publish(LocationFix::new(
            self.config.latitude,
            self.config.longitude,
            self.config.altitude,
            self.config.horizontal_accuracy,
        ));
        Ok(())
    }

    fn name(&self) -> &str {
        "Fixed Location"
    }
}
