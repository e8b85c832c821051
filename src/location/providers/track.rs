use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::PermissionStatus;
use crate::location::{LocationError, LocationFeed, LocationProvider, TrackConfig, TrackPoint};

/// Replays a recorded JSON-lines track, one fix per interval
pub struct TrackProvider {
    path: PathBuf,
    interval: Duration,
    repeat: bool,
}

impl TrackProvider {
    pub fn new(config: &TrackConfig) -> Self {
        Self {
            path: config.path.clone(),
            interval: Duration::from_millis(config.interval_ms),
            repeat: config.repeat,
        }
    }
}

#[async_trait]
impl LocationProvider for TrackProvider {
    async fn request_permission(&self) -> PermissionStatus {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_file() => PermissionStatus::Granted,
            _ => PermissionStatus::Denied,
        }
    }

    async fn run(&self, feed: LocationFeed) -> Result<(), LocationError> {
        loop {
            let content = tokio::fs::read_to_string(&self.path).await?;
            let mut published = 0usize;

            for (index, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                match serde_json::from_str::<TrackPoint>(line) {
                    Ok(point) => {
                        feed.publish(point.into_fix());
                        published += 1;
                        tokio::time::sleep(self.interval).await;
                    }
                    Err(source) => feed.report(LocationError::TrackParse {
                        line: index + 1,
                        source,
                    }),
                }
            }

            debug!("Replayed {} track points from {:?}", published, self.path);

            if !self.repeat || published == 0 {
                info!("Track {:?} finished", self.path);
                return Ok(());
            }
        }
    }

    fn name(&self) -> &str {
        "Track Replay"
    }
}
