pub mod config;
pub mod error;
pub mod providers;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::PermissionStatus;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;
    /// Deliver fixes into `feed` until the source runs dry
    async fn run(&self, feed: LocationFeed) -> Result<(), LocationError>;
    fn name(&self) -> &str;
}

pub type DynLocationProvider = Arc<dyn LocationProvider>;

pub fn create_provider(config: &LocationConfig) -> DynLocationProvider {
    match config {
        LocationConfig::Fixed(fixed) => Arc::new(providers::fixed::FixedProvider::new(fixed)),
        LocationConfig::Track(track) => Arc::new(providers::track::TrackProvider::new(track)),
    }
}

/// Producer side of the latest-fix slot handed to a running provider
#[derive(Clone)]
pub struct LocationFeed {
    latest: Arc<watch::Sender<Option<LocationFix>>>,
}

impl LocationFeed {
    /// Replace the latest fix. Invalid fixes are reported and dropped.
    pub fn publish(&self, fix: LocationFix) {
        if let Err(reason) = fix.validate() {
            self.report(LocationError::InvalidFix(reason));
            return;
        }

        debug!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            accuracy = fix.horizontal_accuracy,
            "Location updated"
        );
        self.latest.send_replace(Some(fix));
    }

    /// Location errors are logged and otherwise ignored
    pub fn report(&self, error: LocationError) {
        warn!("Error getting location: {}", error);
    }
}

/// Read side of the latest-fix slot
#[derive(Clone, Debug)]
pub struct LatestFix {
    rx: watch::Receiver<Option<LocationFix>>,
}

impl LatestFix {
    pub fn channel() -> (LocationFeed, LatestFix) {
        let (tx, rx) = watch::channel(None);
        (
            LocationFeed {
                latest: Arc::new(tx),
            },
            LatestFix { rx },
        )
    }

    /// A slot that permanently holds `fix`
    pub fn fixed(fix: LocationFix) -> Self {
        let (_tx, rx) = watch::channel(Some(fix));
        Self { rx }
    }

    /// A slot that never receives a fix
    pub fn empty() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx }
    }

    pub fn current(&self) -> Option<LocationFix> {
        *self.rx.borrow()
    }

    /// Wait up to `timeout` for the first fix to arrive
    pub async fn wait_for_fix(&self, timeout: Duration) -> Option<LocationFix> {
        let mut rx = self.rx.clone();
        let waited = tokio::time::timeout(timeout, async move {
            rx.wait_for(|fix| fix.is_some()).await.ok().and_then(|fix| *fix)
        })
        .await;

        match waited {
            Ok(Some(fix)) => Some(fix),
            _ => self.current(),
        }
    }
}

/// Ask for permission and start the provider in the background.
///
/// A denied permission leaves the slot empty forever, which makes every
/// capture a silent no-op rather than an error.
pub fn start_location_updates(provider: DynLocationProvider) -> (LatestFix, JoinHandle<()>) {
    let (feed, latest) = LatestFix::channel();

    let handle = tokio::spawn(async move {
        if provider.request_permission().await == PermissionStatus::Denied {
            info!(
                "Location permission denied by {}, location updates disabled",
                provider.name()
            );
            return;
        }

        info!("Starting location updates from {}", provider.name());
        match provider.run(feed).await {
            Ok(()) => debug!("Location provider {} finished", provider.name()),
            Err(e) => error!("Location provider {} failed: {}", provider.name(), e),
        }
    });

    (latest, handle)
}
