//! The screen's photo view.
//!
//! A single task owns what is on screen. Everything else talks to it through
//! [`DisplayHandle`], so display state is never mutated from capture or
//! timer tasks directly.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// How long a stamped photo stays on screen
    pub clear_after_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            clear_after_ms: 1000,
        }
    }
}

/// The photo currently on screen
#[derive(Debug, Clone)]
pub struct DisplayedPhoto {
    /// Increases by one for every photo shown
    pub generation: u64,
    pub image: Arc<DynamicImage>,
}

enum DisplayCommand {
    Show(Arc<DynamicImage>),
    Clear { generation: u64 },
}

#[derive(Clone)]
pub struct DisplayHandle {
    commands: mpsc::UnboundedSender<DisplayCommand>,
    state: watch::Receiver<Option<DisplayedPhoto>>,
}

impl DisplayHandle {
    /// Put `image` on screen; it is cleared again after the configured delay
    pub fn show(&self, image: Arc<DynamicImage>) {
        if self.commands.send(DisplayCommand::Show(image)).is_err() {
            warn!("Display task has stopped, dropping photo");
        }
    }

    pub fn current(&self) -> Option<DisplayedPhoto> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DisplayedPhoto>> {
        self.state.clone()
    }
}

/// Start the display task. It runs until every [`DisplayHandle`] is dropped.
pub fn spawn_display(config: &DisplayConfig) -> (DisplayHandle, JoinHandle<()>) {
    let (commands, mut inbox) = mpsc::unbounded_channel();
    let (state_tx, state) = watch::channel(None);
    let clear_after = Duration::from_millis(config.clear_after_ms);
    // Timers hold a weak sender so pending clears don't keep the task alive
    let timer_sender = commands.downgrade();

    let task = tokio::spawn(async move {
        let mut generation = 0u64;

        while let Some(command) = inbox.recv().await {
            match command {
                DisplayCommand::Show(image) => {
                    generation += 1;
                    debug!(
                        generation,
                        width = image.width(),
                        height = image.height(),
                        "Showing photo"
                    );
                    state_tx.send_replace(Some(DisplayedPhoto { generation, image }));

                    let timer_sender = timer_sender.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(clear_after).await;
                        if let Some(sender) = timer_sender.upgrade() {
                            let _ = sender.send(DisplayCommand::Clear { generation });
                        }
                    });
                }
                DisplayCommand::Clear { generation: target } => {
                    let is_current = state_tx
                        .borrow()
                        .as_ref()
                        .is_some_and(|shown| shown.generation == target);
                    if is_current {
                        debug!(generation = target, "Clearing photo");
                        state_tx.send_replace(None);
                    } else {
                        debug!(generation = target, "Ignoring clear for a replaced photo");
                    }
                }
            }
        }

        debug!("Display task stopped");
    });

    (DisplayHandle { commands, state }, task)
}
