use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::messages::RenderRequest;

/// Ellipsis frames for the scanning status line.
pub const ELLIPSIS_FRAMES: [&str; 4] = [".", "..", "...", "...."];

/// Infinite, restartable cycle over the ellipsis frames.
pub fn ellipsis_frames() -> impl Iterator<Item = &'static str> {
    ELLIPSIS_FRAMES.iter().copied().cycle()
}

pub struct Animator {
    renderer: mpsc::Sender<RenderRequest>,
}

impl Animator {
    pub fn new(renderer: mpsc::Sender<RenderRequest>) -> Self {
        Animator { renderer }
    }

    /// Advance the scanning animation once per second, forever, independent
    /// of scan state.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for frame in ellipsis_frames() {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tick.tick() => {}
            }
            self.renderer
                .send(RenderRequest::Status { frame })
                .await
                .context("render channel closed")?;
        }
        Ok(())
    }
}
