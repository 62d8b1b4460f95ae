use std::time::Duration;

use anyhow::Result;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use log::debug;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::messages::RenderRequest;

const TEXT_STYLE: MonoTextStyle<'static, BinaryColor> =
    MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

/// Status line sits on the alert's middle row.
const STATUS_POS: Point = Point::new(0, 24);
const ALERT_TOP: i32 = 12;
const ALERT_LINE_HEIGHT: i32 = 12;

/// Draw one logical frame onto a cleared surface.
pub fn draw_view<D>(target: &mut D, view: &RenderRequest) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;
    match view {
        RenderRequest::Status { frame } => {
            let line = format!("Scanning{frame}");
            Text::with_baseline(&line, STATUS_POS, TEXT_STYLE, Baseline::Top).draw(target)?;
        }
        RenderRequest::SkimmerAlert { name } => {
            let middle = format!("{name} found.");
            let lines = ["Potential skimmer", middle.as_str(), "Skip this pump."];
            for (row, line) in lines.into_iter().enumerate() {
                let position = Point::new(0, ALERT_TOP + row as i32 * ALERT_LINE_HEIGHT);
                Text::with_baseline(line, position, TEXT_STYLE, Baseline::Top).draw(target)?;
            }
        }
    }
    Ok(())
}

/// The one place pixels get pushed to hardware.
pub trait Screen: Send {
    fn render(&mut self, view: &RenderRequest) -> Result<()>;
}

pub struct Renderer<S> {
    screen: S,
    requests: mpsc::Receiver<RenderRequest>,
    alert_hold: Duration,
}

impl<S: Screen> Renderer<S> {
    pub fn new(screen: S, requests: mpsc::Receiver<RenderRequest>, alert_hold: Duration) -> Self {
        Renderer {
            screen,
            requests,
            alert_hold,
        }
    }

    /// Serialize all draws onto the screen. Status ticks that arrive while an
    /// alert is still being held are dropped, so the animation cannot clobber
    /// the alert.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut hold_until: Option<Instant> = None;

        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                request = self.requests.recv() => match request {
                    Some(request) => request,
                    None => return Ok(()),
                },
            };

            match &request {
                RenderRequest::Status { .. } => {
                    if let Some(until) = hold_until {
                        if Instant::now() < until {
                            debug!("Dropping status tick during alert hold");
                            continue;
                        }
                        hold_until = None;
                    }
                    self.screen.render(&request)?;
                }
                RenderRequest::SkimmerAlert { .. } => {
                    self.screen.render(&request)?;
                    hold_until = Some(Instant::now() + self.alert_hold);
                }
            }
        }
    }
}
