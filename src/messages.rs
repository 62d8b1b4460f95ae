/// What the display should show next.
///
/// The scanner and animator never touch the pixel buffer directly. They
/// describe what to show and the renderer serializes the actual draws, so an
/// alert cannot be clobbered by the next animation tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderRequest {
    Status { frame: &'static str },
    SkimmerAlert { name: String },
}

/// One device seen during a scan window. Advertisements may omit a local
/// name; nameless devices count toward the scan total but can never match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
}
