//! Render host for the nebula backdrop.
//!
//! ```text
//!   nebulash CLI
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ─┬─▶ layer (Wayland background layer, frame callbacks)
//!                  └─▶ window (winit fallback or --windowed, redraw requests)
//!                            │
//!                            └─▶ FrameUniforms ─▶ GPU UBO ─▶ quad
//! ```
//!
//! Both paths own a `GpuState` (surface, device, pipeline, uniform buffer).
//! When no GPU can be created the background layer is filled with the
//! fallback color from a shared-memory buffer. [`export::export_still`]
//! renders the same field on the CPU for headless PNG output.

mod compile;
pub mod export;
mod fallback;
mod gpu;
mod layer;
mod runtime;
mod types;
mod window;

use anyhow::Result;
use tracing::warn;

pub use export::{export_still, StillExport};
pub use runtime::{
    time_source_for_policy, BoxedTimeSource, FixedTimeSource, FrameScheduler, RenderPolicy,
    SystemTimeSource, TimeSource,
};
pub use types::{AdapterProfile, BackdropMode, ColorSpaceMode, Presentation, RendererConfig};

/// Entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Presents the backdrop until it is closed.
    ///
    /// [`Presentation::Background`] prefers a Wayland background layer and
    /// falls back to a fullscreen bottom window when the session has none.
    /// Fails only when nothing can be opened at all; a missing GPU leaves the
    /// backdrop up in [`BackdropMode::Unavailable`].
    pub fn run(&mut self) -> Result<()> {
        match self.config.presentation {
            Presentation::Background => match layer::connect(&self.config) {
                Ok(session) => session.run(),
                Err(err) => {
                    warn!(
                        error = %format!("{err:#}"),
                        "background layer unavailable; using a fullscreen window"
                    );
                    window::run(self.config.clone())
                }
            },
            Presentation::Windowed => window::run(self.config.clone()),
        }
    }
}
