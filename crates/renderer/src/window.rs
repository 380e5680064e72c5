use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use nebula::{FrameUniforms, Palette, Resolution};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowBuilder, WindowLevel};

use crate::gpu::GpuState;
use crate::runtime::{effective_policy, RenderPolicyDriver};
use crate::types::{BackdropMode, Presentation, RendererConfig};

/// Window plus whatever backdrop could be built for it.
///
/// `backdrop` is declared before `window` so the surface is released before
/// the window it was created from.
pub(crate) struct WindowState {
    backdrop: Option<GpuState>,
    window: Arc<Window>,
    palette: Palette,
    drawable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderFrameStatus {
    Presented,
    /// Nothing was drawn: no backdrop, or the viewport has zero area.
    Skipped,
}

impl WindowState {
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> Self {
        let size = window.inner_size();
        let backdrop = match GpuState::new(
            window.as_ref(),
            size,
            &config.palette,
            config.fallback_color,
            config.color_space,
        ) {
            Ok(gpu) => Some(gpu),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "GPU unavailable; window stays open without a backdrop");
                None
            }
        };

        Self {
            backdrop,
            window,
            palette: config.palette,
            drawable: size.width > 0 && size.height > 0,
        }
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    pub(crate) fn mode(&self) -> BackdropMode {
        self.backdrop
            .as_ref()
            .map_or(BackdropMode::Unavailable, GpuState::mode)
    }

    /// True while a frame could actually reach the screen.
    pub(crate) fn wants_frames(&self) -> bool {
        self.backdrop.is_some() && self.drawable
    }

    pub(crate) fn is_software_adapter(&self) -> bool {
        self.backdrop
            .as_ref()
            .is_some_and(|gpu| gpu.adapter_profile().is_software())
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.drawable = new_size.width > 0 && new_size.height > 0;
        if !self.drawable {
            debug!(
                width = new_size.width,
                height = new_size.height,
                "viewport has zero area; pausing frames"
            );
            return;
        }
        if let Some(gpu) = self.backdrop.as_mut() {
            gpu.resize(new_size);
        }
    }

    pub(crate) fn render_frame(
        &mut self,
        elapsed_time: f32,
    ) -> Result<RenderFrameStatus, wgpu::SurfaceError> {
        let Some(gpu) = self.backdrop.as_mut() else {
            return Ok(RenderFrameStatus::Skipped);
        };

        let size = self.window.inner_size();
        let resolution = Resolution::new(size.width, size.height);
        if !resolution.is_drawable() {
            self.drawable = false;
            return Ok(RenderFrameStatus::Skipped);
        }
        if size != gpu.size() {
            gpu.resize(size);
        }
        let applied = gpu.size();

        let frame = FrameUniforms::new(
            elapsed_time,
            Resolution::new(applied.width, applied.height),
            self.palette,
        );
        gpu.render(&frame)?;
        Ok(RenderFrameStatus::Presented)
    }

    fn recover_surface(&mut self) {
        if let Some(gpu) = self.backdrop.as_mut() {
            gpu.reconfigure();
        }
    }
}

/// Window attributes for each presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowChrome {
    fullscreen: bool,
    decorations: bool,
    stay_below: bool,
    pass_through_input: bool,
}

impl WindowChrome {
    fn for_config(config: &RendererConfig) -> Self {
        match config.presentation {
            Presentation::Background => Self {
                fullscreen: true,
                decorations: false,
                stay_below: true,
                pass_through_input: true,
            },
            Presentation::Windowed => Self {
                fullscreen: false,
                decorations: true,
                stay_below: config.click_through,
                pass_through_input: config.click_through,
            },
        }
    }
}

/// Runs the backdrop in a winit window: a borderless fullscreen window kept
/// below others for [`Presentation::Background`], a regular one otherwise.
pub(crate) fn run(config: RendererConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let chrome = WindowChrome::for_config(&config);
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let mut builder = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .with_decorations(chrome.decorations);
    if chrome.fullscreen {
        builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    if chrome.stay_below {
        builder = builder
            .with_window_level(WindowLevel::AlwaysOnBottom)
            .with_active(false);
    }
    let window = builder
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create backdrop window: {err}"))?;
    let window = Arc::new(window);

    if chrome.pass_through_input {
        if let Err(err) = window.set_cursor_hittest(false) {
            warn!(error = %err, "click-through is not supported on this platform");
        }
    }

    let mut state = WindowState::new(window, &config);
    let (policy, software_cap) = effective_policy(&config.policy, state.is_software_adapter());
    if let Some(cap) = software_cap {
        warn!(
            cap,
            "software rasterizer detected; capping backdrop to {} FPS (override with --fps)", cap
        );
    }
    info!(mode = ?state.mode(), policy = ?policy, "backdrop ready");

    let mut policy_driver = RenderPolicyDriver::new(policy);
    if state.wants_frames() {
        state.window().request_redraw();
    }

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    state.resize(new_size);
                    policy_driver.invalidate();
                    if state.wants_frames() {
                        state.window().request_redraw();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let elapsed = policy_driver.sample();
                    match state.render_frame(elapsed) {
                        Ok(RenderFrameStatus::Presented) => policy_driver.mark_rendered(),
                        Ok(RenderFrameStatus::Skipped) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            state.recover_surface();
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; closing backdrop");
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            debug!("surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            warn!(error = ?other, "surface error; retrying next frame");
                        }
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            if !state.wants_frames() {
                elwt.set_control_flow(ControlFlow::Wait);
            } else if policy_driver.ready_for_frame(now) {
                tracing::trace!("scheduler: issuing redraw now");
                state.window().request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = policy_driver.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        Event::LoopExiting => {
            info!("backdrop closing; releasing GPU resources");
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_window_is_fullscreen_and_ignores_input() {
        let config = RendererConfig::default();
        let chrome = WindowChrome::for_config(&config);
        assert_eq!(
            chrome,
            WindowChrome {
                fullscreen: true,
                decorations: false,
                stay_below: true,
                pass_through_input: true,
            }
        );
    }

    #[test]
    fn windowed_presentation_keeps_input_unless_click_through() {
        let mut config = RendererConfig {
            presentation: Presentation::Windowed,
            ..RendererConfig::default()
        };
        let chrome = WindowChrome::for_config(&config);
        assert!(!chrome.fullscreen);
        assert!(chrome.decorations);
        assert!(!chrome.pass_through_input);

        config.click_through = true;
        let chrome = WindowChrome::for_config(&config);
        assert!(chrome.stay_below);
        assert!(chrome.pass_through_input);
    }
}
