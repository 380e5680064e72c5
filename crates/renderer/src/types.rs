use nebula::{Palette, Vec3};

use crate::runtime::RenderPolicy;

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Pick the gamma path: palette tokens are written to the swapchain as-is.
    #[default]
    Auto,
    /// Treat shader outputs as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains for conversion.
    Linear,
}

impl std::fmt::Display for ColorSpaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorSpaceMode::Auto => f.write_str("auto"),
            ColorSpaceMode::Gamma => f.write_str("gamma"),
            ColorSpaceMode::Linear => f.write_str("linear"),
        }
    }
}

/// What the backdrop is able to show after setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackdropMode {
    /// The nebula pipeline runs every frame.
    Animated,
    /// A device exists but the nebula pipeline could not be built; frames are
    /// cleared to the fallback color.
    Flat,
    /// No GPU context could be created. The background layer is filled with
    /// the fallback color from a CPU buffer; a winit window stays open but
    /// undrawn.
    Unavailable,
}

/// Where the backdrop is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presentation {
    /// Full-screen, below every other window and transparent to input. Uses a
    /// Wayland background layer when the compositor offers one, otherwise a
    /// borderless fullscreen window kept at the bottom.
    #[default]
    Background,
    /// A regular decorated window, for previewing.
    Windowed,
}

/// Summary of the adapter wgpu selected, kept for logging and pacing decisions.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    /// llvmpipe, SwiftShader, WARP and friends report themselves as CPU devices.
    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
            || self.name.to_ascii_lowercase().contains("llvmpipe")
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors CLI flags and the config file: window size, the
/// palette fed to the nebula shader, and how frames should be paced.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Windowed size in physical pixels; also the size used when the
    /// compositor leaves the choice to us.
    pub surface_size: (u32, u32),
    /// Explicit size for the background layer; `None` fills the output.
    pub requested_size: Option<(u32, u32)>,
    pub presentation: Presentation,
    pub title: String,
    /// Blend colors uploaded as uniforms every frame.
    pub palette: Palette,
    /// Solid color shown when the nebula pipeline is unavailable.
    pub fallback_color: Vec3,
    /// Continuous animation or a single still frame.
    pub policy: RenderPolicy,
    pub color_space: ColorSpaceMode,
    /// In windowed presentation, keep the window at the bottom and let
    /// pointer input pass through it. The background presentation always does.
    pub click_through: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            requested_size: None,
            presentation: Presentation::default(),
            title: "Nebula".to_string(),
            palette: Palette::default(),
            fallback_color: Vec3::ZERO,
            policy: RenderPolicy::default(),
            color_space: ColorSpaceMode::default(),
            click_through: false,
        }
    }
}
