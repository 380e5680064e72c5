use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::types::{AdapterProfile, ColorSpaceMode};

/// Instance, device, and configured swapchain for one window.
pub(crate) struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
    pub adapter_profile: AdapterProfile,
    pub max_dimension: u32,
    pub _instance: wgpu::Instance,
}

impl GpuContext {
    /// Acquires an adapter and device for `target` and configures its surface.
    ///
    /// The caller must keep `target` alive for as long as the context exists.
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        color_space: ColorSpaceMode,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // SAFETY: the window owning these handles outlives the context; see
        // `WindowState`, which drops the backdrop before the window.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = request_adapter(&instance, &surface)?;

        let adapter_profile = AdapterProfile::from_wgpu(&adapter.get_info());
        tracing::debug!(
            name = %adapter_profile.name,
            backend = ?adapter_profile.backend,
            device_type = ?adapter_profile.device_type,
            is_software = adapter_profile.is_software(),
            "selected GPU adapter"
        );

        let max_dimension = adapter.limits().max_texture_dimension_2d;
        let requested = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        if requested.width > max_dimension || requested.height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {}x{}",
                requested.width,
                requested.height
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        if surface_caps.formats.is_empty() {
            anyhow::bail!("surface reports no supported texture formats");
        }
        let surface_format = pick_surface_format(&surface_caps.formats, color_space);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("nebula device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                .using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(wgpu::PresentMode::AutoVsync);
        tracing::debug!(?present_mode, ?surface_format, "using present mode");

        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = requested;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        surface.configure(&device, &config);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            anyhow::bail!("failed to configure surface: {err}");
        }

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            surface_format,
            adapter_profile,
            max_dimension,
            _instance: instance,
        })
    }

    /// Reconfigures the swapchain. Zero-sized requests are ignored; sizes past
    /// the device texture limit are clamped to it.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        if new_size.width == 0 || new_size.height == 0 {
            return false;
        }
        let new_size = clamp_to_limit(new_size, self.max_dimension);
        if new_size == self.size {
            return false;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        tracing::debug!(
            width = new_size.width,
            height = new_size.height,
            "reconfigured surface"
        );
        true
    }

    /// Re-applies the current configuration after the surface was lost or outdated.
    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Adapter requests in order: real hardware first, then the platform's
/// software fallback adapter (llvmpipe, WARP, SwiftShader).
const ADAPTER_FALLBACK_ORDER: [bool; 2] = [false, true];

fn request_adapter(instance: &wgpu::Instance, surface: &wgpu::Surface<'_>) -> Result<wgpu::Adapter> {
    let mut last_error = None;
    for force_fallback_adapter in ADAPTER_FALLBACK_ORDER {
        match pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(surface),
            force_fallback_adapter,
        })) {
            Ok(adapter) => return Ok(adapter),
            Err(err) => {
                tracing::debug!(force_fallback_adapter, error = %err, "adapter request failed");
                last_error = Some(err);
            }
        }
    }
    match last_error {
        Some(err) => Err(anyhow!("failed to find a suitable GPU adapter: {err}")),
        None => Err(anyhow!("failed to find a suitable GPU adapter")),
    }
}

fn clamp_to_limit(size: PhysicalSize<u32>, max_dimension: u32) -> PhysicalSize<u32> {
    let clamped = PhysicalSize::new(size.width.min(max_dimension), size.height.min(max_dimension));
    if clamped != size {
        tracing::warn!(
            width = size.width,
            height = size.height,
            max_dimension,
            "surface larger than the GPU texture limit; clamping"
        );
    }
    clamped
}

fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
    color_space: ColorSpaceMode,
) -> wgpu::TextureFormat {
    let want_srgb = matches!(color_space, ColorSpaceMode::Linear);
    formats
        .iter()
        .copied()
        .find(|format| format.is_srgb() == want_srgb)
        .unwrap_or_else(|| {
            let fallback = formats[0];
            tracing::warn!(
                ?fallback,
                requested = %color_space,
                "no surface format matches the requested color space; falling back"
            );
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: [wgpu::TextureFormat; 2] = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Bgra8Unorm,
    ];

    #[test]
    fn gamma_prefers_non_srgb_surfaces() {
        assert_eq!(
            pick_surface_format(&FORMATS, ColorSpaceMode::Auto),
            wgpu::TextureFormat::Bgra8Unorm
        );
        assert_eq!(
            pick_surface_format(&FORMATS, ColorSpaceMode::Gamma),
            wgpu::TextureFormat::Bgra8Unorm
        );
    }

    #[test]
    fn linear_prefers_srgb_surfaces() {
        assert_eq!(
            pick_surface_format(&FORMATS, ColorSpaceMode::Linear),
            wgpu::TextureFormat::Bgra8UnormSrgb
        );
    }

    #[test]
    fn oversized_resize_is_clamped_to_texture_limit() {
        assert_eq!(
            clamp_to_limit(PhysicalSize::new(9000, 1200), 8192),
            PhysicalSize::new(8192, 1200)
        );
        assert_eq!(
            clamp_to_limit(PhysicalSize::new(1920, 1080), 8192),
            PhysicalSize::new(1920, 1080)
        );
    }

    #[test]
    fn hardware_adapter_is_tried_before_software_fallback() {
        assert_eq!(ADAPTER_FALLBACK_ORDER, [false, true]);
    }

    #[test]
    fn falls_back_to_first_format() {
        let only_srgb = [wgpu::TextureFormat::Rgba8UnormSrgb];
        assert_eq!(
            pick_surface_format(&only_srgb, ColorSpaceMode::Gamma),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }
}
