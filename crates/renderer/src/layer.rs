//! Wayland background layer presentation.
//!
//! The backdrop is a `zwlr_layer_shell_v1` surface on [`Layer::Background`],
//! anchored to every edge with an empty input region so pointer and keyboard
//! input reach whatever sits above it. Frames are paced by compositor frame
//! callbacks filtered through the render policy.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::result::Result as StdResult;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use nebula::{FrameUniforms, Palette, Resolution, Vec3};
use smithay_client_toolkit::reexports::client::{
    globals::registry_queue_init,
    protocol::{wl_output, wl_shm, wl_surface},
    Connection, EventQueue, Proxy, QueueHandle,
};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState, Region},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputInfo, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::wlr_layer::{
        Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
        LayerSurfaceConfigure,
    },
    shell::WaylandSurface,
    shm::{slot::SlotPool, Shm, ShmHandler},
};
use tracing::{debug, error, info, trace, warn};
use winit::dpi::PhysicalSize;

use crate::fallback::{fill_xrgb8888, pack_xrgb8888, select_presenter, Presenter};
use crate::gpu::GpuState;
use crate::runtime::{effective_policy, RenderPolicy, RenderPolicyDriver};
use crate::types::{BackdropMode, ColorSpaceMode, RendererConfig};

const LAYER_NAMESPACE: &str = "nebula";

/// A bound layer-shell session, ready to run.
pub(crate) struct LayerSession {
    event_queue: EventQueue<BackdropLayer>,
    state: BackdropLayer,
}

/// Connects to the compositor and creates the background layer surface.
///
/// Errors here mean this presentation is not available on the current
/// session (no Wayland display or no layer shell); callers fall back to a
/// regular window.
pub(crate) fn connect(config: &RendererConfig) -> Result<LayerSession> {
    let conn = Connection::connect_to_env().context("failed to connect to Wayland compositor")?;
    let (globals, event_queue) =
        registry_queue_init(&conn).context("failed to initialize Wayland registry queue")?;
    let qh = event_queue.handle();

    let compositor =
        CompositorState::bind(&globals, &qh).context("wl_compositor is not available")?;
    let layer_shell =
        LayerShell::bind(&globals, &qh).context("layer shell protocol is not available")?;
    let shm = Shm::bind(&globals, &qh).context("wl_shm is not available")?;

    let registry_state = RegistryState::new(&globals);
    let output_state = OutputState::new(&globals, &qh);
    let target_output = output_state.outputs().next();
    let last_output_size = target_output
        .as_ref()
        .and_then(|output| output_state.info(output))
        .and_then(output_info_physical_size);

    let surface = compositor.create_surface(&qh);
    let layer_surface = layer_shell.create_layer_surface(
        &qh,
        surface,
        Layer::Background,
        Some(LAYER_NAMESPACE.to_string()),
        target_output.as_ref(),
    );
    layer_surface.set_anchor(Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT);
    layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);
    layer_surface.set_exclusive_zone(-1);
    if let Some((width, height)) = config.requested_size {
        layer_surface.set_size(width, height);
    }
    let input_region = Region::new(&compositor).context("failed to create input region")?;
    layer_surface
        .wl_surface()
        .set_input_region(Some(input_region.wl_region()));
    layer_surface.commit();

    let state = BackdropLayer {
        presenter: None,
        conn,
        registry_state,
        output_state,
        compositor,
        shm,
        layer_surface,
        _input_region: input_region,
        driver: None,
        policy: config.policy.clone(),
        palette: config.palette,
        fallback_color: config.fallback_color,
        color_space: config.color_space,
        sizing: SurfaceSizing {
            requested: config.requested_size,
            fallback: PhysicalSize::new(config.surface_size.0, config.surface_size.1),
        },
        size: None,
        target_output,
        last_output_size,
        frame_scheduled: false,
        should_exit: false,
    };

    Ok(LayerSession { event_queue, state })
}

impl LayerSession {
    /// Dispatches Wayland events until the compositor closes the layer.
    pub(crate) fn run(mut self) -> Result<()> {
        info!("background layer created; waiting for configure");
        while !self.state.should_exit {
            self.event_queue
                .blocking_dispatch(&mut self.state)
                .context("error while processing Wayland events")?;
        }
        info!("background layer closed; releasing resources");
        Ok(())
    }
}

/// Solid fallback color written into a shared-memory buffer.
struct ShmFill {
    pool: SlotPool,
    pixel: u32,
}

impl ShmFill {
    fn new(shm: &Shm, color: Vec3, size: PhysicalSize<u32>) -> Result<Self> {
        let pool = SlotPool::new(buffer_len(size), shm)
            .map_err(|err| anyhow!("failed to create shm pool: {err}"))?;
        Ok(Self {
            pool,
            pixel: pack_xrgb8888(color),
        })
    }

    fn draw(&mut self, surface: &wl_surface::WlSurface, size: PhysicalSize<u32>) -> Result<()> {
        let width = i32::try_from(size.width).context("surface width out of range")?;
        let height = i32::try_from(size.height).context("surface height out of range")?;
        let (buffer, canvas) = self
            .pool
            .create_buffer(width, height, width * 4, wl_shm::Format::Xrgb8888)
            .map_err(|err| anyhow!("failed to allocate shm buffer: {err}"))?;
        fill_xrgb8888(canvas, self.pixel);
        buffer
            .attach_to(surface)
            .map_err(|err| anyhow!("failed to attach shm buffer: {err}"))?;
        surface.damage_buffer(0, 0, width, height);
        surface.commit();
        Ok(())
    }
}

fn buffer_len(size: PhysicalSize<u32>) -> usize {
    size.width as usize * size.height as usize * 4
}

/// How a configure event's size is turned into a surface size.
#[derive(Debug, Clone, Copy)]
struct SurfaceSizing {
    requested: Option<(u32, u32)>,
    fallback: PhysicalSize<u32>,
}

impl SurfaceSizing {
    /// A zero configure dimension means "pick your own"; use the output size,
    /// then shrink to any explicitly requested size.
    fn resolve(
        &self,
        configured: (u32, u32),
        output_size: Option<PhysicalSize<u32>>,
    ) -> PhysicalSize<u32> {
        let mut size = if configured.0 == 0 || configured.1 == 0 {
            output_size.unwrap_or(self.fallback)
        } else {
            PhysicalSize::new(configured.0, configured.1)
        };

        if let Some((width, height)) = self.requested {
            size.width = size.width.min(width.max(1));
            size.height = size.height.min(height.max(1));
        }

        if size.width == 0 || size.height == 0 {
            self.fallback
        } else {
            size
        }
    }
}

struct BackdropLayer {
    /// Declared first so the GPU surface is released before the layer surface.
    presenter: Option<Presenter<GpuState, ShmFill>>,
    conn: Connection,
    registry_state: RegistryState,
    output_state: OutputState,
    compositor: CompositorState,
    shm: Shm,
    layer_surface: LayerSurface,
    _input_region: Region,
    driver: Option<RenderPolicyDriver>,
    policy: RenderPolicy,
    palette: Palette,
    fallback_color: Vec3,
    color_space: ColorSpaceMode,
    sizing: SurfaceSizing,
    size: Option<PhysicalSize<u32>>,
    target_output: Option<wl_output::WlOutput>,
    last_output_size: Option<PhysicalSize<u32>>,
    frame_scheduled: bool,
    should_exit: bool,
}

impl BackdropLayer {
    fn output_size(&self) -> Option<PhysicalSize<u32>> {
        self.target_output
            .as_ref()
            .and_then(|output| self.output_state.info(output))
            .and_then(output_info_physical_size)
            .or(self.last_output_size)
    }

    fn build_presenter(&mut self, size: PhysicalSize<u32>) {
        let handle = WaylandSurfaceHandle::new(&self.conn, &self.layer_surface);
        let (palette, fallback_color, color_space) =
            (self.palette, self.fallback_color, self.color_space);
        let shm = &self.shm;
        let presenter = select_presenter(
            || GpuState::new(&handle, size, &palette, fallback_color, color_space),
            || ShmFill::new(shm, fallback_color, size),
        );

        let mode = match &presenter {
            Presenter::Gpu(gpu) => gpu.mode(),
            _ => BackdropMode::Unavailable,
        };
        if let Presenter::Gpu(gpu) = &presenter {
            let (policy, software_cap) =
                effective_policy(&self.policy, gpu.adapter_profile().is_software());
            if let Some(cap) = software_cap {
                warn!(
                    cap,
                    "software rasterizer detected; capping backdrop to {} FPS (override with --fps)",
                    cap
                );
            }
            info!(mode = ?mode, policy = ?policy, "backdrop ready");
            self.driver = Some(RenderPolicyDriver::new(policy));
        } else {
            info!(mode = ?mode, "backdrop ready");
        }
        self.presenter = Some(presenter);
    }

    /// Draws one frame if the policy allows it, then keeps callbacks coming
    /// while the policy still has frames to produce.
    fn present(&mut self, qh: &QueueHandle<Self>) {
        let Some(size) = self.size else {
            return;
        };
        let mut surface_error = None;
        match self.presenter.as_mut() {
            Some(Presenter::Gpu(gpu)) => {
                let Some(driver) = self.driver.as_mut() else {
                    return;
                };
                if driver.ready_for_frame(Instant::now()) {
                    let frame = FrameUniforms::new(
                        driver.sample(),
                        Resolution::new(gpu.size().width, gpu.size().height),
                        self.palette,
                    );
                    match gpu.render(&frame) {
                        Ok(()) => driver.mark_rendered(),
                        Err(err) => surface_error = Some(err),
                    }
                } else {
                    trace!("frame callback skipped by render policy");
                }
            }
            Some(Presenter::Cpu(fill)) => {
                if let Err(err) = fill.draw(self.layer_surface.wl_surface(), size) {
                    warn!(error = %format!("{err:#}"), "failed to draw fallback fill");
                }
                return;
            }
            Some(Presenter::Blank) | None => return,
        }

        if let Some(err) = surface_error {
            self.handle_surface_error(err);
        }
        self.schedule_frame(qh);
    }

    fn schedule_frame(&mut self, qh: &QueueHandle<Self>) {
        let idle = self.driver.as_ref().map_or(true, RenderPolicyDriver::is_idle);
        if self.frame_scheduled || idle {
            return;
        }
        let surface = self.layer_surface.wl_surface();
        surface.frame(qh, surface.clone());
        self.frame_scheduled = true;
        self.layer_surface.commit();
    }

    fn handle_surface_error(&mut self, err: wgpu::SurfaceError) {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                if let Some(gpu) = self.presenter.as_mut().and_then(Presenter::gpu_mut) {
                    gpu.reconfigure();
                }
            }
            wgpu::SurfaceError::OutOfMemory => {
                error!("surface out of memory; closing backdrop");
                self.should_exit = true;
            }
            wgpu::SurfaceError::Timeout => {
                debug!("surface timeout; retrying next frame");
            }
            other => {
                warn!(error = ?other, "surface error; retrying next frame");
            }
        }
    }

    fn refresh_output_size(&mut self, output: &wl_output::WlOutput) {
        let Some(info) = self.output_state.info(output) else {
            return;
        };
        let is_target = self.target_output.as_ref() == Some(output);
        if is_target || self.target_output.is_none() {
            self.target_output = Some(output.clone());
            self.last_output_size = output_info_physical_size(info);
        }
    }
}

impl CompositorHandler for BackdropLayer {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        if surface != self.layer_surface.wl_surface() {
            return;
        }
        self.frame_scheduled = false;
        self.present(qh);
    }
}

impl LayerShellHandler for BackdropLayer {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        self.should_exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let size = self.sizing.resolve(configure.new_size, self.output_size());
        debug!(
            configured_width = configure.new_size.0,
            configured_height = configure.new_size.1,
            width = size.width,
            height = size.height,
            "layer configure"
        );
        self.size = Some(size);

        match self.presenter.as_mut() {
            None => self.build_presenter(size),
            Some(Presenter::Gpu(gpu)) => gpu.resize(size),
            Some(_) => {}
        }
        if let Some(driver) = self.driver.as_mut() {
            driver.invalidate();
        }
        self.present(qh);
    }
}

impl OutputHandler for BackdropLayer {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        self.refresh_output_size(&output);
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        self.refresh_output_size(&output);
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        if self.target_output.as_ref() == Some(&output) {
            self.target_output = None;
            self.last_output_size = None;
        }
    }
}

impl ShmHandler for BackdropLayer {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for BackdropLayer {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState];
}

delegate_compositor!(BackdropLayer);
delegate_output!(BackdropLayer);
delegate_shm!(BackdropLayer);
delegate_layer!(BackdropLayer);
delegate_registry!(BackdropLayer);

/// Raw handles for a layer surface, for wgpu surface creation.
struct WaylandSurfaceHandle {
    display: *mut c_void,
    surface: *mut c_void,
}

impl WaylandSurfaceHandle {
    fn new(conn: &Connection, layer_surface: &LayerSurface) -> Self {
        let display = conn.backend().display_ptr() as *mut c_void;
        let surface = layer_surface.wl_surface().id().as_ptr() as *mut c_void;
        Self { display, surface }
    }
}

impl raw_window_handle::HasDisplayHandle for WaylandSurfaceHandle {
    fn display_handle(
        &self,
    ) -> StdResult<raw_window_handle::DisplayHandle<'_>, raw_window_handle::HandleError> {
        let display =
            NonNull::new(self.display).ok_or(raw_window_handle::HandleError::Unavailable)?;
        let raw = raw_window_handle::RawDisplayHandle::Wayland(
            raw_window_handle::WaylandDisplayHandle::new(display),
        );
        // SAFETY: the connection outlives every surface created from it.
        Ok(unsafe { raw_window_handle::DisplayHandle::borrow_raw(raw) })
    }
}

impl raw_window_handle::HasWindowHandle for WaylandSurfaceHandle {
    fn window_handle(
        &self,
    ) -> StdResult<raw_window_handle::WindowHandle<'_>, raw_window_handle::HandleError> {
        let surface =
            NonNull::new(self.surface).ok_or(raw_window_handle::HandleError::Unavailable)?;
        let raw = raw_window_handle::RawWindowHandle::Wayland(
            raw_window_handle::WaylandWindowHandle::new(surface),
        );
        // SAFETY: the layer surface is dropped after the GPU state using it.
        Ok(unsafe { raw_window_handle::WindowHandle::borrow_raw(raw) })
    }
}

fn output_info_physical_size(info: OutputInfo) -> Option<PhysicalSize<u32>> {
    if let Some(mode) = info.modes.iter().find(|mode| mode.current) {
        let width = mode.dimensions.0.max(1) as u32;
        let height = mode.dimensions.1.max(1) as u32;
        return Some(PhysicalSize::new(width, height));
    }

    info.logical_size.map(|(width, height)| {
        let scale = info.scale_factor.max(1) as u32;
        PhysicalSize::new(width.max(1) as u32 * scale, height.max(1) as u32 * scale)
    })
}
