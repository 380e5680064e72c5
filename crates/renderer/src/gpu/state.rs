use std::time::{Duration, Instant};

use anyhow::Result;
use nebula::{FrameUniforms, Palette, Vec3};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::compile::QUAD_VERTEX_COUNT;
use crate::types::{AdapterProfile, BackdropMode, ColorSpaceMode};

use super::context::GpuContext;
use super::pipeline::{create_uniform_layout, NebulaPipeline};
use super::uniforms::NebulaUniforms;

/// Everything needed to draw the backdrop into one window.
///
/// When the nebula pipeline cannot be built the state still owns a working
/// device and surface and clears each frame to the fallback color.
pub(crate) struct GpuState {
    context: GpuContext,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: NebulaUniforms,
    uniforms_dirty: bool,
    pipeline: Option<NebulaPipeline>,
    clear_color: wgpu::Color,
    frame_count: u64,
    last_fps_update: Instant,
    frames_since_last_update: u32,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        palette: &Palette,
        fallback_color: Vec3,
        color_space: ColorSpaceMode,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, color_space)?;
        let uniform_layout = create_uniform_layout(&context.device);

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nebula uniform buffer"),
            size: std::mem::size_of::<NebulaUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("nebula uniform bind group"),
                layout: &uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let pipeline =
            match NebulaPipeline::new(&context.device, &uniform_layout, context.surface_format) {
                Ok(pipeline) => Some(pipeline),
                Err(err) => {
                    warn!(error = %err, "nebula shader unavailable; drawing flat fallback color");
                    None
                }
            };

        Ok(Self {
            context,
            uniform_buffer,
            uniform_bind_group,
            uniforms: NebulaUniforms::new(palette),
            uniforms_dirty: true,
            pipeline,
            clear_color: clear_color(fallback_color),
            frame_count: 0,
            last_fps_update: Instant::now(),
            frames_since_last_update: 0,
        })
    }

    pub(crate) fn mode(&self) -> BackdropMode {
        if self.pipeline.is_some() {
            BackdropMode::Animated
        } else {
            BackdropMode::Flat
        }
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    /// Resizes the swapchain; the applied size may be clamped, see [`Self::size`].
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.context.resize(new_size) {
            let size = self.context.size;
            self.uniforms
                .set_resolution(nebula::Resolution::new(size.width, size.height));
            self.uniforms_dirty = true;
        }
    }

    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Uploads `frame` and draws one frame to the surface.
    pub(crate) fn render(&mut self, frame: &FrameUniforms) -> Result<(), wgpu::SurfaceError> {
        let surface_texture = self.context.surface.get_current_texture()?;
        self.track_frame_rate();

        if self.uniforms.apply_frame(frame) || self.uniforms_dirty {
            self.context.queue.write_buffer(
                &self.uniform_buffer,
                0,
                bytemuck::bytes_of(&self.uniforms),
            );
            self.uniforms_dirty = false;
        }

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("nebula encoder"),
                });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("nebula pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(pipeline) = self.pipeline.as_ref() {
                render_pass.set_pipeline(&pipeline.pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
            }
        }

        self.context.queue.submit(Some(encoder.finish()));
        surface_texture.present();
        self.frame_count = self.frame_count.saturating_add(1);
        Ok(())
    }

    fn track_frame_rate(&mut self) {
        let now = Instant::now();
        self.frames_since_last_update += 1;
        let elapsed = now.saturating_duration_since(self.last_fps_update);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_since_last_update as f32 / elapsed.as_secs_f32();
            self.frames_since_last_update = 0;
            self.last_fps_update = now;
            debug!(
                fps = fps.round(),
                frame_count = self.frame_count,
                time = self.uniforms.time,
                mode = ?self.mode(),
                "render stats"
            );
        }
    }
}

fn clear_color(color: Vec3) -> wgpu::Color {
    let color = color.clamp(Vec3::ZERO, Vec3::ONE).as_dvec3();
    wgpu::Color {
        r: color.x,
        g: color.y,
        b: color.z,
        a: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_color_is_clamped_and_opaque() {
        let color = clear_color(Vec3::new(1.5, 0.25, -0.1));
        assert_eq!(color.r, 1.0);
        assert_eq!(color.g, 0.25);
        assert_eq!(color.b, 0.0);
        assert_eq!(color.a, 1.0);
    }
}
