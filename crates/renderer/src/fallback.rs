//! Degraded presentation when no GPU context can be created.

use anyhow::Result;
use nebula::Vec3;
use tracing::warn;

/// What ended up drawing the backdrop.
pub(crate) enum Presenter<G, C> {
    Gpu(G),
    /// Flat fallback color written from a CPU buffer.
    Cpu(C),
    /// Neither path could be set up; the surface stays unfilled.
    Blank,
}

impl<G, C> Presenter<G, C> {
    pub(crate) fn gpu_mut(&mut self) -> Option<&mut G> {
        match self {
            Presenter::Gpu(gpu) => Some(gpu),
            _ => None,
        }
    }
}

/// Tries the GPU first and only builds the CPU fill when that fails.
pub(crate) fn select_presenter<G, C>(
    gpu: impl FnOnce() -> Result<G>,
    cpu: impl FnOnce() -> Result<C>,
) -> Presenter<G, C> {
    match gpu() {
        Ok(gpu) => Presenter::Gpu(gpu),
        Err(gpu_err) => {
            warn!(error = %format!("{gpu_err:#}"), "GPU unavailable; filling the backdrop with the fallback color");
            match cpu() {
                Ok(cpu) => Presenter::Cpu(cpu),
                Err(cpu_err) => {
                    warn!(error = %format!("{cpu_err:#}"), "CPU fill unavailable; backdrop stays blank");
                    Presenter::Blank
                }
            }
        }
    }
}

/// Packs a 0..1 color as a little-endian `XRGB8888` pixel.
pub(crate) fn pack_xrgb8888(color: Vec3) -> u32 {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u32;
    (channel(color.x) << 16) | (channel(color.y) << 8) | channel(color.z)
}

/// Writes `pixel` over every 4-byte texel of `canvas`.
pub(crate) fn fill_xrgb8888(canvas: &mut [u8], pixel: u32) {
    let bytes = pixel.to_le_bytes();
    for texel in canvas.chunks_exact_mut(4) {
        texel.copy_from_slice(&bytes);
    }
}
