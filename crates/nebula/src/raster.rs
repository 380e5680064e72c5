//! CPU rasterization of whole frames, used for still exports and tests.

use std::num::NonZeroUsize;
use std::thread;

use glam::{Vec2, Vec3};

use crate::frame::{FrameUniforms, Resolution};

/// A shaded frame stored row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    resolution: Resolution,
    pixels: Vec<Vec3>,
}

impl Frame {
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn pixels(&self) -> &[Vec3] {
        &self.pixels
    }

    /// Pixel at column `x`, row `y` counted from the top.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec3> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        let index = y as usize * self.resolution.width as usize + x as usize;
        self.pixels.get(index).copied()
    }

    /// Quantizes to packed 8-bit RGB, ready for an image encoder.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|color| {
                color
                    .to_array()
                    .map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8)
            })
            .collect()
    }
}

/// Shades every pixel centre of the viewport described by `uniforms`.
///
/// Returns `None` when the viewport has no area. Rows are split across the
/// available cores; pixels are independent so no coordination is needed.
pub fn render(uniforms: &FrameUniforms) -> Option<Frame> {
    let resolution = uniforms.resolution;
    if !resolution.is_drawable() {
        return None;
    }

    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let mut pixels = vec![Vec3::ZERO; width * height];

    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(height);
    let rows_per_worker = height.div_ceil(workers);

    tracing::debug!(
        width = resolution.width,
        height = resolution.height,
        workers,
        "rasterizing frame"
    );
    thread::scope(|scope| {
        for (band, chunk) in pixels.chunks_mut(rows_per_worker * width).enumerate() {
            let first_row = band * rows_per_worker;
            scope.spawn(move || shade_rows(uniforms, first_row, width, chunk));
        }
    });

    Some(Frame { resolution, pixels })
}

fn shade_rows(uniforms: &FrameUniforms, first_row: usize, width: usize, out: &mut [Vec3]) {
    let height = uniforms.resolution.height as f32;
    for (offset, row) in out.chunks_mut(width).enumerate() {
        // Storage is top-down; fragment coordinates grow upward.
        let frag_y = height - (first_row + offset) as f32 - 0.5;
        for (x, slot) in row.iter_mut().enumerate() {
            let frag = Vec2::new(x as f32 + 0.5, frag_y);
            if let Some(color) = uniforms.shade_pixel(frag) {
                *slot = color;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::shade;
    use crate::frame::screen_sample;
    use crate::palette::Palette;

    fn uniforms(width: u32, height: u32, time: f32) -> FrameUniforms {
        FrameUniforms::new(time, Resolution::new(width, height), Palette::default())
    }

    #[test]
    fn renders_every_pixel() {
        let frame = render(&uniforms(37, 23, 1.5)).expect("drawable frame");
        assert_eq!(frame.pixels().len(), 37 * 23);
        assert_eq!(frame.to_rgb8().len(), 37 * 23 * 3);
        assert!(frame.pixel(37, 0).is_none());
        assert!(frame.pixel(0, 23).is_none());
    }

    #[test]
    fn top_row_is_upper_edge_of_view() {
        let u = uniforms(16, 9, 4.0);
        let frame = render(&u).unwrap();
        let expected_p = screen_sample(Vec2::new(3.5, 8.5), u.resolution).unwrap();
        let expected = shade(expected_p, u.elapsed_time, &u.palette);
        assert_eq!(frame.pixel(3, 0), Some(expected));
    }

    #[test]
    fn centre_is_lit() {
        let frame = render(&uniforms(64, 64, 0.0)).unwrap();
        let centre = frame.pixel(32, 32).unwrap();
        assert!(centre.max_element() > 0.0);
    }

    #[test]
    fn zero_area_viewport_is_skipped() {
        assert!(render(&uniforms(0, 10, 0.0)).is_none());
        assert!(render(&uniforms(10, 0, 0.0)).is_none());
    }
}
