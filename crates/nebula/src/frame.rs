use glam::Vec2;

use crate::palette::Palette;

/// Viewport size in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A viewport with either side at zero has nothing to shade; the frame is skipped.
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn aspect(&self) -> Option<f32> {
        self.is_drawable()
            .then(|| self.width as f32 / self.height as f32)
    }
}

/// Per-frame inputs shared by every pixel of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    /// Seconds since the animation started.
    pub elapsed_time: f32,
    pub resolution: Resolution,
    pub palette: Palette,
}

impl FrameUniforms {
    pub fn new(elapsed_time: f32, resolution: Resolution, palette: Palette) -> Self {
        Self {
            elapsed_time,
            resolution,
            palette,
        }
    }

    /// Shades one pixel; `frag_coord` has a bottom-left origin.
    pub fn shade_pixel(&self, frag_coord: Vec2) -> Option<glam::Vec3> {
        let p = screen_sample(frag_coord, self.resolution)?;
        Some(crate::field::shade(p, self.elapsed_time, &self.palette))
    }
}

/// Maps a pixel coordinate to the camera-centred sample space.
///
/// `p = (frag_coord - 0.5 * resolution) / resolution.y`, so the vertical
/// extent is always `[-0.5, 0.5]` and the horizontal one follows the aspect
/// ratio. Returns `None` for a zero-sized viewport instead of dividing by zero.
pub fn screen_sample(frag_coord: Vec2, resolution: Resolution) -> Option<Vec2> {
    if !resolution.is_drawable() {
        return None;
    }
    let size = resolution.as_vec2();
    Some((frag_coord - 0.5 * size) / size.y)
}
