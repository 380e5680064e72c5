use bytemuck::{Pod, Zeroable};
use nebula::{FrameUniforms, Palette, Resolution, Vec3};

/// std140 mirror of the `NebulaParams` block in the fragment shader.
///
/// vec3 colors are widened to vec4 so the block has no implicit padding and
/// the Rust layout matches std140 byte for byte.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct NebulaUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub padding: f32,
    pub color_a: [f32; 4],
    pub color_b: [f32; 4],
    pub color_c: [f32; 4],
}

impl NebulaUniforms {
    pub fn new(palette: &Palette) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.set_palette(palette);
        uniforms
    }

    #[cfg(test)]
    pub fn from_frame(frame: &FrameUniforms) -> Self {
        let mut uniforms = Self::new(&frame.palette);
        uniforms.apply_frame(frame);
        uniforms
    }

    /// Copies the per-frame values. Returns true when anything changed.
    pub fn apply_frame(&mut self, frame: &FrameUniforms) -> bool {
        let before = *self;
        self.set_time(frame.elapsed_time);
        self.set_resolution(frame.resolution);
        self.set_palette(&frame.palette);
        before != *self
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.time = seconds;
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = [resolution.width as f32, resolution.height as f32];
    }

    pub fn set_palette(&mut self, palette: &Palette) {
        self.color_a = widen(palette.color_a);
        self.color_b = widen(palette.color_b);
        self.color_c = widen(palette.color_c);
    }
}

fn widen(color: Vec3) -> [f32; 4] {
    color.extend(1.0).to_array()
}
