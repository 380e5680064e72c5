//! Procedural nebula field shared by the GPU backdrop and the still exporter.
//!
//! Everything here is a pure function of `(screen sample, elapsed time,
//! palette)`. The renderer crate carries a GLSL rendition of the same field;
//! this crate is the reference it is tested against and the path used when
//! frames are produced on the CPU.
//!
//! ```text
//!   pixel ──▶ frame::screen_sample ──▶ field::shade ──▶ RGB in [0,1]
//!                  ▲                        ▲
//!            Resolution               elapsed time, Palette
//! ```

pub mod field;
pub mod frame;
pub mod palette;
pub mod raster;

pub use field::{fbm, hash2, shade, simplex_noise};
pub use frame::{screen_sample, FrameUniforms, Resolution};
pub use palette::{parse_hex, srgb_to_linear, Palette, PaletteError};
pub use raster::Frame;

pub use glam::{Vec2, Vec3};
