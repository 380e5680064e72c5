//! GPU side of the backdrop.
//!
//! - `context` owns the wgpu instance, device and surface and rebuilds the
//!   swapchain when the window resizes.
//! - `pipeline` builds the full-viewport quad pipeline inside a validation
//!   error scope.
//! - `uniforms` mirrors the `NebulaParams` block of the fragment shader.
//! - `state` glues these together behind the `GpuState` API used by `window`.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
