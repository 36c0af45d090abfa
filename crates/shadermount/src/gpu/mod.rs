//! wgpu rendition of the mount's graphics context.
//!
//! - `context` owns instance/adapter/device/surface wiring and applies the
//!   caller's [`ContextOptions`](crate::ContextOptions).
//! - `layout` packs declared uniforms into a single std140 block and
//!   generates the GLSL that exposes it under the original names.
//! - `backend` implements [`GraphicsBackend`](crate::GraphicsBackend) on top
//!   of both.

mod backend;
mod context;
mod layout;

pub use backend::{WgpuBackend, WgpuUniform};
pub use layout::{UniformBlockLayout, UniformSlot};
