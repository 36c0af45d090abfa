use std::fmt;

use crate::types::{ContextOptions, LayoutSize, PixelSize};
use crate::uniforms::{UniformDecl, UniformValue};

/// Handle to a program owned by a [`GraphicsBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u32);

impl ProgramId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgramError {
    #[error("failed to compile {stage} shader: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("failed to link shader program: {log}")]
    Link { log: String },
}

/// Errors that make rendering impossible. Raised once, at construction.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("no compatible graphics context: {0}")]
    UnsupportedContext(String),
}

/// Sources and uniform declarations for one program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub uniforms: &'a [UniformDecl],
}

/// Immediate-mode graphics context in the style of a GL binding: programs
/// are referenced by id, uniform writes go to the program last passed to
/// [`use_program`](GraphicsBackend::use_program).
pub trait GraphicsBackend {
    type Uniform: Clone + fmt::Debug;

    /// Compiles both stages and links them. The full-screen quad is bound to
    /// attribute slot 0 as part of program setup.
    fn compile_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, ProgramError>;
    /// `None` when the uniform does not exist or was optimized out.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<Self::Uniform>;
    fn use_program(&mut self, program: ProgramId);
    fn write_uniform(&mut self, location: &Self::Uniform, value: &UniformValue);
    fn backing_size(&self) -> PixelSize;
    fn resize_backing(&mut self, size: PixelSize);
    fn set_viewport(&mut self, size: PixelSize);
    fn clear(&mut self);
    fn draw_quad(&mut self, vertex_count: u32);
    fn delete_program(&mut self, program: ProgramId);
    /// Drops every buffer, framebuffer and renderbuffer binding.
    fn unbind_all(&mut self);
}

/// Drawing target owned by the embedding layer.
pub trait RenderSurface {
    type Backend: GraphicsBackend;

    fn acquire_context(&self, options: &ContextOptions) -> Result<Self::Backend, MountError>;
    fn layout_size(&self) -> LayoutSize;
    fn device_pixel_ratio(&self) -> f64;
}

impl<T: RenderSurface + ?Sized> RenderSurface for &T {
    type Backend = T::Backend;

    fn acquire_context(&self, options: &ContextOptions) -> Result<Self::Backend, MountError> {
        (**self).acquire_context(options)
    }

    fn layout_size(&self) -> LayoutSize {
        (**self).layout_size()
    }

    fn device_pixel_ratio(&self) -> f64 {
        (**self).device_pixel_ratio()
    }
}
