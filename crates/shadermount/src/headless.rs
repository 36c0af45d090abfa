//! Recording backend without a GPU.
//!
//! `HeadlessBackend` keeps the same bookkeeping a real context would (program
//! ids, the active program, the backing-store size) and appends every call to
//! a log. The `simulate` command and the test-suite drive mounts through it.

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::backend::{
    GraphicsBackend, MountError, ProgramError, ProgramId, ProgramSource, RenderSurface,
    ShaderStage,
};
use crate::program::{normalize_fragment, NormalizedFragment};
use crate::types::{ContextOptions, LayoutSize, PixelSize};
use crate::uniforms::UniformValue;

/// Backing-store size before the first resize, matching a fresh canvas.
pub const DEFAULT_BACKING: PixelSize = PixelSize::new(300, 150);

#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsCall {
    CompileProgram(ProgramId),
    UseProgram(ProgramId),
    WriteUniform { name: String, value: UniformValue },
    ResizeBacking(PixelSize),
    Viewport(PixelSize),
    Clear,
    Draw { vertices: u32 },
    DeleteProgram(ProgramId),
    UnbindAll,
}

/// Forced program failure, for exercising diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessFailure {
    Compile(ShaderStage),
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessUniform {
    program: ProgramId,
    name: String,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    backing: PixelSize,
    next_program: u32,
    programs: BTreeMap<ProgramId, NormalizedFragment>,
    active: Option<ProgramId>,
    failure: Option<HeadlessFailure>,
    calls: Vec<GraphicsCall>,
}

impl HeadlessBackend {
    pub fn new(backing: PixelSize) -> Self {
        Self {
            backing,
            next_program: 0,
            programs: BTreeMap::new(),
            active: None,
            failure: None,
            calls: Vec::new(),
        }
    }

    pub fn with_failure(mut self, failure: Option<HeadlessFailure>) -> Self {
        self.failure = failure;
        self
    }

    pub fn calls(&self) -> &[GraphicsCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GraphicsCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, GraphicsCall::Draw { .. }))
            .count()
    }

    pub fn resize_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, GraphicsCall::ResizeBacking(_)))
            .count()
    }

    /// Every value written to `name`, oldest first.
    pub fn uniform_writes(&self, name: &str) -> Vec<&UniformValue> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GraphicsCall::WriteUniform {
                    name: written,
                    value,
                } if written == name => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniform_writes(name).pop()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn check_stage(stage: ShaderStage, source: &str) -> Result<(), ProgramError> {
        if source.contains("void main") {
            Ok(())
        } else {
            Err(ProgramError::Compile {
                stage,
                log: "no entry point `main` found".to_string(),
            })
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    type Uniform = HeadlessUniform;

    fn compile_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, ProgramError> {
        match self.failure {
            Some(HeadlessFailure::Compile(stage)) => {
                return Err(ProgramError::Compile {
                    stage,
                    log: "forced compile failure".to_string(),
                })
            }
            Some(HeadlessFailure::Link) => {
                return Err(ProgramError::Link {
                    log: "forced link failure".to_string(),
                })
            }
            None => {}
        }
        Self::check_stage(ShaderStage::Vertex, source.vertex)?;
        Self::check_stage(ShaderStage::Fragment, source.fragment)?;

        self.next_program += 1;
        let id = ProgramId::new(self.next_program);
        self.programs
            .insert(id, normalize_fragment(source.fragment, source.uniforms));
        self.calls.push(GraphicsCall::CompileProgram(id));
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<Self::Uniform> {
        let fragment = self.programs.get(&program)?;
        fragment.references(name).then(|| HeadlessUniform {
            program,
            name: name.to_string(),
        })
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program) {
            self.active = Some(program);
            self.calls.push(GraphicsCall::UseProgram(program));
        }
    }

    fn write_uniform(&mut self, location: &Self::Uniform, value: &UniformValue) {
        if self.active != Some(location.program) {
            tracing::warn!(
                uniform = %location.name,
                "uniform written while its program is not active; ignoring"
            );
            return;
        }
        self.calls.push(GraphicsCall::WriteUniform {
            name: location.name.clone(),
            value: value.clone(),
        });
    }

    fn backing_size(&self) -> PixelSize {
        self.backing
    }

    fn resize_backing(&mut self, size: PixelSize) {
        self.backing = size;
        self.calls.push(GraphicsCall::ResizeBacking(size));
    }

    fn set_viewport(&mut self, size: PixelSize) {
        self.calls.push(GraphicsCall::Viewport(size));
    }

    fn clear(&mut self) {
        self.calls.push(GraphicsCall::Clear);
    }

    fn draw_quad(&mut self, vertex_count: u32) {
        self.calls.push(GraphicsCall::Draw {
            vertices: vertex_count,
        });
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            if self.active == Some(program) {
                self.active = None;
            }
            self.calls.push(GraphicsCall::DeleteProgram(program));
        }
    }

    fn unbind_all(&mut self) {
        self.calls.push(GraphicsCall::UnbindAll);
    }
}

/// In-memory surface whose layout and pixel ratio can be changed between
/// resize notifications.
#[derive(Debug)]
pub struct HeadlessSurface {
    layout: Cell<LayoutSize>,
    pixel_ratio: Cell<f64>,
    supported: bool,
    failure: Option<HeadlessFailure>,
}

impl HeadlessSurface {
    pub fn new(layout: LayoutSize, pixel_ratio: f64) -> Self {
        Self {
            layout: Cell::new(layout),
            pixel_ratio: Cell::new(pixel_ratio),
            supported: true,
            failure: None,
        }
    }

    /// A surface that cannot produce any graphics context.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(LayoutSize::default(), 1.0)
        }
    }

    pub fn with_failure(mut self, failure: HeadlessFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn set_layout(&self, layout: LayoutSize) {
        self.layout.set(layout);
    }

    pub fn set_pixel_ratio(&self, pixel_ratio: f64) {
        self.pixel_ratio.set(pixel_ratio);
    }
}

impl RenderSurface for HeadlessSurface {
    type Backend = HeadlessBackend;

    fn acquire_context(&self, _options: &ContextOptions) -> Result<Self::Backend, MountError> {
        if !self.supported {
            return Err(MountError::UnsupportedContext(
                "headless surface was created without a graphics context".to_string(),
            ));
        }
        Ok(HeadlessBackend::new(DEFAULT_BACKING).with_failure(self.failure))
    }

    fn layout_size(&self) -> LayoutSize {
        self.layout.get()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.pixel_ratio.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::FULLSCREEN_VERTEX_SHADER;
    use crate::uniforms::{UniformDecl, UniformKind};

    const FRAGMENT: &str = "uniform float u_time;\nvoid main() { float t = u_time; }\n";

    fn compile(backend: &mut HeadlessBackend) -> Result<ProgramId, ProgramError> {
        let decls = [UniformDecl::new("u_time", UniformKind::Scalar)];
        backend.compile_program(&ProgramSource {
            vertex: FULLSCREEN_VERTEX_SHADER,
            fragment: FRAGMENT,
            uniforms: &decls,
        })
    }

    #[test]
    fn writes_require_active_program() {
        let mut backend = HeadlessBackend::new(DEFAULT_BACKING);
        let program = compile(&mut backend).unwrap();
        let location = backend.uniform_location(program, "u_time").unwrap();
        backend.write_uniform(&location, &UniformValue::Scalar(1.0));
        assert!(backend.uniform_writes("u_time").is_empty());
        backend.use_program(program);
        backend.write_uniform(&location, &UniformValue::Scalar(2.0));
        assert_eq!(backend.last_uniform("u_time"), Some(&UniformValue::Scalar(2.0)));
    }

    #[test]
    fn forced_failures_surface_as_program_errors() {
        let mut backend =
            HeadlessBackend::new(DEFAULT_BACKING).with_failure(Some(HeadlessFailure::Link));
        assert!(matches!(compile(&mut backend), Err(ProgramError::Link { .. })));
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn missing_entry_point_fails_fragment_stage() {
        let mut backend = HeadlessBackend::new(DEFAULT_BACKING);
        let result = backend.compile_program(&ProgramSource {
            vertex: FULLSCREEN_VERTEX_SHADER,
            fragment: "out vec4 color;",
            uniforms: &[],
        });
        assert!(matches!(
            result,
            Err(ProgramError::Compile {
                stage: ShaderStage::Fragment,
                ..
            })
        ));
    }

    #[test]
    fn unsupported_surface_refuses_context() {
        let surface = HeadlessSurface::unsupported();
        assert!(surface.acquire_context(&ContextOptions::default()).is_err());
    }
}
