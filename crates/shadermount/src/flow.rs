//! Chromatic wave animation with a fixed shader.
//!
//! Unlike [`ShaderMount`](crate::ShaderMount), the flow does not measure
//! wall-clock time: every delivered frame adds `speed` to its time value, so
//! the animation runs at the host's frame rate.

use crate::backend::{GraphicsBackend, MountError, ProgramId, ProgramSource, RenderSurface};
use crate::program::{FULLSCREEN_VERTEX_SHADER, QUAD_VERTEX_COUNT};
use crate::scheduler::{FrameHost, FrameScheduler, FrameToken};
use crate::types::ContextOptions;
use crate::uniforms::{UniformDecl, UniformKind, UniformTable, UniformValue};

const RESOLUTION: &str = "resolution";
const TIME: &str = "time";
const X_SCALE: &str = "xScale";
const Y_SCALE: &str = "yScale";
const DISTORTION: &str = "distortion";

pub const FLOW_FRAGMENT_SHADER: &str = r"#version 300 es
precision highp float;
uniform vec2 resolution;
uniform float time;
uniform float xScale;
uniform float yScale;
uniform float distortion;
out vec4 fragColor;

void main() {
    vec2 p = (gl_FragCoord.xy * 2.0 - resolution) / min(resolution.x, resolution.y);

    float d = length(p) * distortion;

    float rx = p.x * (1.0 + d);
    float gx = p.x;
    float bx = p.x * (1.0 - d);

    float r = 0.05 / abs(p.y + sin((rx + time) * xScale) * yScale);
    float g = 0.05 / abs(p.y + sin((gx + time) * xScale) * yScale);
    float b = 0.05 / abs(p.y + sin((bx + time) * xScale) * yScale);

    fragColor = vec4(r, g, b, 1.0);
}
";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowParams {
    pub x_scale: f32,
    pub y_scale: f32,
    pub distortion: f32,
    /// Time added per frame.
    pub speed: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            x_scale: 1.0,
            y_scale: 0.5,
            distortion: 0.05,
            speed: 0.01,
        }
    }
}

fn flow_declarations() -> [UniformDecl; 5] {
    [
        UniformDecl::new(RESOLUTION, UniformKind::Vec2),
        UniformDecl::new(TIME, UniformKind::Scalar),
        UniformDecl::new(X_SCALE, UniformKind::Scalar),
        UniformDecl::new(Y_SCALE, UniformKind::Scalar),
        UniformDecl::new(DISTORTION, UniformKind::Scalar),
    ]
}

type Handle<S> = <<S as RenderSurface>::Backend as GraphicsBackend>::Uniform;

pub struct ShaderFlow<S, H>
where
    S: RenderSurface,
    H: FrameHost,
{
    backend: S::Backend,
    surface: S,
    host: H,
    program: Option<ProgramId>,
    table: UniformTable<Handle<S>>,
    params: FlowParams,
    time: f32,
    scheduler: FrameScheduler,
    disposed: bool,
}

impl<S, H> ShaderFlow<S, H>
where
    S: RenderSurface,
    H: FrameHost,
{
    pub fn new(surface: S, host: H, params: FlowParams) -> Result<Self, MountError> {
        let options = ContextOptions {
            alpha: true,
            antialias: false,
            ..ContextOptions::default()
        };
        let mut backend = surface.acquire_context(&options)?;
        let decls = flow_declarations();
        let program = match backend.compile_program(&ProgramSource {
            vertex: FULLSCREEN_VERTEX_SHADER,
            fragment: FLOW_FRAGMENT_SHADER,
            uniforms: &decls,
        }) {
            Ok(program) => Some(program),
            Err(err) => {
                tracing::error!(error = %err, "flow shader unavailable");
                None
            }
        };
        let table = match program {
            Some(program) => UniformTable::resolve(
                decls.iter().map(|decl| decl.name.as_str()),
                |name| backend.uniform_location(program, name),
            ),
            None => UniformTable::default(),
        };

        let mut flow = Self {
            backend,
            surface,
            host,
            program,
            table,
            params,
            time: 0.0,
            scheduler: FrameScheduler::new(),
            disposed: false,
        };
        flow.handle_resize();
        flow.animate();
        Ok(flow)
    }

    fn is_live(&self) -> bool {
        !self.disposed && self.program.is_some()
    }

    /// Takes effect on the next frame.
    pub fn set_params(&mut self, params: FlowParams) {
        if self.disposed {
            return;
        }
        self.params = params;
    }

    pub fn on_frame(&mut self, token: FrameToken) {
        if !self.is_live() || !self.scheduler.accept(token) {
            return;
        }
        self.animate();
    }

    /// Sizes the backing store to the surface and updates `resolution`.
    /// Does not redraw; the next frame picks the new size up.
    pub fn handle_resize(&mut self) {
        let Some(program) = self.program.filter(|_| !self.disposed) else {
            return;
        };
        let size = self
            .surface
            .layout_size()
            .to_pixels(self.surface.device_pixel_ratio());
        self.backend.resize_backing(size);
        self.backend.set_viewport(size);
        self.backend.use_program(program);
        let resolution = UniformValue::Vec2([size.width as f32, size.height as f32]);
        if let Some(location) = self.table.get(RESOLUTION) {
            self.backend.write_uniform(location, &resolution);
        }
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.scheduler.cancel(&mut self.host);
        if let Some(program) = self.program.take() {
            self.backend.delete_program(program);
        }
        self.table.clear();
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn params(&self) -> FlowParams {
        self.params
    }

    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.scheduler.pending()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn backend(&self) -> &S::Backend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S::Backend {
        &mut self.backend
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn animate(&mut self) {
        let Some(program) = self.program.filter(|_| !self.disposed) else {
            return;
        };
        self.time += self.params.speed;

        self.backend.clear();
        self.backend.use_program(program);
        let values = [
            (TIME, self.time),
            (X_SCALE, self.params.x_scale),
            (Y_SCALE, self.params.y_scale),
            (DISTORTION, self.params.distortion),
        ];
        for (name, value) in values {
            if let Some(location) = self.table.get(name) {
                self.backend
                    .write_uniform(location, &UniformValue::Scalar(value));
            }
        }
        self.backend.draw_quad(QUAD_VERTEX_COUNT);
        self.scheduler.schedule(&mut self.host);
    }
}

impl<S, H> Drop for ShaderFlow<S, H>
where
    S: RenderSurface,
    H: FrameHost,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
