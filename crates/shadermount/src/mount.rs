//! The shader mount: one program on one surface, animated by a frame host.
//!
//! A mount owns its graphics context for its whole life. Construction
//! acquires the context, builds the program, resolves every uniform handle
//! and starts observing the surface size. From then on the embedding layer
//! feeds it three kinds of events: delivered frames ([`ShaderMount::on_frame`]),
//! resize notifications ([`ShaderMount::handle_resize`]) and control calls
//! (`set_uniforms`, `set_speed`, `set_seed`). [`ShaderMount::dispose`] ends
//! all of that; every call afterwards returns without touching the context.

use crate::backend::{GraphicsBackend, MountError, ProgramId, ProgramSource, RenderSurface};
use crate::clock::AnimationClock;
use crate::program::{FULLSCREEN_VERTEX_SHADER, QUAD_VERTEX_COUNT};
use crate::resize::ResizeWatcher;
use crate::scheduler::{FrameHost, FrameScheduler, FrameToken, SchedulerState};
use crate::types::MountConfig;
use crate::uniforms::{
    declarations, UniformInput, UniformMap, UniformTable, UniformValue, U_PIXEL_RATIO,
    U_RESOLUTION, U_TIME,
};

type Handle<S> = <<S as RenderSurface>::Backend as GraphicsBackend>::Uniform;

pub struct ShaderMount<S, H>
where
    S: RenderSurface,
    H: FrameHost,
{
    backend: S::Backend,
    surface: S,
    host: H,
    program: Option<ProgramId>,
    uniforms: UniformMap,
    table: UniformTable<Handle<S>>,
    clock: AnimationClock,
    scheduler: FrameScheduler,
    resize: ResizeWatcher,
    resolution_dirty: bool,
    disposed: bool,
}

impl<S, H> ShaderMount<S, H>
where
    S: RenderSurface,
    H: FrameHost,
{
    /// Fails only when the surface cannot provide a graphics context. A
    /// shader that does not compile is logged and leaves a mount that never
    /// draws.
    pub fn new(surface: S, host: H, config: MountConfig) -> Result<Self, MountError> {
        let mut backend = surface.acquire_context(&config.context)?;

        let decls = declarations(&config.uniforms);
        let vertex = config
            .vertex_shader
            .as_deref()
            .unwrap_or(FULLSCREEN_VERTEX_SHADER);
        let source = ProgramSource {
            vertex,
            fragment: &config.fragment_shader,
            uniforms: &decls,
        };
        let program = match backend.compile_program(&source) {
            Ok(program) => {
                tracing::debug!(program = program.id(), uniforms = decls.len(), "program ready");
                Some(program)
            }
            Err(err) => {
                tracing::error!(error = %err, "shader program unavailable; mount will not render");
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

        let now = host.now();
        let mut mount = Self {
            backend,
            surface,
            host,
            program,
            uniforms: config.uniforms,
            table,
            clock: AnimationClock::new(0.0, config.seed, now),
            scheduler: FrameScheduler::new(),
            resize: ResizeWatcher::new(),
            resolution_dirty: true,
            disposed: false,
        };

        mount.push_uniforms();
        mount.resize.observe();
        mount.handle_resize();
        mount.set_speed(config.speed);
        Ok(mount)
    }

    fn is_live(&self) -> bool {
        !self.disposed && self.program.is_some()
    }

    /// Merges `uniforms` into the current map, re-pushes the whole merged map
    /// and renders immediately. Names the program was not built with are
    /// ignored.
    pub fn set_uniforms(&mut self, uniforms: UniformMap) {
        if !self.is_live() {
            return;
        }
        self.uniforms.merge(uniforms);
        self.push_uniforms();
        let now = self.host.now();
        self.render(now);
    }

    /// Untyped variant of [`set_uniforms`](Self::set_uniforms). Values whose
    /// shape no uniform can take are logged and dropped; the render still
    /// happens.
    pub fn set_uniform_inputs<I, K>(&mut self, inputs: I)
    where
        I: IntoIterator<Item = (K, UniformInput)>,
        K: Into<String>,
    {
        if !self.is_live() {
            return;
        }
        self.set_uniforms(UniformMap::from_inputs(inputs));
    }

    /// Zero pauses the loop; any positive speed resumes it from the current
    /// accumulator without counting the paused time.
    pub fn set_speed(&mut self, speed: f64) {
        if !self.is_live() {
            return;
        }
        if !speed.is_finite() || speed < 0.0 {
            tracing::warn!(speed, "ignoring invalid animation speed");
            return;
        }
        self.clock.set_speed(speed);
        match self.scheduler.state() {
            SchedulerState::Idle if speed != 0.0 => {
                self.clock.rebase(self.host.now());
                self.scheduler.schedule(&mut self.host);
            }
            SchedulerState::Scheduled(_) if speed == 0.0 => {
                self.scheduler.cancel(&mut self.host);
            }
            _ => {}
        }
    }

    /// Jumps the accumulator to `seed` frames at 120 Hz and renders at once.
    pub fn set_seed(&mut self, seed: f64) {
        if !self.is_live() {
            return;
        }
        if !seed.is_finite() {
            tracing::warn!(seed, "ignoring non-finite seed");
            return;
        }
        let now = self.host.now();
        self.clock.seed(seed, now);
        self.render(now);
    }

    /// Entry point for frames delivered by the host. Tokens other than the
    /// pending one belong to cancelled frames and are dropped.
    pub fn on_frame(&mut self, token: FrameToken) {
        if !self.is_live() || !self.scheduler.accept(token) {
            return;
        }
        let now = self.host.now();
        self.render(now);
    }

    /// Re-reads the surface size. Renders once when the backing store had to
    /// change, and does nothing otherwise.
    pub fn handle_resize(&mut self) {
        if !self.is_live() {
            return;
        }
        let Some(size) = self.resize.check(&self.surface, self.backend.backing_size()) else {
            return;
        };
        self.backend.resize_backing(size);
        self.backend.set_viewport(size);
        self.resolution_dirty = true;
        let now = self.host.now();
        self.render(now);
    }

    /// Releases the program and stops all scheduling. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.scheduler.cancel(&mut self.host);
        if let Some(program) = self.program.take() {
            self.backend.delete_program(program);
            self.backend.unbind_all();
        }
        self.resize.disconnect();
        self.table.clear();
        tracing::debug!("shader mount disposed");
    }

    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.scheduler.pending()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    pub fn uniforms(&self) -> &UniformMap {
        &self.uniforms
    }

    pub fn surface(&self) -> &S {
        &self.surface
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

    fn push_uniforms(&mut self) {
        let Some(program) = self.program else {
            return;
        };
        self.backend.use_program(program);
        for (name, value) in self.uniforms.iter() {
            if !self.table.contains(name) {
                tracing::trace!(uniform = name, "uniform was not declared at construction");
                continue;
            }
            write_uniform(&mut self.backend, &self.table, name, value);
        }
    }

    fn render(&mut self, now: f64) {
        if self.disposed {
            return;
        }
        let Some(program) = self.program else {
            return;
        };

        self.clock.tick(now);
        self.backend.clear();
        self.backend.use_program(program);
        let time = UniformValue::Scalar(self.clock.seconds());
        write_uniform(&mut self.backend, &self.table, U_TIME, &time);

        if self.resolution_dirty {
            let size = self.backend.backing_size();
            let resolution = UniformValue::Vec2([size.width as f32, size.height as f32]);
            let pixel_ratio = UniformValue::Scalar(self.resize.pixel_ratio() as f32);
            write_uniform(&mut self.backend, &self.table, U_RESOLUTION, &resolution);
            write_uniform(&mut self.backend, &self.table, U_PIXEL_RATIO, &pixel_ratio);
            self.resolution_dirty = false;
        }

        self.backend.draw_quad(QUAD_VERTEX_COUNT);

        if self.clock.is_running() {
            self.scheduler.schedule(&mut self.host);
        } else {
            self.scheduler.cancel(&mut self.host);
        }
    }
}

impl<S, H> Drop for ShaderMount<S, H>
where
    S: RenderSurface,
    H: FrameHost,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

fn write_uniform<B: GraphicsBackend>(
    backend: &mut B,
    table: &UniformTable<B::Uniform>,
    name: &str,
    value: &UniformValue,
) {
    if let Some(location) = table.get(name) {
        backend.write_uniform(location, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShaderStage;
    use crate::headless::{GraphicsCall, HeadlessFailure, HeadlessSurface};
    use crate::host::{SimulatedClock, SimulatedHost};
    use crate::types::{LayoutSize, PixelSize};

    const FRAGMENT: &str = r"#version 300 es
precision highp float;
uniform float u_time;
uniform vec2 u_resolution;
uniform float u_pixelRatio;
uniform vec3 tint;
out vec4 fragColor;

void main() {
    vec2 uv = gl_FragCoord.xy / u_resolution;
    fragColor = vec4(tint * sin(u_time) + vec3(uv, 0.0), u_pixelRatio);
}
";

    type TestMount<'a> = ShaderMount<&'a HeadlessSurface, SimulatedHost>;

    fn surface() -> HeadlessSurface {
        HeadlessSurface::new(LayoutSize::new(400.0, 200.0), 2.0)
    }

    fn config(speed: f64) -> MountConfig {
        MountConfig::new(FRAGMENT)
            .with_uniforms(UniformMap::new().with("tint", [1.0f32, 1.0, 1.0]))
            .with_speed(speed)
    }

    fn mount<'a>(surface: &'a HeadlessSurface, clock: &SimulatedClock, speed: f64) -> TestMount<'a> {
        ShaderMount::new(surface, SimulatedHost::with_clock(clock.clone()), config(speed)).unwrap()
    }

    /// Advances the clock and delivers the oldest outstanding frame, if any.
    fn step(mount: &mut TestMount<'_>, clock: &SimulatedClock, delta_ms: f64) -> bool {
        clock.advance(delta_ms);
        match mount.host_mut().take_due() {
            Some(token) => {
                mount.on_frame(token);
                true
            }
            None => false,
        }
    }

    #[test]
    fn five_hundred_ms_at_unit_speed() {
        let surface = surface();
        let clock = SimulatedClock::new(1_000.0);
        let mut mount = mount(&surface, &clock, 1.0);
        for _ in 0..31 {
            assert!(step(&mut mount, &clock, 16.0));
        }
        assert!(step(&mut mount, &clock, 4.0));
        assert!((mount.clock().accumulated_ms() - 500.0).abs() < 1e-9);
        match mount.backend().last_uniform(U_TIME) {
            Some(UniformValue::Scalar(time)) => assert!((time - 0.5).abs() < 1e-6),
            other => panic!("unexpected time uniform {other:?}"),
        }
    }

    #[test]
    fn speed_changes_never_stack_frames() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        for speed in [1.0, 0.0, 2.0, 2.0, 0.0, 0.0, 3.0, 1.0, 0.5, 0.0, 4.0] {
            mount.set_speed(speed);
            assert!(mount.host().outstanding().len() <= 1);
            step(&mut mount, &clock, 8.0);
            mount.set_speed(speed);
            assert!(mount.host().outstanding().len() <= 1);
        }
        assert_eq!(mount.host().max_outstanding(), 1);
    }

    #[test]
    fn pause_and_resume_skip_paused_time() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        step(&mut mount, &clock, 100.0);
        assert_eq!(mount.clock().accumulated_ms(), 100.0);

        mount.set_speed(0.0);
        assert_eq!(mount.scheduler_state(), SchedulerState::Idle);
        assert!(!step(&mut mount, &clock, 5_000.0));

        mount.set_speed(1.0);
        assert!(step(&mut mount, &clock, 16.0));
        assert_eq!(mount.clock().accumulated_ms(), 116.0);
    }

    #[test]
    fn set_seed_renders_immediately() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 0.0);
        let draws = mount.backend().draw_count();

        mount.set_seed(120.0);
        assert!((mount.clock().accumulated_ms() - 1_000.0).abs() < 1e-9);
        assert_eq!(mount.backend().draw_count(), draws + 1);
        assert_eq!(
            mount.backend().last_uniform(U_TIME),
            Some(&UniformValue::Scalar(1.0))
        );
        assert_eq!(mount.scheduler_state(), SchedulerState::Idle);
    }

    #[test]
    fn set_seed_while_running_replaces_pending_frame() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        let stale = mount.pending_frame().unwrap();
        let draws = mount.backend().draw_count();

        clock.advance(5.0);
        mount.set_seed(12.0);
        assert_eq!(mount.backend().draw_count(), draws + 1);
        assert_eq!(mount.host().outstanding().len(), 1);
        assert_ne!(mount.pending_frame(), Some(stale));

        mount.on_frame(stale);
        assert_eq!(mount.backend().draw_count(), draws + 1);
    }

    #[test]
    fn identical_resizes_reallocate_once() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 0.0);
        assert_eq!(mount.backend().resize_count(), 1);
        assert_eq!(mount.backend().backing_size(), PixelSize::new(800, 400));
        let draws = mount.backend().draw_count();

        mount.handle_resize();
        mount.handle_resize();
        assert_eq!(mount.backend().resize_count(), 1);
        assert_eq!(mount.backend().draw_count(), draws);

        surface.set_layout(LayoutSize::new(300.5, 200.0));
        mount.handle_resize();
        assert_eq!(mount.backend().draw_count(), draws + 1);
        mount.handle_resize();
        assert_eq!(mount.backend().resize_count(), 2);
        assert_eq!(mount.backend().draw_count(), draws + 1);
        assert_eq!(mount.backend().backing_size(), PixelSize::new(601, 400));
    }

    #[test]
    fn minimised_surface_neither_resizes_nor_draws() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 0.0);
        let draws = mount.backend().draw_count();

        surface.set_layout(LayoutSize::new(0.0, 0.0));
        for _ in 0..3 {
            mount.handle_resize();
        }
        assert_eq!(mount.backend().resize_count(), 1);
        assert_eq!(mount.backend().draw_count(), draws);
        assert_eq!(mount.backend().backing_size(), PixelSize::new(800, 400));
    }

    #[test]
    fn resolution_is_written_only_after_resize() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        assert_eq!(
            mount.backend().last_uniform(U_RESOLUTION),
            Some(&UniformValue::Vec2([800.0, 400.0]))
        );
        assert_eq!(
            mount.backend().last_uniform(U_PIXEL_RATIO),
            Some(&UniformValue::Scalar(2.0))
        );
        for _ in 0..3 {
            step(&mut mount, &clock, 16.0);
        }
        assert_eq!(mount.backend().uniform_writes(U_RESOLUTION).len(), 1);

        surface.set_pixel_ratio(1.0);
        mount.handle_resize();
        assert_eq!(mount.backend().uniform_writes(U_RESOLUTION).len(), 2);
        assert_eq!(
            mount.backend().last_uniform(U_PIXEL_RATIO),
            Some(&UniformValue::Scalar(1.0))
        );
    }

    #[test]
    fn disposed_mount_makes_no_graphics_calls() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        let pending = mount.pending_frame().unwrap();
        mount.backend_mut().take_calls();

        mount.dispose();
        assert!(mount.host().outstanding().is_empty());
        let teardown = mount.backend_mut().take_calls();
        assert_eq!(
            teardown,
            vec![
                GraphicsCall::DeleteProgram(ProgramId::new(1)),
                GraphicsCall::UnbindAll
            ]
        );

        mount.set_uniforms(UniformMap::new().with("tint", [0.0f32, 1.0, 0.0]));
        mount.set_speed(2.0);
        mount.set_seed(4.0);
        surface.set_layout(LayoutSize::new(10.0, 10.0));
        mount.handle_resize();
        mount.on_frame(pending);
        mount.dispose();

        assert!(mount.backend().calls().is_empty());
        assert_eq!(mount.host().outstanding().len(), 0);
        assert!(mount.is_disposed());
    }

    #[test]
    fn vector_and_unsupported_uniform_shapes() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 0.0);

        mount.set_uniform_inputs([("tint", UniformInput::List(vec![1.0, 0.0, 0.0]))]);
        assert_eq!(
            mount.backend().last_uniform("tint"),
            Some(&UniformValue::Vec3([1.0, 0.0, 0.0]))
        );

        mount.backend_mut().take_calls();
        mount.set_uniform_inputs([("tint", UniformInput::List(vec![1.0, 0.0, 0.0, 1.0, 0.0]))]);
        let calls = mount.backend().calls();
        assert!(calls
            .iter()
            .filter_map(|call| match call {
                GraphicsCall::WriteUniform { name, value } if name == "tint" => Some(value),
                _ => None,
            })
            .all(|value| *value == UniformValue::Vec3([1.0, 0.0, 0.0])));
        assert_eq!(mount.backend().draw_count(), 1);
    }

    #[test]
    fn zero_speed_never_requests_frames() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 0.0);
        for _ in 0..10 {
            assert!(!step(&mut mount, &clock, 100.0));
        }
        mount.set_uniforms(UniformMap::new().with("tint", [0.5f32, 0.5, 0.5]));
        mount.set_seed(3.0);
        assert_eq!(mount.host().requested(), 0);
        assert_eq!(mount.scheduler_state(), SchedulerState::Idle);
    }

    #[test]
    fn late_uniform_names_are_ignored() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 0.0);
        mount.set_uniforms(UniformMap::new().with("u_extra", 1.0f32));
        assert!(mount.uniforms().contains("u_extra"));
        assert!(mount.backend().uniform_writes("u_extra").is_empty());
    }

    #[test]
    fn invalid_speeds_are_ignored() {
        let surface = surface();
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        mount.set_speed(-1.0);
        mount.set_speed(f64::NAN);
        assert_eq!(mount.clock().speed(), 1.0);
        assert!(mount.pending_frame().is_some());
    }

    #[test]
    fn compile_failure_leaves_inert_mount() {
        let surface = surface().with_failure(HeadlessFailure::Compile(ShaderStage::Fragment));
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        assert_eq!(mount.program(), None);
        mount.set_seed(10.0);
        mount.set_uniforms(UniformMap::new().with("tint", [0.0f32, 0.0, 0.0]));
        assert_eq!(mount.backend().draw_count(), 0);
        assert_eq!(mount.host().requested(), 0);
    }

    #[test]
    fn link_failure_leaves_inert_mount() {
        let surface = surface().with_failure(HeadlessFailure::Link);
        let clock = SimulatedClock::new(0.0);
        let mut mount = mount(&surface, &clock, 1.0);
        assert_eq!(mount.program(), None);
        assert!(mount.pending_frame().is_none());
        mount.set_speed(2.0);
        mount.set_seed(10.0);
        surface.set_layout(LayoutSize::new(120.0, 80.0));
        mount.handle_resize();
        assert_eq!(mount.backend().draw_count(), 0);
        assert_eq!(mount.host().requested(), 0);
        assert!(mount.backend().uniform_writes(U_TIME).is_empty());
    }

    #[test]
    fn missing_context_is_an_error() {
        let surface = HeadlessSurface::unsupported();
        let result = ShaderMount::new(&surface, SimulatedHost::new(), config(1.0));
        assert!(matches!(result, Err(MountError::UnsupportedContext(_))));
    }
}
