//! Desktop embedding: a winit window as the mount's surface and its event
//! loop as the frame host.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::{debug, info};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::backend::{MountError, RenderSurface};
use crate::flow::{FlowParams, ShaderFlow};
use crate::gpu::WgpuBackend;
use crate::mount::ShaderMount;
use crate::scheduler::{FrameHost, FrameToken};
use crate::types::{ContextOptions, LayoutSize, MountConfig};
use crate::uniforms::UniformMap;

/// Seed change applied by the arrow keys: one second at 120 Hz.
const SEED_STEP: f64 = 120.0;

/// Speed Space resumes a mount at when the preview was started paused.
const RESUME_SPEED: f64 = 1.0;

pub struct WindowSurface {
    window: Arc<Window>,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl RenderSurface for WindowSurface {
    type Backend = WgpuBackend;

    fn acquire_context(&self, options: &ContextOptions) -> Result<WgpuBackend, MountError> {
        WgpuBackend::new(self.window.clone(), options)
    }

    fn layout_size(&self) -> LayoutSize {
        let logical = self
            .window
            .inner_size()
            .to_logical::<f64>(self.window.scale_factor());
        LayoutSize::new(logical.width, logical.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.scale_factor()
    }
}

/// Frames map onto redraw requests; the requested token is handed back
/// through [`take_due`](WinitFrameHost::take_due) on `RedrawRequested`.
pub struct WinitFrameHost {
    window: Arc<Window>,
    start: Instant,
    next_id: u64,
    pending: Option<FrameToken>,
}

impl WinitFrameHost {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            start: Instant::now(),
            next_id: 0,
            pending: None,
        }
    }

    pub fn take_due(&mut self) -> Option<FrameToken> {
        self.pending.take()
    }
}

impl FrameHost for WinitFrameHost {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn request_frame(&mut self) -> FrameToken {
        self.next_id += 1;
        let token = FrameToken::new(self.next_id);
        self.pending = Some(token);
        self.window.request_redraw();
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        if self.pending == Some(token) {
            self.pending = None;
        }
    }
}

/// Named uniform bundle the digit keys switch between.
#[derive(Debug, Clone)]
pub struct PreviewScene {
    pub name: String,
    pub uniforms: UniformMap,
    pub speed: f64,
    pub seed: f64,
}

#[derive(Debug, Clone)]
pub enum PreviewContent {
    Mount(MountConfig),
    Flow(FlowParams),
}

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub title: String,
    pub size: (u32, u32),
    pub content: PreviewContent,
    pub scenes: Vec<PreviewScene>,
}

/// Pause toggle state. `resume_speed` is never zero, so a preview started
/// at speed 0 can still be resumed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Playback {
    resume_speed: f64,
    paused: bool,
}

impl Playback {
    fn new(speed: f64, fallback: f64) -> Self {
        let mut playback = Self {
            resume_speed: fallback,
            paused: false,
        };
        playback.select(speed);
        playback
    }

    /// Speed the animation should run at right now.
    fn speed(&self) -> f64 {
        if self.paused {
            0.0
        } else {
            self.resume_speed
        }
    }

    fn toggle(&mut self) -> f64 {
        self.paused = !self.paused;
        self.speed()
    }

    /// Adopts a scene speed. Zero pauses and keeps the previous resume speed.
    fn select(&mut self, speed: f64) -> f64 {
        if speed != 0.0 {
            self.resume_speed = speed;
        } else {
            self.paused = true;
        }
        self.speed()
    }
}

enum Preview {
    Mount {
        mount: ShaderMount<WindowSurface, WinitFrameHost>,
        playback: Playback,
        seed: f64,
    },
    Flow {
        flow: ShaderFlow<WindowSurface, WinitFrameHost>,
        playback: Playback,
    },
}

impl Preview {
    fn redraw(&mut self) {
        match self {
            Preview::Mount { mount, .. } => {
                if let Some(token) = mount.host_mut().take_due() {
                    mount.on_frame(token);
                }
            }
            Preview::Flow { flow, .. } => {
                if let Some(token) = flow.host_mut().take_due() {
                    flow.on_frame(token);
                }
            }
        }
    }

    fn resize(&mut self) {
        match self {
            Preview::Mount { mount, .. } => mount.handle_resize(),
            Preview::Flow { flow, .. } => flow.handle_resize(),
        }
    }

    fn dispose(&mut self) {
        match self {
            Preview::Mount { mount, .. } => mount.dispose(),
            Preview::Flow { flow, .. } => flow.dispose(),
        }
    }

    fn toggle_pause(&mut self) {
        match self {
            Preview::Mount {
                mount, playback, ..
            } => {
                mount.set_speed(playback.toggle());
                info!(paused = playback.paused, "animation toggled");
            }
            Preview::Flow { flow, playback } => {
                let params = FlowParams {
                    speed: playback.toggle() as f32,
                    ..flow.params()
                };
                flow.set_params(params);
                info!(paused = playback.paused, "animation toggled");
            }
        }
    }

    fn shift_seed(&mut self, delta: f64) {
        if let Preview::Mount { mount, seed, .. } = self {
            *seed += delta;
            mount.set_seed(*seed);
            debug!(seed = *seed, "seed changed");
        }
    }

    fn select_scene(&mut self, scene: &PreviewScene) {
        if let Preview::Mount {
            mount,
            playback,
            seed,
        } = self
        {
            *seed = scene.seed;
            mount.set_uniforms(scene.uniforms.clone());
            mount.set_speed(playback.select(scene.speed));
            mount.set_seed(scene.seed);
            info!(scene = %scene.name, "scene selected");
        }
    }
}

/// Opens a window and runs `config.content` in it until the window closes.
///
/// Keys: Space pauses and resumes, the arrow keys move the seed by one
/// second, and `1`-`9` switch between `config.scenes`.
pub fn run_preview(config: PreviewConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = config.size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(LogicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let surface = WindowSurface::new(window.clone());
    let host = WinitFrameHost::new(window.clone());
    let mut preview = match config.content {
        PreviewContent::Mount(mount_config) => {
            let playback = Playback::new(mount_config.speed, RESUME_SPEED);
            let seed = mount_config.seed;
            let mount = ShaderMount::new(surface, host, mount_config)?;
            Preview::Mount {
                mount,
                playback,
                seed,
            }
        }
        PreviewContent::Flow(params) => {
            let flow = ShaderFlow::new(surface, host, params)?;
            Preview::Flow {
                flow,
                playback: Playback::new(
                    f64::from(params.speed),
                    f64::from(FlowParams::default().speed),
                ),
            }
        }
    };
    let scenes = config.scenes;

    let run_result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        let Event::WindowEvent { window_id, event } = event else {
            return;
        };
        if window_id != window.id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                preview.dispose();
                elwt.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                preview.resize();
            }
            WindowEvent::RedrawRequested => preview.redraw(),
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key {
                    Key::Named(NamedKey::Space) if !event.repeat => preview.toggle_pause(),
                    Key::Named(NamedKey::ArrowLeft) => preview.shift_seed(-SEED_STEP),
                    Key::Named(NamedKey::ArrowRight) => preview.shift_seed(SEED_STEP),
                    Key::Named(NamedKey::Escape) => {
                        preview.dispose();
                        elwt.exit();
                    }
                    Key::Character(ref value) => {
                        let index = value
                            .chars()
                            .next()
                            .and_then(|ch| ch.to_digit(10))
                            .filter(|digit| *digit > 0);
                        if let Some(scene) =
                            index.and_then(|digit| scenes.get(digit as usize - 1))
                        {
                            preview.select_scene(scene);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
