//! Shader mounts: a fragment shader bound to a drawing surface and animated
//! by a host event loop.
//!
//! ```text
//!   embedding layer (CLI, preview window, tests)
//!          │ MountConfig / FlowParams
//!          ▼
//!   ShaderMount ──▶ GraphicsBackend (wgpu | headless)
//!     │   ▲
//!     │   └── on_frame(token) / handle_resize()
//!     ▼
//!   FrameScheduler ──▶ FrameHost (winit | simulated)
//! ```
//!
//! The mount never talks to a window system directly. A [`RenderSurface`]
//! hands it a [`GraphicsBackend`] and reports its layout size, and a
//! [`FrameHost`] supplies the clock and one-shot frame callbacks. The `gpu`
//! and `window` modules provide the desktop implementations; `headless` and
//! `host` provide recording and simulated ones.

pub mod backend;
pub mod clock;
pub mod flow;
pub mod gpu;
pub mod headless;
pub mod host;
pub mod mount;
pub mod program;
pub mod resize;
pub mod scheduler;
pub mod types;
pub mod uniforms;
pub mod window;

pub use backend::{
    GraphicsBackend, MountError, ProgramError, ProgramId, ProgramSource, RenderSurface,
    ShaderStage,
};
pub use clock::{AnimationClock, SEED_FRAME_MS};
pub use flow::{FlowParams, ShaderFlow, FLOW_FRAGMENT_SHADER};
pub use headless::{GraphicsCall, HeadlessBackend, HeadlessFailure, HeadlessSurface};
pub use host::{SimulatedClock, SimulatedHost};
pub use mount::ShaderMount;
pub use scheduler::{FrameHost, FrameScheduler, FrameToken, SchedulerState};
pub use types::{ContextOptions, LayoutSize, MountConfig, PixelSize, PowerPreference};
pub use uniforms::{
    UniformError, UniformInput, UniformKind, UniformMap, UniformValue, U_PIXEL_RATIO,
    U_RESOLUTION, U_TIME,
};
pub use window::{run_preview, PreviewConfig, PreviewContent, PreviewScene};
