//! Headless runs: the resolved scene is mounted on a recording backend and
//! driven by a simulated clock, one frame per interval.

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use shadermount::{
    GraphicsBackend, HeadlessSurface, LayoutSize, ShaderFlow, ShaderMount, SimulatedClock,
    SimulatedHost, UniformValue, U_TIME,
};
use tracing::{debug, warn};

use crate::scene::{ResolvedScene, SceneContent};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub shader: String,
    pub preset: Option<String>,
    pub duration_ms: f64,
    pub interval_ms: f64,
    /// Draw calls, including any made during construction.
    pub frames: usize,
    pub frames_requested: u64,
    pub max_pending_frames: usize,
    /// Mount accumulator; absent for the flow, which counts frames instead.
    pub accumulator_ms: Option<f64>,
    pub time_uniform: Option<f32>,
    pub backing: (u32, u32),
    pub warnings: Vec<String>,
}

pub fn run_simulation(
    scene: &ResolvedScene,
    duration: Duration,
    interval: Duration,
) -> Result<SimulationReport> {
    let duration_ms = duration.as_secs_f64() * 1000.0;
    let interval_ms = interval.as_secs_f64() * 1000.0;
    let (width, height) = scene.size;
    let surface = HeadlessSurface::new(LayoutSize::new(width as f64, height as f64), 1.0);
    let clock = SimulatedClock::new(0.0);
    let host = SimulatedHost::with_clock(clock.clone());
    let mut warnings = scene.warnings.clone();

    let report = match &scene.content {
        SceneContent::Mount(config) => {
            let mut mount = ShaderMount::new(&surface, host, config.clone())?;
            if mount.program().is_none() {
                warnings.push("shader program failed to build; nothing was drawn".to_string());
            }
            for step in steps(duration_ms, interval_ms) {
                clock.advance(step);
                if let Some(token) = mount.host_mut().take_due() {
                    mount.on_frame(token);
                }
            }
            let backing = mount.backend().backing_size();
            let report = SimulationReport {
                shader: scene.shader.to_string(),
                preset: scene.preset.clone(),
                duration_ms,
                interval_ms,
                frames: mount.backend().draw_count(),
                frames_requested: mount.host().requested(),
                max_pending_frames: mount.host().max_outstanding(),
                accumulator_ms: Some(mount.clock().accumulated_ms()),
                time_uniform: scalar(mount.backend().last_uniform(U_TIME)),
                backing: (backing.width, backing.height),
                warnings,
            };
            mount.dispose();
            report
        }
        SceneContent::Flow(params) => {
            let mut flow = ShaderFlow::new(&surface, host, *params)?;
            for step in steps(duration_ms, interval_ms) {
                clock.advance(step);
                if let Some(token) = flow.host_mut().take_due() {
                    flow.on_frame(token);
                }
            }
            let frames = flow.backend().draw_count();
            if frames == 0 {
                warnings.push("flow shader failed to build; nothing was drawn".to_string());
            }
            let backing = flow.backend().backing_size();
            let report = SimulationReport {
                shader: scene.shader.to_string(),
                preset: None,
                duration_ms,
                interval_ms,
                frames,
                frames_requested: flow.host().requested(),
                max_pending_frames: flow.host().max_outstanding(),
                accumulator_ms: None,
                time_uniform: scalar(flow.backend().last_uniform("time")),
                backing: (backing.width, backing.height),
                warnings,
            };
            flow.dispose();
            report
        }
    };

    for warning in report.warnings.iter().skip(scene.warnings.len()) {
        warn!("{warning}");
    }
    debug!(frames = report.frames, "simulation finished");
    Ok(report)
}

/// Step lengths covering `duration_ms`; the last step is shortened so the
/// run ends exactly on the duration.
fn steps(duration_ms: f64, interval_ms: f64) -> impl Iterator<Item = f64> {
    let mut elapsed = 0.0;
    std::iter::from_fn(move || {
        if interval_ms <= 0.0 || elapsed >= duration_ms {
            return None;
        }
        let step = interval_ms.min(duration_ms - elapsed);
        elapsed += step;
        Some(step)
    })
}

fn scalar(value: Option<&UniformValue>) -> Option<f32> {
    match value {
        Some(UniformValue::Scalar(value)) => Some(*value),
        _ => None,
    }
}

impl SimulationReport {
    pub fn print(&self) {
        println!("Shader:          {}", self.shader);
        if let Some(preset) = &self.preset {
            println!("Preset:          {preset}");
        }
        println!(
            "Simulated:       {:.1} ms in {:.1} ms steps",
            self.duration_ms, self.interval_ms
        );
        println!("Backing store:   {}x{}", self.backing.0, self.backing.1);
        println!(
            "Frames drawn:    {} (requested {}, max pending {})",
            self.frames, self.frames_requested, self.max_pending_frames
        );
        if let Some(accumulator) = self.accumulator_ms {
            println!("Accumulator:     {accumulator:.3} ms");
        }
        match self.time_uniform {
            Some(time) => println!("Time uniform:    {time:.4}"),
            None => println!("Time uniform:    (never written)"),
        }
        for warning in &self.warnings {
            println!("warning: {warning}");
        }
    }
}
