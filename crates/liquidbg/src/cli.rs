use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use sceneconfig::{parse_seed, SeedSetting, ShaderSelection, UniformSetting};

#[derive(Parser, Debug)]
#[command(
    name = "liquidbg",
    author,
    version,
    about = "Animated liquid shader backgrounds",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Scene file; defaults to `scene.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Warp preset to start with (e.g. `Lava`).
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Shader to mount: `warp`, `flow` or a path to a fragment shader.
    #[arg(long, value_name = "SHADER", value_parser = parse_shader)]
    pub shader: Option<ShaderSelection>,

    /// Clock multiplier (0 pauses). For `flow`, the time added per frame.
    #[arg(long, value_name = "SPEED", value_parser = parse_speed)]
    pub speed: Option<f64>,

    /// Starting point in 120 Hz frames, or `random`.
    #[arg(long, value_name = "FRAMES|random", value_parser = parse_seed_arg)]
    pub seed: Option<SeedSetting>,

    /// Window or simulated surface size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Extra uniform, repeatable: `name=0.5`, `name=[1,0,0]`, `name=#ff8800`.
    #[arg(long = "uniform", value_name = "NAME=VALUE", value_parser = parse_uniform)]
    pub uniforms: Vec<(String, UniformSetting)>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect bundled and scene-defined warp presets.
    Presets(PresetsCommand),
    /// Drive the scene against a headless backend with a simulated clock.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
pub struct PresetsCommand {
    /// Scene file with additional presets.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub action: PresetsAction,
}

#[derive(Subcommand, Debug)]
pub enum PresetsAction {
    /// List preset names in selection order.
    List,
    /// Print a preset and the uniforms it produces.
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub scene: RunArgs,

    /// Simulated run time (e.g. `500ms`, `2s`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, default_value = "1s")]
    pub duration: Duration,

    /// Delay between delivered frames.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, default_value = "16ms")]
    pub interval: Duration,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_shader(value: &str) -> Result<ShaderSelection, String> {
    ShaderSelection::try_from(value.to_string())
}

pub fn parse_speed(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    let speed: f64 = trimmed
        .parse()
        .map_err(|_| format!("invalid speed '{trimmed}'"))?;
    if !speed.is_finite() || speed < 0.0 {
        return Err("speed must be a non-negative number".to_string());
    }
    Ok(speed)
}

pub fn parse_seed_arg(value: &str) -> Result<SeedSetting, String> {
    match parse_seed(value)? {
        SeedSetting::Fixed(seed) if !seed.is_finite() => Err("seed must be finite".to_string()),
        seed => Ok(seed),
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

/// `NAME=VALUE` where the value is JSON (number, boolean, array) or, failing
/// that, a colour string.
pub fn parse_uniform(value: &str) -> Result<(String, UniformSetting), String> {
    let (name, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{value}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("uniform name must not be empty".into());
    }
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(format!("uniform '{name}' has no value"));
    }
    let setting = serde_json::from_str::<UniformSetting>(raw)
        .unwrap_or_else(|_| UniformSetting::Text(raw.to_string()));
    Ok((name.to_string(), setting))
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    let duration = humantime::parse_duration(trimmed)
        .map_err(|err| format!("invalid duration '{trimmed}': {err}"))?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".into());
    }
    Ok(duration)
}
