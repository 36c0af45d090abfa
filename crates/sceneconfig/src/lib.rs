//! Scene files: which shader to mount, how to animate it and the warp
//! presets available to the embedding layer.
//!
//! ```toml
//! version = 1
//!
//! [mount]
//! shader = "warp"          # "warp", "flow" or a path to a fragment shader
//! preset = "Lava"
//! seed = "random"          # or a number of 120 Hz frames
//!
//! [uniforms]
//! u_grain = 0.2
//!
//! [presets.Dusk]
//! color1 = "#1b1b3a"
//! shape = "edge"
//! ```

mod presets;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub use presets::{builtin_preset, builtin_presets, PatternShape, WarpPreset};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Shader a scene mounts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShaderSelection {
    #[default]
    Warp,
    Flow,
    File(PathBuf),
}

impl TryFrom<String> for ShaderSelection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("shader must not be empty".to_string());
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "warp" => ShaderSelection::Warp,
            "flow" => ShaderSelection::Flow,
            _ => ShaderSelection::File(PathBuf::from(trimmed)),
        })
    }
}

impl From<ShaderSelection> for String {
    fn from(value: ShaderSelection) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ShaderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderSelection::Warp => f.write_str("warp"),
            ShaderSelection::Flow => f.write_str("flow"),
            ShaderSelection::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Starting point of the animation clock in 120 Hz frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeedSetting {
    Fixed(f64),
    Random,
}

impl Serialize for SeedSetting {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            SeedSetting::Fixed(seed) => serializer.serialize_f64(*seed),
            SeedSetting::Random => serializer.serialize_str("random"),
        }
    }
}

impl<'de> Deserialize<'de> for SeedSetting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Num(f64),
            Str(String),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Num(value) => Ok(SeedSetting::Fixed(value)),
            Helper::Str(raw) => parse_seed(&raw).map_err(de::Error::custom),
        }
    }
}

/// Accepts a number of frames or `random`.
pub fn parse_seed(raw: &str) -> Result<SeedSetting, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("random") {
        return Ok(SeedSetting::Random);
    }
    trimmed
        .parse::<f64>()
        .map(SeedSetting::Fixed)
        .map_err(|_| format!("invalid seed '{trimmed}'; expected a number or 'random'"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountSettings {
    #[serde(default)]
    pub shader: ShaderSelection,
    pub preset: Option<String>,
    /// Overrides the preset's speed when set.
    pub speed: Option<f64>,
    pub seed: Option<SeedSetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub alpha: bool,
    pub antialias: bool,
    pub power: PowerSetting,
    pub fail_if_major_performance_caveat: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: false,
            power: PowerSetting::Low,
            fail_if_major_performance_caveat: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "liquidbg".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    pub x_scale: f32,
    pub y_scale: f32,
    pub distortion: f32,
    pub speed: f32,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            x_scale: 1.0,
            y_scale: 0.5,
            distortion: 0.05,
            speed: 0.01,
        }
    }
}

/// Uniform value as written in a scene file. Strings are colours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniformSetting {
    Bool(bool),
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub mount: MountSettings,
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub flow: FlowSettings,
    #[serde(default)]
    pub uniforms: BTreeMap<String, UniformSetting>,
    #[serde(default)]
    pub presets: BTreeMap<String, WarpPreset>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            version: 1,
            mount: MountSettings::default(),
            context: ContextSettings::default(),
            window: WindowSettings::default(),
            flow: FlowSettings::default(),
            uniforms: BTreeMap::new(),
            presets: BTreeMap::new(),
        }
    }
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Scene-file presets shadow bundled ones of the same name. Names match
    /// case-insensitively.
    pub fn preset(&self, name: &str) -> Option<WarpPreset> {
        self.presets
            .iter()
            .find(|(custom, _)| custom.eq_ignore_ascii_case(name))
            .map(|(_, preset)| preset.clone())
            .or_else(|| builtin_preset(name))
    }

    /// Every preset in display order: bundled presets first (with scene
    /// overrides applied), then scene-only presets by name.
    pub fn all_presets(&self) -> Vec<(String, WarpPreset)> {
        let builtins = builtin_presets();
        let mut all: Vec<(String, WarpPreset)> = builtins
            .iter()
            .map(|(name, _)| {
                let preset = self.preset(name).unwrap_or_default();
                (name.to_string(), preset)
            })
            .collect();
        for (name, preset) in &self.presets {
            let shadows_builtin = builtins
                .iter()
                .any(|(builtin, _)| builtin.eq_ignore_ascii_case(name));
            if !shadows_builtin {
                all.push((name.clone(), preset.clone()));
            }
        }
        all
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(speed) = self.mount.speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "mount.speed must be a non-negative number, got {speed}"
                )));
            }
        }

        if let Some(SeedSetting::Fixed(seed)) = self.mount.seed {
            if !seed.is_finite() {
                return Err(ConfigError::Invalid("mount.seed must be finite".into()));
            }
        }

        if let Some(name) = &self.mount.preset {
            if self.preset(name).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "mount.preset references unknown preset '{name}'"
                )));
            }
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        let flow = &self.flow;
        if [flow.x_scale, flow.y_scale, flow.distortion, flow.speed]
            .iter()
            .any(|value| !value.is_finite())
        {
            return Err(ConfigError::Invalid("flow parameters must be finite".into()));
        }

        for (name, value) in &self.uniforms {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("uniform names may not be empty".into()));
            }
            if let UniformSetting::List(values) = value {
                if !matches!(values.len(), 2 | 3 | 4 | 9 | 16) {
                    return Err(ConfigError::Invalid(format!(
                        "uniform '{name}' has {} components; expected 2, 3, 4, 9 or 16",
                        values.len()
                    )));
                }
            }
        }

        for (name, preset) in &self.presets {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("preset names may not be empty".into()));
            }
            validate_preset(name, preset)?;
        }

        Ok(())
    }
}

fn validate_preset(name: &str, preset: &WarpPreset) -> Result<(), ConfigError> {
    let numbers = [
        ("rotation", preset.rotation),
        ("proportion", preset.proportion),
        ("scale", preset.scale),
        ("speed", preset.speed),
        ("distortion", preset.distortion),
        ("swirl", preset.swirl),
        ("swirl_iterations", preset.swirl_iterations),
        ("softness", preset.softness),
        ("offset", preset.offset),
        ("shape_size", preset.shape_size),
    ];
    for (field, value) in numbers {
        if !value.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "preset '{name}' field {field} must be finite"
            )));
        }
    }
    if preset.speed < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "preset '{name}' speed must be >= 0"
        )));
    }
    if preset.swirl_iterations < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "preset '{name}' swirl_iterations must be >= 0"
        )));
    }
    for (field, color) in [
        ("color1", &preset.color1),
        ("color2", &preset.color2),
        ("color3", &preset.color3),
    ] {
        if color.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "preset '{name}' {field} may not be empty"
            )));
        }
    }
    Ok(())
}
