//! Turns a scene file plus command-line overrides into what the mount or
//! flow is constructed with.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rand::Rng;
use sceneconfig::{
    ContextSettings, PowerSetting, SceneConfig, SeedSetting, ShaderSelection, UniformSetting,
    WarpPreset,
};
use shadermount::{
    ContextOptions, FlowParams, MountConfig, PowerPreference, PreviewConfig, PreviewContent,
    PreviewScene, UniformInput, UniformMap,
};
use tracing::{debug, info, warn};

use crate::cli::RunArgs;
use crate::color::parse_color;
use crate::paths::AppPaths;
use crate::warp::{warp_settings, WarpSettings, WARP_FRAGMENT_SHADER};

/// Upper bound, in 120 Hz frames, for `seed = "random"`.
const RANDOM_SEED_FRAMES: f64 = 100_000.0;
/// Digit keys 1-9 select scenes in the preview.
const MAX_SCENES: usize = 9;

#[derive(Debug, Clone)]
pub struct LoadedScene {
    pub config: SceneConfig,
    /// Directory relative shader paths in the file are resolved against.
    pub base_dir: Option<PathBuf>,
}

pub fn load_scene(paths: &AppPaths, explicit: Option<&Path>) -> Result<LoadedScene> {
    let Some(path) = paths.locate_scene(explicit) else {
        return Ok(LoadedScene {
            config: SceneConfig::default(),
            base_dir: None,
        });
    };
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read scene file {}", path.display()))?;
    let config = SceneConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load scene file {}", path.display()))?;
    info!(path = %path.display(), presets = config.presets.len(), "loaded scene");
    Ok(LoadedScene {
        config,
        base_dir: path.parent().map(Path::to_path_buf),
    })
}

#[derive(Debug, Clone)]
pub enum SceneContent {
    Mount(MountConfig),
    Flow(FlowParams),
}

#[derive(Debug, Clone)]
pub struct ResolvedScene {
    pub title: String,
    pub size: (u32, u32),
    pub shader: ShaderSelection,
    pub preset: Option<String>,
    pub content: SceneContent,
    /// Presets the preview's digit keys switch between.
    pub scenes: Vec<PreviewScene>,
    /// Settings that were dropped or ignored while resolving.
    pub warnings: Vec<String>,
}

impl ResolvedScene {
    pub fn into_preview(self) -> PreviewConfig {
        let content = match self.content {
            SceneContent::Mount(config) => PreviewContent::Mount(config),
            SceneContent::Flow(params) => PreviewContent::Flow(params),
        };
        PreviewConfig {
            title: self.title,
            size: self.size,
            content,
            scenes: self.scenes,
        }
    }
}

pub fn resolve_scene(
    loaded: &LoadedScene,
    args: &RunArgs,
    paths: &AppPaths,
) -> Result<ResolvedScene> {
    let config = &loaded.config;
    let mut warnings = Vec::new();

    let (shader, shader_base) = match &args.shader {
        Some(shader) => (shader.clone(), None),
        None => (config.mount.shader.clone(), loaded.base_dir.as_deref()),
    };
    let preset_name = args.preset.clone().or_else(|| config.mount.preset.clone());
    let speed_override = args.speed.or(config.mount.speed);
    let seed_setting = args.seed.or(config.mount.seed);
    let context = context_options(&config.context);

    let settings = config
        .uniforms
        .iter()
        .map(|(name, setting)| (name.clone(), setting.clone()))
        .chain(args.uniforms.iter().cloned());
    let extras = uniform_map(settings, &mut warnings);

    let preset = match &preset_name {
        Some(name) => match config.preset(name) {
            Some(preset) => Some(preset),
            None => bail!("unknown preset '{name}'; run `liquidbg presets list`"),
        },
        None => None,
    };

    let mut scenes = Vec::new();
    let content = match &shader {
        ShaderSelection::Warp => {
            let base = warp_settings(&preset.clone().unwrap_or_default());
            scenes = preview_scenes(config, &extras, speed_override);
            SceneContent::Mount(mount_config(
                WARP_FRAGMENT_SHADER.to_string(),
                base,
                &extras,
                speed_override,
                seed_setting,
                context,
            ))
        }
        ShaderSelection::Flow => {
            if preset.is_some() {
                warnings.push("the flow shader does not use presets".to_string());
            }
            if seed_setting.is_some() {
                warnings.push("the flow shader does not use a seed".to_string());
            }
            if !extras.is_empty() {
                warnings.push(format!(
                    "the flow shader takes no extra uniforms; ignoring {}",
                    extras.len()
                ));
            }
            let flow = &config.flow;
            SceneContent::Flow(FlowParams {
                x_scale: flow.x_scale,
                y_scale: flow.y_scale,
                distortion: flow.distortion,
                speed: speed_override.map_or(flow.speed, |speed| speed as f32),
            })
        }
        ShaderSelection::File(path) => {
            let path = paths.locate_shader(path, shader_base);
            let source = fs::read_to_string(&path)
                .with_context(|| format!("failed to read fragment shader {}", path.display()))?;
            debug!(path = %path.display(), bytes = source.len(), "loaded fragment shader");
            let base = match &preset {
                Some(preset) => warp_settings(preset),
                None => WarpSettings {
                    uniforms: UniformMap::new(),
                    speed: 1.0,
                    seed: 0.0,
                },
            };
            SceneContent::Mount(mount_config(
                source,
                base,
                &extras,
                speed_override,
                seed_setting,
                context,
            ))
        }
    };

    for warning in &warnings {
        warn!("{warning}");
    }

    Ok(ResolvedScene {
        title: config.window.title.clone(),
        size: args
            .size
            .unwrap_or((config.window.width, config.window.height)),
        shader,
        preset: preset_name,
        content,
        scenes,
        warnings,
    })
}

fn mount_config(
    source: String,
    base: WarpSettings,
    extras: &UniformMap,
    speed: Option<f64>,
    seed: Option<SeedSetting>,
    context: ContextOptions,
) -> MountConfig {
    let mut uniforms = base.uniforms;
    uniforms.merge(extras.clone());
    MountConfig::new(source)
        .with_uniforms(uniforms)
        .with_speed(speed.unwrap_or(base.speed))
        .with_seed(resolve_seed(seed, base.seed))
        .with_context(context)
}

fn preview_scenes(
    config: &SceneConfig,
    extras: &UniformMap,
    speed: Option<f64>,
) -> Vec<PreviewScene> {
    config
        .all_presets()
        .into_iter()
        .take(MAX_SCENES)
        .map(|(name, preset): (String, WarpPreset)| {
            let settings = warp_settings(&preset);
            let mut uniforms = settings.uniforms;
            uniforms.merge(extras.clone());
            PreviewScene {
                name,
                uniforms,
                speed: speed.unwrap_or(settings.speed),
                seed: settings.seed,
            }
        })
        .collect()
}

pub fn resolve_seed(setting: Option<SeedSetting>, default: f64) -> f64 {
    match setting {
        Some(SeedSetting::Fixed(seed)) => seed,
        Some(SeedSetting::Random) => {
            let seed = rand::thread_rng().gen_range(0.0..RANDOM_SEED_FRAMES).floor();
            debug!(seed, "picked random seed");
            seed
        }
        None => default,
    }
}

fn context_options(settings: &ContextSettings) -> ContextOptions {
    ContextOptions {
        alpha: settings.alpha,
        antialias: settings.antialias,
        power_preference: match settings.power {
            PowerSetting::Low => PowerPreference::Low,
            PowerSetting::High => PowerPreference::High,
        },
        fail_if_major_performance_caveat: settings.fail_if_major_performance_caveat,
    }
}

/// Colour strings become `vec4`s; values no uniform can hold are reported
/// and skipped.
fn uniform_map<I>(settings: I, warnings: &mut Vec<String>) -> UniformMap
where
    I: IntoIterator<Item = (String, UniformSetting)>,
{
    let mut map = UniformMap::new();
    for (name, setting) in settings {
        let input = match setting {
            UniformSetting::Bool(flag) => UniformInput::Bool(flag),
            UniformSetting::Number(value) => UniformInput::Number(value),
            UniformSetting::List(values) => UniformInput::List(values),
            UniformSetting::Text(text) => match parse_color(&text) {
                Ok(rgba) => UniformInput::List(rgba.iter().map(|c| *c as f64).collect()),
                Err(err) => {
                    warnings.push(format!("uniform '{name}' skipped: {err}"));
                    continue;
                }
            },
        };
        if let Err(err) = map.insert_input(name.clone(), input) {
            warnings.push(format!("uniform '{name}' skipped: {err}"));
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadermount::UniformValue;

    fn resolve(config: SceneConfig, args: RunArgs) -> Result<ResolvedScene> {
        let root = tempfile::TempDir::new().unwrap();
        let paths = AppPaths::with_config_dir(root.path());
        let loaded = LoadedScene {
            config,
            base_dir: None,
        };
        resolve_scene(&loaded, &args, &paths)
    }

    fn mount(scene: &ResolvedScene) -> &MountConfig {
        match &scene.content {
            SceneContent::Mount(config) => config,
            SceneContent::Flow(_) => panic!("expected a mount"),
        }
    }

    #[test]
    fn defaults_mount_the_warp_shader() {
        let scene = resolve(SceneConfig::default(), RunArgs::default()).unwrap();
        let config = mount(&scene);
        assert_eq!(scene.shader, ShaderSelection::Warp);
        assert_eq!(config.fragment_shader, WARP_FRAGMENT_SHADER);
        assert!(config.uniforms.contains("u_color1"));
        assert_eq!(config.seed, 0.0);
        assert!(config.speed > 0.0 && config.speed < 5.0);
        assert_eq!(scene.scenes.len(), 6);
        assert_eq!(scene.size, (1280, 720));
    }

    #[test]
    fn command_line_overrides_scene() {
        let config = SceneConfig::from_toml_str(
            r#"
version = 1
[mount]
preset = "Lava"
speed = 2.0
[uniforms]
u_grain = 0.5
"#,
        )
        .unwrap();
        let args = RunArgs {
            preset: Some("vortex".into()),
            seed: Some(SeedSetting::Fixed(42.0)),
            size: Some((640, 480)),
            uniforms: vec![("u_grain".into(), UniformSetting::Number(0.75))],
            ..RunArgs::default()
        };
        let scene = resolve(config, args).unwrap();
        let config = mount(&scene);
        assert_eq!(scene.preset.as_deref(), Some("vortex"));
        assert_eq!(config.speed, 2.0);
        assert_eq!(config.seed, 42.0);
        assert_eq!(config.uniforms.get("u_shape"), Some(&UniformValue::Scalar(1.0)));
        assert_eq!(config.uniforms.get("u_grain"), Some(&UniformValue::Scalar(0.75)));
        assert_eq!(scene.size, (640, 480));
        assert!(scene.scenes.iter().all(|preview| preview.speed == 2.0));
    }

    #[test]
    fn unknown_presets_are_errors() {
        let args = RunArgs {
            preset: Some("Sunset".into()),
            ..RunArgs::default()
        };
        assert!(resolve(SceneConfig::default(), args).is_err());
    }

    #[test]
    fn colour_uniforms_become_vec4_and_bad_values_warn() {
        let args = RunArgs {
            uniforms: vec![
                ("u_glow".into(), UniformSetting::Text("#ff0000".into())),
                ("u_bad".into(), UniformSetting::Text("sparkly".into())),
                ("u_long".into(), UniformSetting::List(vec![0.0; 5])),
            ],
            ..RunArgs::default()
        };
        let scene = resolve(SceneConfig::default(), args).unwrap();
        let config = mount(&scene);
        assert_eq!(
            config.uniforms.get("u_glow"),
            Some(&UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
        );
        assert!(!config.uniforms.contains("u_bad"));
        assert!(!config.uniforms.contains("u_long"));
        assert_eq!(scene.warnings.len(), 2);
    }

    #[test]
    fn flow_ignores_seed_with_warning() {
        let args = RunArgs {
            shader: Some(ShaderSelection::Flow),
            seed: Some(SeedSetting::Fixed(10.0)),
            speed: Some(0.02),
            ..RunArgs::default()
        };
        let scene = resolve(SceneConfig::default(), args).unwrap();
        let SceneContent::Flow(params) = scene.content else {
            panic!("expected flow");
        };
        assert_eq!(params.speed, 0.02);
        assert_eq!(params.y_scale, 0.5);
        assert_eq!(scene.warnings.len(), 1);
        assert!(scene.scenes.is_empty());
    }

    #[test]
    fn file_shaders_are_read_relative_to_scene() {
        let root = tempfile::TempDir::new().unwrap();
        fs::write(
            root.path().join("ripple.frag"),
            "uniform float u_time;\nvoid main() {}\n",
        )
        .unwrap();
        let scene_path = root.path().join("scene.toml");
        fs::write(
            &scene_path,
            "version = 1\n[mount]\nshader = \"ripple.frag\"\nseed = 5\n",
        )
        .unwrap();

        let paths = AppPaths::with_config_dir(root.path().join("config"));
        let loaded = load_scene(&paths, Some(&scene_path)).unwrap();
        let scene = resolve_scene(&loaded, &RunArgs::default(), &paths).unwrap();
        let config = mount(&scene);
        assert!(config.fragment_shader.contains("u_time"));
        assert_eq!(config.speed, 1.0);
        assert_eq!(config.seed, 5.0);
        assert!(config.uniforms.is_empty());
    }

    #[test]
    fn random_seeds_stay_in_range() {
        for _ in 0..32 {
            let seed = resolve_seed(Some(SeedSetting::Random), 0.0);
            assert!((0.0..RANDOM_SEED_FRAMES).contains(&seed));
            assert_eq!(seed, seed.floor());
        }
        assert_eq!(resolve_seed(None, 7.0), 7.0);
    }
}
