use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;
use tracing::debug;

pub const ENV_CONFIG_DIR: &str = "LIQUIDBG_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "liquidbg";
const APPLICATION: &str = "liquidbg";

const SCENE_FILE: &str = "scene.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn scene_file(&self) -> PathBuf {
        self.config_dir.join(SCENE_FILE)
    }

    pub fn shader_dir(&self) -> PathBuf {
        self.config_dir.join("shaders")
    }

    /// Explicit path first, then the user's `scene.toml` if it exists.
    pub fn locate_scene(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let default = self.scene_file();
        if default.is_file() {
            Some(default)
        } else {
            debug!(path = %default.display(), "no scene file; using built-in defaults");
            None
        }
    }

    /// Resolves a fragment shader path: absolute paths and paths relative to
    /// `base` win, then the user's shader directory is searched.
    pub fn locate_shader(&self, path: &Path, base: Option<&Path>) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let relative = match base {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        };
        if relative.exists() {
            return relative;
        }
        let candidate = self.shader_dir().join(path);
        if candidate.exists() {
            return candidate;
        }
        relative
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn scene_is_only_found_when_present() {
        let root = tempfile::TempDir::new().unwrap();
        let paths = AppPaths::with_config_dir(root.path());
        assert_eq!(paths.locate_scene(None), None);

        fs::write(paths.scene_file(), "version = 1").unwrap();
        assert_eq!(paths.locate_scene(None), Some(root.path().join("scene.toml")));

        let explicit = Path::new("elsewhere.toml");
        assert_eq!(paths.locate_scene(Some(explicit)), Some(explicit.to_path_buf()));
    }

    #[test]
    fn shaders_fall_back_to_user_directory() {
        let root = tempfile::TempDir::new().unwrap();
        let paths = AppPaths::with_config_dir(root.path());
        fs::create_dir_all(paths.shader_dir()).unwrap();
        fs::write(paths.shader_dir().join("ripple.frag"), "void main() {}").unwrap();

        let scene_dir = root.path().join("scenes");
        assert_eq!(
            paths.locate_shader(Path::new("ripple.frag"), Some(&scene_dir)),
            paths.shader_dir().join("ripple.frag")
        );
        assert_eq!(
            paths.locate_shader(Path::new("missing.frag"), Some(&scene_dir)),
            scene_dir.join("missing.frag")
        );
    }
}
