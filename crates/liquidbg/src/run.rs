use anyhow::Result;
use shadermount::run_preview;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::scene::{load_scene, resolve_scene};

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved liquidbg paths");
    let loaded = load_scene(&paths, args.config.as_deref())?;
    let scene = resolve_scene(&loaded, &args, &paths)?;
    tracing::info!(
        shader = %scene.shader,
        preset = scene.preset.as_deref().unwrap_or("default"),
        width = scene.size.0,
        height = scene.size.1,
        "opening preview window"
    );
    run_preview(scene.into_preview())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
