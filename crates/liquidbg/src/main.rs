mod cli;
mod color;
mod paths;
mod run;
mod scene;
mod simulate;
mod warp;

use anyhow::{bail, Context, Result};
use cli::{Command, PresetsAction, SimulateArgs};
use paths::AppPaths;
use scene::{load_scene, resolve_scene};
use shadermount::UniformMap;
use simulate::run_simulation;
use warp::warp_settings;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Presets(presets_cmd)) => {
            handle_presets_command(presets_cmd.config.as_deref(), presets_cmd.action)
        }
        Some(Command::Simulate(args)) => run_simulate(args),
        None => run::run(cli.run),
    }
}

fn handle_presets_command(config: Option<&std::path::Path>, action: PresetsAction) -> Result<()> {
    let paths = AppPaths::discover()?;
    let loaded = load_scene(&paths, config)?;
    let presets = loaded.config.all_presets();

    match action {
        PresetsAction::List => {
            println!("Warp presets:");
            for (index, (name, preset)) in presets.iter().enumerate() {
                let key = if index < 9 {
                    format!("[{}]", index + 1)
                } else {
                    "   ".to_string()
                };
                println!(
                    "  {key} {name:<12} shape={:<8} speed={:<5} colors={} {} {}",
                    format!("{:?}", preset.shape).to_ascii_lowercase(),
                    preset.speed,
                    preset.color1,
                    preset.color2,
                    preset.color3
                );
            }
            Ok(())
        }
        PresetsAction::Show { name } => {
            let Some(preset) = loaded.config.preset(&name) else {
                bail!("unknown preset '{name}'; run `liquidbg presets list`");
            };
            let settings = warp_settings(&preset);
            let rendered =
                toml::to_string_pretty(&preset).context("failed to render preset as TOML")?;
            println!("[presets.{name}]");
            print!("{rendered}");
            println!();
            println!("# speed multiplier: {:.4}", settings.speed);
            println!("# seed (120 Hz frames): {}", settings.seed);
            println!("{}", uniforms_json(&settings.uniforms)?);
            Ok(())
        }
    }
}

fn uniforms_json(uniforms: &UniformMap) -> Result<String> {
    serde_json::to_string_pretty(uniforms).context("failed to render uniforms as JSON")
}

fn run_simulate(args: SimulateArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let loaded = load_scene(&paths, args.scene.config.as_deref())?;
    let scene = resolve_scene(&loaded, &args.scene, &paths)?;
    let report = run_simulation(&scene, args.duration, args.interval)?;
    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("failed to render report as JSON")?;
        println!("{json}");
    } else {
        report.print();
    }
    Ok(())
}
