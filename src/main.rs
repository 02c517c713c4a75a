use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use modelstage::config::{load_config_from_file, Preset, StageConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
    Orbit,
    Walk,
    Follow,
}

impl From<PresetArg> for Preset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Orbit => Preset::Orbit,
            PresetArg::Walk => Preset::Walk,
            PresetArg::Follow => Preset::Follow,
        }
    }
}

/// Stage a glTF model with an optional overlay texture.
#[derive(Debug, Parser)]
#[command(name = "modelstage", version, about)]
struct Cli {
    /// JSON config file; command-line options override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Built-in preset used when no config file is given
    #[arg(long, value_enum, default_value_t = PresetArg::Orbit)]
    preset: PresetArg,
    /// Model to load (.gltf / .glb)
    #[arg(long)]
    model: Option<String>,
    /// Overlay image blended into every material
    #[arg(long)]
    overlay: Option<String>,
    /// Overlay mix factor in [0, 1]
    #[arg(long)]
    mix: Option<f32>,
    /// Draco decoder required by compressed assets
    #[arg(long)]
    draco_decoder: Option<PathBuf>,
    /// Run without a window
    #[arg(long)]
    headless: bool,
    /// Frames to run in headless mode
    #[arg(long, default_value_t = 300)]
    frames: u64,
    /// Print the effective config as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<StageConfig, String> {
        let mut config = match &self.config {
            Some(path) => load_config_from_file(path)
                .map_err(|err| format!("failed to load {}: {}", path.display(), err))?,
            None => StageConfig::preset(self.preset.into()),
        };
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        if let Some(overlay) = &self.overlay {
            config.overlay_path = Some(overlay.clone());
        }
        if let Some(mix) = self.mix {
            config.mix_factor = mix;
        }
        if let Some(decoder) = &self.draco_decoder {
            config.draco_decoder_path = Some(decoder.clone());
        }
        config.validate().map_err(|err| err.to_string())?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(message) => {
            log::error!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    if cli.dump_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                log::error!("failed to serialize config: {}", err);
                ExitCode::FAILURE
            }
        };
    }

    if cli.headless {
        modelstage::app::run_headless(&config, cli.frames);
        return ExitCode::SUCCESS;
    }

    match modelstage::app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
