//! Warmth CLI Application

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use warmth_core::domain::{
    log_frequency_grid, ChannelStrip, ConfigManager, ParamId, ParamKind, WarmthConfig,
};
use warmth_infra::render_file;

#[derive(Parser)]
#[command(name = "warmth")]
#[command(about = "An analog-flavoured channel strip", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a WAV file through the strip
    Render {
        input: PathBuf,
        output: PathBuf,

        /// TOML configuration with engine settings and parameter values
        /// (defaults to the user's config file)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Frames per processing block (defaults to the configured block size)
        #[arg(short, long)]
        block_size: Option<usize>,

        /// Override a parameter, e.g. `--set LOWGAIN=6` or `--set OUTCLEAN=on`
        #[arg(short, long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(ParamId, f32)>,
    },

    /// List every parameter with its range and default
    Params,

    /// Print the composite filter response in dB
    Response {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of log-spaced frequencies between 20 Hz and 20 kHz
        #[arg(short, long, default_value_t = 32)]
        points: usize,

        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(ParamId, f32)>,
    },

    /// Write the default configuration file if it does not exist yet
    InitConfig {
        /// Directory to use instead of the platform config directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn parse_assignment(arg: &str) -> Result<(ParamId, f32), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{arg}'"))?;
    let id: ParamId = name.parse().map_err(|e| format!("{e}"))?;
    let value = match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" => 1.0,
        "off" | "false" => 0.0,
        number => number
            .parse::<f32>()
            .map_err(|e| format!("invalid value for {id}: {e}"))?,
    };
    if !value.is_finite() {
        return Err(format!("value for {id} must be finite"));
    }
    Ok((id, value))
}

/// Configuration from `--config`, else the user's config file in `config_dir`
///
/// Without a config directory (no home on this platform) the factory
/// default is used.
async fn load_config(
    path: Option<&PathBuf>,
    config_dir: Option<PathBuf>,
) -> anyhow::Result<WarmthConfig> {
    match (path, config_dir) {
        (Some(path), _) => WarmthConfig::load_from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display())),
        (None, Some(dir)) => Ok(ConfigManager::new(dir).load().await),
        (None, None) => Ok(WarmthConfig::factory_default()),
    }
}

fn build_strip(config: &WarmthConfig, overrides: &[(ParamId, f32)]) -> ChannelStrip {
    let strip = ChannelStrip::new(config.engine);
    let params = strip.parameters();
    config.apply_to(&params);
    for (id, value) in overrides {
        params.set(*id, *value);
    }
    strip
}

fn print_params() {
    println!("{:<12} {:<20} {:>8} {:>8} {:>8} unit", "id", "label", "min", "max", "default");
    for id in ParamId::ALL {
        let spec = id.spec();
        match spec.kind {
            ParamKind::Float => println!(
                "{:<12} {:<20} {:>8} {:>8} {:>8} {}",
                id, spec.label, spec.min, spec.max, spec.default, spec.unit
            ),
            ParamKind::Bool => println!(
                "{:<12} {:<20} {:>8} {:>8} {:>8} toggle",
                id, spec.label, "off", "on", "off"
            ),
        }
    }
}

fn print_response(strip: &mut ChannelStrip, points: usize) -> anyhow::Result<()> {
    strip.prepare_from_config()?;
    let sample_rate = strip.config().sample_rate as f32;
    let snapshots = strip.coefficient_snapshots();

    println!("{:>10} {:>9}", "Hz", "dB");
    for frequency in log_frequency_grid(20.0, 20000.0, points) {
        println!("{:>10.1} {:>9.2}", frequency, snapshots.magnitude_db(frequency, sample_rate));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Render {
            input,
            output,
            config,
            block_size,
            set,
        } => {
            let config = load_config(config.as_ref(), ConfigManager::default_config_dir().ok()).await?;
            let block_size = block_size.unwrap_or(config.engine.block_size);
            if block_size == 0 {
                bail!("block size must be at least one frame");
            }
            let mut strip = build_strip(&config, &set);

            let summary = tokio::task::spawn_blocking(move || {
                let summary = render_file(&mut strip, &input, &output, block_size);
                strip.release_resources();
                summary
            })
            .await??;

            println!(
                "Rendered {} frames ({} channels @ {} Hz) in {} blocks, peak {:.3}",
                summary.frames, summary.channels, summary.sample_rate, summary.blocks, summary.peak
            );
        }
        Command::Params => print_params(),
        Command::Response {
            config,
            points,
            set,
        } => {
            let config = load_config(config.as_ref(), ConfigManager::default_config_dir().ok()).await?;
            let mut strip = build_strip(&config, &set);
            print_response(&mut strip, points)?;
        }
        Command::InitConfig { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => ConfigManager::default_config_dir()?,
            };
            let manager = ConfigManager::new(dir);
            if manager.exists() {
                println!("{} already exists", manager.config_path().display());
            } else {
                manager.save(&WarmthConfig::factory_default()).await?;
                println!("Wrote {}", manager.config_path().display());
            }
        }
    }

    Ok(())
}
