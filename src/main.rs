mod demo;

use crate::demo::{CountingSink, SimulatedPlayback, SyntheticEngine};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spectral_ribbon::{Ribbon, RibbonConfig, RibbonSession, SurfaceSize, config_path};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "spectral-ribbon")]
#[command(about = "Live spectrogram ribbon synchronized to playback")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the ribbon from a synthetic analysis engine
    Demo {
        /// How long to run, in seconds
        #[arg(long, default_value = "5")]
        seconds: f64,

        /// Simulated track length in seconds (0 = unknown duration)
        #[arg(long, default_value = "30")]
        duration: f64,

        /// Surface width in logical pixels
        #[arg(long, default_value = "800")]
        width: f32,

        /// Surface height in logical pixels
        #[arg(long, default_value = "240")]
        height: f32,

        /// Device pixel ratio
        #[arg(long, default_value = "1.0")]
        scale: f32,

        /// Report playback times as untagged milliseconds
        #[arg(long)]
        untagged_ms: bool,

        /// Write the final frame to this PNG file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Load configuration from this file instead of the default location
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Print the config file location
        #[arg(long)]
        path: bool,

        /// Print the effective configuration as TOML
        #[arg(long)]
        print: bool,
    },
}

struct DemoOptions {
    seconds: f64,
    duration: f64,
    surface: SurfaceSize,
    untagged_ms: bool,
    snapshot: Option<PathBuf>,
    config: Option<PathBuf>,
}

async fn run_demo(options: DemoOptions) -> Result<()> {
    let config = match &options.config {
        Some(path) => RibbonConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RibbonConfig::load(),
    };

    let started = Instant::now();
    let (events_tx, events_rx) = mpsc::channel(64);
    let engine = SyntheticEngine::new(events_tx, config.band_count, started);
    let playback = SimulatedPlayback::new(started, options.duration, options.untagged_ms);

    let ribbon = Ribbon::new(config, options.surface, Box::new(engine), Box::new(playback));
    let sink = CountingSink::default();
    let presented = sink.counter();

    let mut session = RibbonSession::new(ribbon, sink);
    session.listen(events_rx);
    session.start();

    eprintln!(
        "Rendering {:.1}s of a {} track at {:?}",
        options.seconds,
        if options.duration > 0.0 {
            format!("{:.0}s", options.duration)
        } else {
            "unknown-length".to_string()
        },
        options.surface.physical()
    );
    tokio::time::sleep(Duration::from_secs_f64(options.seconds.max(0.0))).await;

    let snapshot = session.snapshot();
    let stats = session.stats();
    let ingest = session.ingest_stats();
    session.teardown();

    println!("ticks:            {}", stats.ticks);
    println!("frames presented: {}", presented.load(Ordering::Relaxed));
    println!("columns painted:  {}", stats.columns_painted);
    println!("history resets:   {}", stats.resets);
    println!("frames accepted:  {}", ingest.accepted);
    println!("frames dropped:   {}", ingest.dropped);

    if let Some(path) = options.snapshot {
        let pixmap = snapshot.context("No frame was composed")?;
        pixmap
            .save_png(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("snapshot:         {}", path.display());
    }

    Ok(())
}

fn show_config(path: bool, print: bool) -> Result<()> {
    let show_all = !path && !print;

    if path || show_all {
        match config_path() {
            Some(p) => println!("{}", p.display()),
            None => println!("No config directory available"),
        }
    }

    if print || show_all {
        let config = RibbonConfig::load();
        let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        print!("{}", text);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Demo {
            seconds,
            duration,
            width,
            height,
            scale,
            untagged_ms,
            snapshot,
            config,
        } => {
            run_demo(DemoOptions {
                seconds,
                duration,
                surface: SurfaceSize::new(width, height, scale),
                untagged_ms,
                snapshot,
                config,
            })
            .await
        }
        Commands::Config { path, print } => show_config(path, print),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
