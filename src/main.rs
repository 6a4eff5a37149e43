//! Command-line entry point for multicam-capture.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use multicam_capture::config::{CaptureConfig, FileConfig, Overrides};
use multicam_capture::probe;
use multicam_capture::{
    CameraCapture, CameraId, MultiCameraCapture, NokhwaBackend, Platform,
};

/// Capture timestamped JPEG frames from one or more cameras.
#[derive(Debug, Parser)]
#[command(name = "multicam-capture", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Cameras to capture from (indices or device names).
    #[arg(long, num_args = 1..)]
    cameras: Option<Vec<CameraId>>,

    /// Base output directory for saved frames.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Target frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Probe for working cameras and exit.
    #[arg(long)]
    list_cameras: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let platform = Platform::detect();
    info!(
        os = %platform.os,
        backend = %platform.backend(),
        jetson = platform.jetson,
        "platform resolved"
    );

    #[cfg(target_os = "macos")]
    nokhwa::nokhwa_initialize(|granted| {
        info!(granted, "camera permission callback");
    });

    let backend = NokhwaBackend::new(platform);

    if cli.list_cameras {
        return list_cameras(platform, &backend);
    }

    let file = FileConfig::load(&cli.config)?;
    let overrides = Overrides {
        cameras: cli.cameras,
        output_dir: cli.output,
        fps: cli.fps,
        duration: cli.duration,
    };
    let config = CaptureConfig::resolve(overrides, file)?;
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;
    info!(
        cameras = config.cameras.len(),
        fps = config.fps,
        output = %config.output_dir.display(),
        "starting capture"
    );

    if let [id] = config.cameras.as_slice() {
        run_single(backend, platform, &config, id.clone())
    } else {
        run_multi(backend, platform, &config)
    }
}

fn run_single(
    backend: NokhwaBackend,
    platform: Platform,
    config: &CaptureConfig,
    id: CameraId,
) -> anyhow::Result<()> {
    let mut capture = CameraCapture::new(backend, platform, id, &config.output_dir, config.fps)?;
    let stop = capture.stop_signal();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::Relaxed);
    })
    .context("installing interrupt handler")?;

    capture.run(config.duration_limit())?;
    Ok(())
}

fn run_multi(
    backend: NokhwaBackend,
    platform: Platform,
    config: &CaptureConfig,
) -> anyhow::Result<()> {
    let mut multi = MultiCameraCapture::new(
        backend,
        platform,
        config.cameras.clone(),
        config.output_dir.clone(),
        config.fps,
    );
    let stop = multi.shutdown_signal();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::Relaxed);
    })
    .context("installing interrupt handler")?;

    multi.run(config.duration_limit())?;
    Ok(())
}

fn list_cameras(platform: Platform, backend: &NokhwaBackend) -> anyhow::Result<()> {
    println!("Platform: {} ({})", platform.os, platform.backend());
    if platform.jetson {
        println!("Jetson board detected");
    }
    let working = probe::list_candidate_devices(platform, backend);
    if working.is_empty() {
        println!("No working cameras found");
    } else {
        println!("Working cameras:");
        for id in working {
            println!("  {id}  ({})", platform.device_address(&id));
        }
    }
    Ok(())
}
