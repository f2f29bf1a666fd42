use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use framegrab_core::pipeline::capture_config::CaptureConfig;
use framegrab_core::pipeline::capture_session::CaptureSession;
use framegrab_core::pipeline::statistics::FrameStats;
use framegrab_core::shared::constants::{
    CAMERA_RTSP_PORT, DEFAULT_CAMERA_IP, DEFAULT_QUALITY, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_WORKER_COUNT,
};
use framegrab_core::storage::frame_file_name::TimestampZone;
use framegrab_core::storage::latency_report::LatencyReport;

const STATUS_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Capture live video frames into timestamped image files.
#[derive(Parser)]
#[command(name = "framegrab")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture frames until Ctrl+C, --duration expiry or a fatal error.
    Capture(CaptureArgs),
    /// Summarise encode latencies of previously captured directories.
    Analyze {
        /// Capture directories to analyse.
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
}

#[derive(clap::Args)]
struct CaptureArgs {
    /// Stream URI (rtsp://..., or stub://name?fps=30 for a synthetic source).
    /// Defaults to the camera at --camera-ip.
    source: Option<String>,

    /// Directory receiving the captured frames.
    #[arg(long, short, default_value = "captured_frames")]
    output: PathBuf,

    /// Number of writer threads.
    #[arg(long, default_value_t = DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// JPEG quality (0-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY)]
    quality: u8,

    /// Frames buffered between capture and writers before dropping.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Render receive times in UTC instead of local time.
    #[arg(long)]
    utc: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Camera address used when no SOURCE is given.
    #[arg(long, default_value = DEFAULT_CAMERA_IP)]
    camera_ip: String,

    /// Camera stream index used when no SOURCE is given.
    #[arg(long, default_value_t = 0)]
    stream: u8,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Capture(args) => run_capture(args),
        Command::Analyze { dirs } => run_analyze(&dirs),
    }
}

fn run_capture(args: CaptureArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = args
        .source
        .clone()
        .unwrap_or_else(|| camera_uri(&args.camera_ip, args.stream));
    let zone = if args.utc {
        TimestampZone::Utc
    } else {
        TimestampZone::Local
    };
    let config = CaptureConfig::new(source, &args.output)
        .with_worker_count(args.workers)
        .with_quality(args.quality)
        .with_queue_capacity(args.queue_capacity)
        .with_timestamp_zone(zone);

    let session = CaptureSession::from_config(config)?;
    session.set_error_callback(|event| eprintln!("{event}"));

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    log::info!(
        "Capturing {} into {}",
        session.config().source_uri,
        args.output.display()
    );
    if !session.start() {
        return Err("failed to start capture".into());
    }

    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let started = Instant::now();
    let mut next_status = started + STATUS_INTERVAL;

    while session.is_running() && !interrupted.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Capture duration reached");
            break;
        }
        if Instant::now() >= next_status {
            print_status(started.elapsed(), &session.stats());
            next_status += STATUS_INTERVAL;
        }
        thread::sleep(SHUTDOWN_POLL);
    }

    if interrupted.load(Ordering::SeqCst) {
        log::info!("Interrupted, shutting down");
    }
    session.stop();

    let stats = session.stats();
    println!("Final statistics:");
    println!("  Captured: {}", stats.captured);
    println!("  Written:  {}", stats.written);
    println!("  Dropped:  {}", stats.dropped);
    println!("  Elapsed:  {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn run_analyze(dirs: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    for dir in dirs {
        analyze_dir(dir)?;
    }
    Ok(())
}

fn analyze_dir(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let report = LatencyReport::from_directory(dir)
        .map_err(|e| format!("cannot read {}: {e}", dir.display()))?;
    match report.summary_string() {
        Some(summary) => println!("{summary}"),
        None => println!("{}\n  No captured frames found", dir.display()),
    }
    if report.skipped > 0 {
        log::debug!("Skipped {} unrelated entries in {}", report.skipped, dir.display());
    }
    Ok(())
}

fn camera_uri(ip: &str, stream: u8) -> String {
    format!("rtsp://{ip}:{CAMERA_RTSP_PORT}/vis.{stream}")
}

fn print_status(elapsed: Duration, stats: &FrameStats) {
    println!("[{:>6.1}s] {stats}", elapsed.as_secs_f64());
}
