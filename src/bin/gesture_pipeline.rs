use clap::Parser;
use ensemble_copilot::config::Config;
use ensemble_copilot::gesture::emit::GestureEmitter;
use ensemble_copilot::gesture::landmarks::HandObservation;
use ensemble_copilot::gesture::source::{select_source, CameraFrame, LandmarkDetector};
use ensemble_copilot::gesture::GesturePipeline;
use log::{info, warn};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "gesture-pipeline")]
#[command(about = "Reads hand landmarks from a camera and posts classified gestures to the coordination server")]
struct Cli {
    /// Camera source string (device path, MJPEG URL, or similar)
    #[arg(long)]
    camera_src: Option<String>,

    /// Coordination server base URL to POST gestures to
    #[arg(long)]
    server_url: Option<String>,
}

/// Placeholder landmark detector used until a real hand-tracking model is
/// wired in: always reports no hand, so the pipeline degrades to clearing
/// its buffers every frame rather than fabricating gesture events.
struct NoHandDetector;

impl LandmarkDetector for NoHandDetector {
    fn detect(&mut self, _frame: &CameraFrame) -> Option<HandObservation> {
        None
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let camera_src = cli.camera_src.or(config.camera_src).unwrap_or_else(|| "0".to_string());
    let server_url = cli
        .server_url
        .or(config.server_url)
        .unwrap_or_else(|| "http://localhost:8000".to_string());
    let gestures_endpoint = format!("{}/gestures", server_url.trim_end_matches('/'));

    info!("═══════════════════════════════════════════════");
    info!("  GESTURE PIPELINE");
    info!("  Camera source: {camera_src}");
    info!("  Posting to: {gestures_endpoint}");
    info!("═══════════════════════════════════════════════");

    let source = select_source(&camera_src);
    if !source.is_opened() {
        warn!("no camera backend available for src={camera_src}");
        std::process::exit(1);
    }
    let detector: Box<dyn LandmarkDetector> = Box::new(NoHandDetector);
    let emitter = GestureEmitter::new(gestures_endpoint);
    let mut pipeline = GesturePipeline::new(source, detector, emitter);

    let start = Instant::now();
    let processed = pipeline.run(|| start.elapsed().as_secs_f64());
    info!("gesture pipeline exhausted after {processed} frames");
}
