use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use v4l_capture::log::TracingLogger;
use v4l_capture::{CaptureConfig, CaptureSession};

fn main() -> v4l_capture::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = CaptureConfig::from_env();
    println!("Using device: {}\n", config.device.display());

    // Capture 10 frames by default
    let count = 10;

    let mut session = CaptureSession::from_config(&config, Arc::new(TracingLogger))?;
    println!("Capabilities:\n{}", session.capabilities());
    println!("Active format:\n{}\n", session.format());
    match session.params() {
        Ok(params) => println!("Active parameters:\n{}", params),
        Err(e) => eprintln!("{}", e),
    }

    println!("Supported formats:");
    for desc in session.enum_formats()? {
        println!("  {}", desc);
    }
    println!();

    let start = Instant::now();
    let mut bytes = 0;
    for frame in session.frames().take(count) {
        let frame = frame.map_err(|e| {
            if let Some(hint) = e.hint() {
                eprintln!("{}", hint);
            }
            e
        })?;
        bytes += frame.len();

        println!("Frame");
        println!("  sequence  : {}", frame.meta().sequence);
        println!("  timestamp : {}", frame.meta().timestamp);
        println!("  flags     : {}", frame.meta().flags);
        println!("  length    : {}", frame.len());
    }
    let elapsed = start.elapsed().as_secs_f64();

    session.close()?;

    println!();
    println!("FPS: {}", count as f64 / elapsed);
    println!("MB/s: {}", bytes as f64 / 1_048_576.0 / elapsed);

    Ok(())
}
