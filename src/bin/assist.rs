//! assist - interactive scene assistant
//!
//! This binary:
//! 1. Feeds the temporal buffer from a synthetic scenario or a JSON-lines recording
//! 2. Reads commands from stdin, one per line
//! 3. Prints replies and hazard announcements until EOF or Ctrl-C

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use scene_assist::capture::{capture, Capture, ConsoleSink, LineSource, ReplySink};
use scene_assist::ingest::{
    spawn_feeder, FeederOptions, FrameSource, HazardWatch, JsonLinesSource, MockSource, Scenario,
};
use scene_assist::{AssistConfig, Assistant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Synthetic scenario: empty, person_lr, blink_dog, crowd_car.
    #[arg(long, default_value = "person_lr")]
    scenario: String,
    /// Scripted length of the scenario in seconds.
    #[arg(long, default_value_t = 60.0)]
    duration: f32,
    /// Do not restart the scenario after it goes idle.
    #[arg(long)]
    no_restart: bool,
    /// JSON-lines detection feed to replay instead of a scenario.
    #[arg(long)]
    feed: Option<PathBuf>,
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "ASSIST_CONFIG")]
    config: Option<PathBuf>,
    /// Milliseconds of frames to collect before the first prompt.
    #[arg(long, default_value_t = 500)]
    warmup_ms: u64,
}

enum Event {
    Input(Capture),
    Shutdown,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if !(args.duration.is_finite() && args.duration > 0.0) {
        return Err(anyhow!("duration must be > 0"));
    }
    let config = AssistConfig::load_from(args.config.as_deref())?;
    let buffer = Arc::new(config.buffer());
    let assistant = Assistant::from_config(&config);

    let source: Box<dyn FrameSource> = match &args.feed {
        Some(path) => Box::new(JsonLinesSource::open(path)?),
        None => {
            let scenario: Scenario = args.scenario.parse()?;
            Box::new(
                MockSource::new(scenario, args.duration, config.fps, config.resolution)
                    .with_auto_restart(!args.no_restart),
            )
        }
    };

    let (hazard_tx, hazard_rx) = mpsc::channel();
    let watch = HazardWatch::new(
        config.hazards.labels.clone(),
        config.threshold,
        config.hazards.cooldown,
    );
    let feeder = spawn_feeder(
        source,
        buffer.clone(),
        FeederOptions::new(config.frame_period()).with_hazards(watch, hazard_tx),
    )?;

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Event::Shutdown);
    })
    .expect("error setting Ctrl-C handler");

    // stdin blocks, so commands are read on their own thread and never joined
    std::thread::Builder::new()
        .name("commands".to_string())
        .spawn(move || {
            let mut source = LineSource::new(BufReader::new(std::io::stdin()));
            loop {
                let input = capture(&mut source);
                let closed = input == Capture::Closed;
                if tx.send(Event::Input(input)).is_err() || closed {
                    break;
                }
            }
        })
        .context("failed to spawn command reader")?;

    std::thread::sleep(Duration::from_millis(args.warmup_ms));
    let mut sink = ConsoleSink::new(std::io::stdout());
    sink.say("Assistant ready. Type a command and press Enter.")?;

    loop {
        while let Ok(announcement) = hazard_rx.try_recv() {
            sink.say(&announcement)?;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Event::Input(Capture::Command(text))) => {
                let reply = assistant.respond(&text, &buffer);
                sink.say(&reply)?;
            }
            Ok(Event::Input(Capture::Skip)) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Event::Input(Capture::Closed)) => {
                log::info!("input closed");
                break;
            }
            Ok(Event::Shutdown) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let frames = feeder.stop()?;
    log::info!("assist stopped after {} frame(s)", frames);
    Ok(())
}
