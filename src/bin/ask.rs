//! ask - answer one command about recorded or synthetic detections

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use scene_assist::ingest::jsonl::{parse_frame, read_history};
use scene_assist::ingest::{FrameSource, MockSource, Scenario};
use scene_assist::{AssistConfig, Assistant};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// The command, e.g. "how many people on the left?".
    command: String,
    /// JSON file holding a single frame (array of detections).
    #[arg(long, conflicts_with_all = ["history", "scenario"])]
    frame: Option<PathBuf>,
    /// JSON-lines recording; the command is answered over its trailing window.
    #[arg(long, conflicts_with = "scenario")]
    history: Option<PathBuf>,
    /// Synthetic scenario to run for `--seconds` before answering.
    #[arg(long)]
    scenario: Option<String>,
    #[arg(long, default_value_t = 3.0)]
    seconds: f32,
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "ASSIST_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = AssistConfig::load_from(args.config.as_deref())?;
    let assistant = Assistant::from_config(&config);

    if let Some(path) = &args.frame {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read frame {}", path.display()))?;
        let frame = parse_frame(&raw)
            .with_context(|| format!("invalid frame {}", path.display()))?
            .sanitized(config.resolution);
        println!(
            "{}",
            assistant.respond_to_frame(&args.command, &frame, config.resolution)
        );
        return Ok(());
    }

    let buffer = config.buffer();
    if let Some(path) = &args.history {
        for frame in read_history(path)? {
            buffer.ingest(frame);
        }
    } else if let Some(name) = &args.scenario {
        if !(args.seconds.is_finite() && args.seconds > 0.0) {
            return Err(anyhow!("seconds must be > 0"));
        }
        let scenario: Scenario = name.parse()?;
        let frames = (args.seconds * config.fps).round() as u64;
        let mut source = MockSource::new(scenario, 60.0, config.fps, config.resolution)
            .with_limit(frames);
        while let Some(frame) = source.next_frame()? {
            buffer.ingest(frame);
        }
    } else {
        return Err(anyhow!("one of --frame, --history or --scenario is required"));
    }
    log::info!("answering over {} buffered frame(s)", buffer.len());
    println!("{}", assistant.respond(&args.command, &buffer));
    Ok(())
}
