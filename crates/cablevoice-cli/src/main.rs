//! Console front end: type a line, hear it on the virtual audio cable.
//!
//! ```bash
//! cablevoice                 # per-user config or built-in defaults
//! cablevoice voice.toml      # explicit config file
//! RUST_LOG=debug cablevoice  # verbose pipeline logging
//! ```

mod console;

use anyhow::{Context, Result};
use cablevoice_core::{
    list_output_devices, AudioBackend, AudioDevice, CableVoiceConfig, CpalBackend,
    GoogleTranslateTts, InlineSpeaker, PipelineContext, PipelineMode, Session, ShutdownOutcome,
    StatusReceiver, StatusSender, Trigger, WorkQueue,
};
use console::Command;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// The trigger flavour selected by configuration
enum Frontend {
    Queued(WorkQueue),
    Inline(InlineSpeaker),
}

impl Frontend {
    fn trigger(&self) -> &dyn Trigger {
        match self {
            Self::Queued(queue) => queue,
            Self::Inline(speaker) => speaker,
        }
    }

    fn shutdown(self, timeout: Duration) -> ShutdownOutcome {
        match self {
            Self::Queued(mut queue) => queue.shutdown(timeout),
            Self::Inline(speaker) => {
                let deadline = Instant::now() + timeout;
                while speaker.is_busy() {
                    if Instant::now() >= deadline {
                        return ShutdownOutcome::TimedOut;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                ShutdownOutcome::Drained
            }
        }
    }
}

/// Load the given config file, or the per-user one, and validate it
fn load_config(path: Option<&Path>) -> Result<CableVoiceConfig> {
    let config =
        CableVoiceConfig::load_or_default(path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;

    let backend: Arc<dyn AudioBackend> = Arc::new(CpalBackend::new());
    let devices = list_output_devices(backend.as_ref()).unwrap_or_else(|e| {
        warn!("{}", e);
        Vec::new()
    });

    let (status, mut events) = StatusSender::channel();
    let session = Session::new(config.clone(), backend.as_ref(), status);
    let cable = session.cable_index();
    let synthesizer = Arc::new(
        GoogleTranslateTts::new(config.synthesis.clone())
            .context("Failed to create speech client")?,
    );

    let context = PipelineContext::new(session, synthesizer, Arc::clone(&backend));
    let frontend = match config.mode {
        PipelineMode::Queued => Frontend::Queued(WorkQueue::start(context)?),
        PipelineMode::Inline => Frontend::Inline(InlineSpeaker::new(context)),
    };
    info!("Cablevoice {} ready ({:?} mode)", cablevoice_core::VERSION, config.mode);

    println!("{}", console::HELP);
    match cable {
        Some(index) => println!("Speaking into device {index}."),
        None => println!("Cable '{}' not found; use /default.", config.device_name),
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(frontend.trigger(), &mut events, &devices, cable));
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();
    result?;

    println!("Finishing pending speech…");
    if frontend.shutdown(config.pipeline.shutdown_timeout()) == ShutdownOutcome::TimedOut {
        warn!("Exited with playback still running");
    }
    while let Ok(event) = events.try_recv() {
        println!("{}", console::render_event(&event));
    }
    Ok(())
}

async fn run(
    trigger: &dyn Trigger,
    events: &mut StatusReceiver,
    devices: &[AudioDevice],
    cable: Option<usize>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match console::parse(&line) {
                    Command::Speak { text, route } => {
                        if let Err(e) = trigger.speak(&text, route) {
                            println!("{}", e.status_text());
                        }
                    }
                    Command::Devices => println!("{}", console::render_devices(devices, cable)),
                    Command::Help => println!("{}", console::HELP),
                    Command::Quit => break,
                    Command::Unknown(name) => println!("Unknown command '/{name}', try /help"),
                }
            }
            Some(event) = events.recv() => {
                println!("{}", console::render_event(&event));
            }
        }
    }
    Ok(())
}
