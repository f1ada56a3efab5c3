//! Headless recorder host.
//!
//! Runs the engine against the synthetic capture host and the built-in
//! y4m encoder, records for a fixed duration and writes the result to the
//! output directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recorder_capture::{SourceCatalog, SyntheticConfig, SyntheticHost};
use recorder_compositor::format_elapsed_long;
use recorder_encoder::RawVideoBackend;
use recorder_engine::{
    load_settings, DirectoryRecordingSink, EngineHandle, EngineHosts, FileSettingsStore,
    TracingUiHost,
};
use recorder_ipc::{LayoutMode, RecorderCommand, RecorderEvent};

/// How long to wait for the engine to answer a command.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Layout {
    Pip,
    CameraOnly,
    CameraBig,
}

impl From<Layout> for LayoutMode {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Pip => LayoutMode::ScreenWithCameraPip,
            Layout::CameraOnly => LayoutMode::CameraOnly,
            Layout::CameraBig => LayoutMode::CameraBig,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "recorder", about = "Record the screen and camera to a file")]
struct Cli {
    /// Settings file, created on first save.
    #[arg(long, env = "RECORDER_SETTINGS", default_value = "recorder-settings.json")]
    settings: PathBuf,

    /// Directory recordings are written to.
    #[arg(long, short, env = "RECORDER_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Recording length in seconds.
    #[arg(long, short, default_value_t = 5)]
    duration: u64,

    /// Override the saved layout.
    #[arg(long, value_enum)]
    layout: Option<Layout>,

    /// Source to record; defaults to the last one used, then the first listed.
    #[arg(long)]
    source: Option<String>,

    /// Print the capture sources as JSON and exit.
    #[arg(long)]
    list_sources: bool,
}

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "recorder=debug,recorder_engine=debug,recorder_capture=debug,recorder_audio=debug,recorder_compositor=info,recorder_encoder=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    info!("Recorder starting");

    std::fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            cli.output_dir.display()
        )
    })?;

    let store = FileSettingsStore::new(&cli.settings);
    let mut settings = load_settings(&store);
    if let Some(layout) = cli.layout {
        settings.composition.layout = layout.into();
    }

    let engine = EngineHandle::spawn(EngineHosts {
        capture: Arc::new(SyntheticHost::new(SyntheticConfig::default())),
        encoder: Arc::new(RawVideoBackend::new()),
        settings_store: Box::new(store),
        ui: Arc::new(TracingUiHost),
        recording_sink: Box::new(DirectoryRecordingSink::new(&cli.output_dir)),
        preview: None,
    })
    .context("failed to spawn engine thread")?;
    let events = engine.events();
    wait_for(events, |e| matches!(e, RecorderEvent::Ready))?;

    send(&engine, RecorderCommand::RefreshSources)?;
    let RecorderEvent::Sources(sources) =
        wait_for(events, |e| matches!(e, RecorderEvent::Sources(_)))?
    else {
        bail!("unexpected response to RefreshSources");
    };

    if cli.list_sources {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        engine.shutdown();
        return Ok(());
    }

    if cli.layout.is_some() {
        send(
            &engine,
            RecorderCommand::UpdateSettings(Box::new(settings.clone())),
        )?;
    }

    let default_source = SourceCatalog::default_source(&sources).map(|s| s.id.clone());
    let source_id = cli
        .source
        .or_else(|| settings.last_source_id.clone())
        .or(default_source);
    let config = settings.recording_config(source_id);
    if let Some(source_id) = &config.source_id {
        send(
            &engine,
            RecorderCommand::SelectSource {
                source_id: source_id.clone(),
            },
        )?;
    }

    send(&engine, RecorderCommand::Start { config })?;
    let started = wait_for(events, |e| {
        matches!(e, RecorderEvent::StateChanged { current, .. } if current.is_recording())
            || matches!(e, RecorderEvent::FatalError { .. })
    })?;
    if let RecorderEvent::FatalError { kind, detail } = started {
        engine.shutdown();
        bail!("recording failed to start ({kind:?}): {detail}");
    }
    info!(seconds = cli.duration, "Recording");

    watch(events, Duration::from_secs(cli.duration));

    send(&engine, RecorderCommand::Stop)?;
    let finalized = wait_for(events, |e| {
        matches!(e, RecorderEvent::RecordingFinalized { .. })
    })?;
    if let RecorderEvent::RecordingFinalized {
        mime_type,
        duration_ms,
        size_bytes,
        audio_size_bytes,
        ..
    } = finalized
    {
        println!(
            "Recorded {} ({} bytes, {}) into {}",
            format_elapsed_long(duration_ms),
            size_bytes,
            mime_type,
            cli.output_dir.display()
        );
        if let Some(audio_bytes) = audio_size_bytes {
            println!("Audio saved alongside ({audio_bytes} bytes)");
        }
    }

    engine.shutdown();
    info!("Recorder stopped");
    Ok(())
}

fn send(engine: &EngineHandle, command: RecorderCommand) -> Result<()> {
    let name = command.name();
    if !engine.send(command) {
        bail!("engine stopped before {name} could be sent");
    }
    Ok(())
}

/// Wait for the first event matching `pred`, logging the ones skipped.
fn wait_for(
    events: &Receiver<RecorderEvent>,
    pred: impl Fn(&RecorderEvent) -> bool,
) -> Result<RecorderEvent> {
    let deadline = Instant::now() + RESPONSE_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if pred(&event) => return Ok(event),
            Ok(event) => log_event(&event),
            Err(RecvTimeoutError::Timeout) => bail!("timed out waiting for the engine"),
            Err(RecvTimeoutError::Disconnected) => bail!("engine event channel closed"),
        }
    }
}

/// Log events until `duration` has passed.
fn watch(events: &Receiver<RecorderEvent>, duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match events.recv_timeout(remaining) {
            Ok(event) => log_event(&event),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Engine event channel closed");
                break;
            }
        }
    }
}

fn log_event(event: &RecorderEvent) {
    match event {
        RecorderEvent::Metrics(m) => info!(
            fps = m.fps,
            encoded = m.frames_encoded,
            bytes = m.bytes_recorded,
            "Metrics"
        ),
        RecorderEvent::PerformanceWarning(w) => warn!(?w, "Performance warning"),
        RecorderEvent::CommandRejected { command, kind } => {
            warn!(command, ?kind, "Command rejected")
        }
        RecorderEvent::FatalError { kind, detail } => warn!(?kind, detail, "Fatal error"),
        other => debug!(?other, "Event"),
    }
}
