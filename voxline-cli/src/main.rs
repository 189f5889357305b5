use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use voxline_core::dispatch::{cancel_pair, DispatchError, DispatchEvent, Dispatcher};
use voxline_core::settings::SettingsManager;
use voxline_core::tts::{create_provider, SynthesisRequest, VoicePreset};

mod input;
mod wav;

#[derive(Parser, Debug)]
#[command(name = "voxline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Voxline - rate-limited text-to-speech from the terminal")]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Text to speak (omit when using --file)
    text: Option<String>,

    /// Read the text from a file instead
    #[arg(long, value_name = "PATH", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Treat each blank-line separated paragraph as its own request
    #[arg(long)]
    batch: bool,

    /// Where to write the WAV output
    #[arg(long, short, value_name = "PATH", required = true)]
    out: Option<PathBuf>,

    /// Voice preset to use
    #[arg(long, value_parser = parse_voice)]
    voice: Option<VoicePreset>,

    /// Multi-speaker mapping, repeatable: --speaker Joe=Kore --speaker Jane=Puck
    #[arg(long = "speaker", value_name = "LABEL=VOICE", value_parser = input::parse_speaker)]
    speakers: Vec<(String, VoicePreset)>,

    /// Style directive merged ahead of the text, e.g. "Say cheerfully"
    #[arg(long)]
    style: Option<String>,

    /// Load settings from a specific profile
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    #[arg(long, value_name = "MS")]
    min_interval_ms: Option<u64>,

    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    #[arg(long, value_name = "MS")]
    retry_delay_ms: Option<u64>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the available voice presets and exit
    Voices,
}

fn parse_voice(value: &str) -> Result<VoicePreset, String> {
    value.parse()
}

fn main() -> Result<()> {
    setup_tracing()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    if let Some(Command::Voices) = args.command {
        for voice in VoicePreset::all() {
            println!("{:<14} {:?}", voice.name(), voice.gender());
        }
        return Ok(());
    }

    let out_base = args.out.clone().context("--out PATH is required")?;

    info!(
        "CLI startup: profile={:?}, batch={}, out={:?}",
        args.profile, args.batch, args.out
    );

    let texts = load_texts(&args)?;

    let settings_manager = SettingsManager::from_profile(args.profile.as_deref())?;
    let settings = settings_manager.settings();

    let mut config = settings.dispatcher.to_config();
    if let Some(ms) = args.min_interval_ms {
        config.min_interval = std::time::Duration::from_millis(ms);
    }
    if let Some(n) = args.max_retries {
        config.max_retries = n.max(1);
    }
    if let Some(ms) = args.retry_delay_ms {
        config.retry_delay = std::time::Duration::from_millis(ms);
    }

    let provider_config = settings
        .tts
        .active_tts()
        .with_context(|| {
            format!(
                "No active TTS provider configured in {:?}",
                settings_manager.path()
            )
        })?;
    let provider = create_provider(provider_config)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(provider, config).with_events(event_tx);
    tokio::spawn(report_events(event_rx));

    let (cancel_handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            cancel_handle.cancel();
        }
    });

    let style = args.style.clone().or(settings.default_style.clone());
    let voice = args.voice.unwrap_or(settings.default_voice);
    let speakers: BTreeMap<String, VoicePreset> = args.speakers.iter().cloned().collect();

    let total = texts.len();
    let mut failures = 0;

    for (index, text) in texts.into_iter().enumerate() {
        let mut request = SynthesisRequest::new(text);
        request = if speakers.is_empty() {
            request.with_voice(voice)
        } else {
            request.with_speakers(speakers.clone())
        };
        if let Some(style) = &style {
            request = request.with_style(style.clone());
        }

        let out = input::output_path(&out_base, index, total);

        match dispatcher.generate(&request, &cancel).await {
            Ok(audio) => {
                wav::write_wav(&out, &audio)?;
                eprintln!(
                    "[{}/{}] Wrote {:?} ({} ms of audio)",
                    index + 1,
                    total,
                    out,
                    audio.duration_ms()
                );
            }
            Err(e @ DispatchError::Cancelled { .. }) => {
                bail!("{e}");
            }
            Err(e @ DispatchError::ContentRejected { .. }) if total > 1 => {
                warn!(index, error = %e, "Skipping rejected paragraph");
                eprintln!("[{}/{}] Skipped: {e}", index + 1, total);
                failures += 1;
            }
            Err(e) => {
                error!(error = %e, "Synthesis failed");
                return Err(e.into());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {total} requests were rejected");
    }

    Ok(())
}

fn load_texts(args: &Args) -> Result<Vec<String>> {
    let text = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text from {path:?}"))?,
        (None, None) => bail!("Provide the text to speak or --file PATH"),
    };

    let texts = if args.batch {
        input::split_paragraphs(&text)
    } else {
        vec![text]
    };

    if texts.is_empty() {
        bail!("Nothing to speak");
    }
    Ok(texts)
}

async fn report_events(mut rx: mpsc::UnboundedReceiver<DispatchEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            DispatchEvent::RetryAttempt {
                attempt,
                max_retries,
                error,
                backoff_ms,
            } => {
                eprintln!(
                    "Retry attempt {}/{} in {}ms: {}",
                    attempt, max_retries, backoff_ms, error
                );
            }
            DispatchEvent::Throttled { waited_ms } => {
                info!(waited_ms, "Request throttled");
            }
            DispatchEvent::Succeeded { attempts } => {
                info!(attempts, "Request succeeded");
            }
        }
    }
}

fn setup_tracing() -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    let trace_dir = home.join(".voxline").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("voxline.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}
