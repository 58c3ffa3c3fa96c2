//! Notesmith command-line host.
//!
//! Drives the `ns-llm` assistants from a terminal: streamed chat, image
//! generation, transcription and speech.

mod commands;
mod config;
mod host;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(name = "notesmith", version, about = "Chat, image and speech helpers for your notes")]
struct Cli {
    /// Config file (default: ~/.notesmith/config.toml).
    #[arg(long, global = true, env = "NOTESMITH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a prompt (plus optional history and images) to the chat model.
    Chat(ChatArgs),
    /// Generate images from a prompt.
    Image(ImageArgs),
    /// Transcribe an audio file.
    Transcribe(TranscribeArgs),
    /// Synthesize speech and play it.
    Speak(SpeakArgs),
    /// Validate config and print the resolved provider settings.
    Doctor,
}

#[derive(Debug, Args)]
struct ChatArgs {
    /// Wait for the whole answer instead of streaming it.
    #[arg(long)]
    no_stream: bool,
    /// System prompt placed before the history.
    #[arg(long)]
    system: Option<String>,
    /// Image file to attach to the prompt; repeatable.
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,
    /// JSON file holding earlier turns: `[{"role": "...", "content": ...}]`.
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,
    #[arg(required = true)]
    prompt: Vec<String>,
}

#[derive(Debug, Args)]
struct ImageArgs {
    #[arg(long, default_value = ns_llm::HD_IMAGE_MODEL)]
    model: String,
    #[arg(long, default_value = "1024x1024")]
    size: String,
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    count: u32,
    /// Request HD quality (dall-e-3 only).
    #[arg(long)]
    hd: bool,
    #[arg(required = true)]
    prompt: Vec<String>,
}

#[derive(Debug, Args)]
struct TranscribeArgs {
    #[arg(long, default_value = "en")]
    language: String,
    file: PathBuf,
}

#[derive(Debug, Args)]
struct SpeakArgs {
    /// Where to write the audio (overrides `audio.output_path`).
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
    #[arg(required = true)]
    text: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();
    let cfg = config::NotesmithConfig::load(cli.config).await?;

    let result = match cli.command {
        Command::Chat(args) => {
            commands::chat(
                &cfg,
                commands::ChatOptions {
                    stream: !args.no_stream,
                    system: args.system,
                    images: args.images,
                    history: args.history,
                    prompt: args.prompt.join(" "),
                },
            )
            .await
        }
        Command::Image(args) => {
            commands::image(
                &cfg,
                ns_llm::ImageRequest {
                    model: args.model,
                    prompt: args.prompt.join(" "),
                    size: args.size,
                    count: args.count,
                    hd: args.hd,
                },
            )
            .await
        }
        Command::Transcribe(args) => commands::transcribe(&cfg, &args.file, &args.language).await,
        Command::Speak(args) => commands::speak(&cfg, &args.text.join(" "), args.out).await,
        Command::Doctor => commands::doctor(&cfg),
    };

    // Provider failures were already shown through the notifier.
    if let Err(e) = &result {
        if e.downcast_ref::<ns_llm::LlmError>().is_some() {
            std::process::exit(1);
        }
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" | "" => Ok(Self::Compact),
            other => Err(anyhow::anyhow!(
                "unsupported NOTESMITH_LOG_FORMAT={other:?}; expected json, pretty or compact"
            )),
        }
    }
}

const DEFAULT_LOG_FILTER: &str = "warn,notesmith=info,ns_app=info,ns_llm=info";

/// Logs go to stderr so command output on stdout stays pipeable.
fn init_tracing() -> anyhow::Result<()> {
    let format: LogFormat = std::env::var("NOTESMITH_LOG_FORMAT")
        .unwrap_or_default()
        .parse()?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Json => builder
            .with_span_events(FmtSpan::CLOSE)
            .with_file(true)
            .with_line_number(true)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init(),
        LogFormat::Pretty => builder
            .with_span_events(FmtSpan::CLOSE)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .init(),
        LogFormat::Compact => builder.compact().init(),
    }

    tracing::debug!(?format, "logging ready");
    Ok(())
}

/// Records panics through tracing before the default hook prints them.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let text = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string payload>");
        match info.location() {
            Some(loc) => {
                tracing::error!(file = loc.file(), line = loc.line(), payload = text, "panic")
            }
            None => tracing::error!(payload = text, "panic"),
        }
        previous(info);
    }));
}
