use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use chat_pacing::{pacing_style, FragmentEvent, PacingConfig, ResponsePacer, ResponsePayload};
use clap::Parser;
use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pacing-cli")]
#[command(about = "Fragment a chat response and play it back at a human pace")]
#[command(version)]
struct Cli {
    /// Response text (read from stdin when omitted)
    text: Option<String>,

    /// Seed for reproducible fragmentation and timing
    #[arg(long)]
    seed: Option<u64>,

    /// Config file (.json or .toml) instead of the default lookup
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the fragments and pacing style without playing them
    #[arg(long)]
    split_only: bool,

    /// Emit JSON lines instead of colored output
    #[arg(long)]
    json: bool,

    /// Force-complete after the first fragment
    #[arg(long)]
    fast: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PacingConfig::from_path(path)?,
        None => PacingConfig::load()?,
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let text = match cli.text.clone() {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read response from stdin")?;
            buffer
        }
    };

    let pacer = ResponsePacer::new(&config);
    if cli.split_only {
        print_fragments(&pacer, &text, cli.json)?;
    } else {
        play(&pacer, &text, &cli).await?;
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .init();
}

fn print_fragments(pacer: &ResponsePacer, text: &str, json: bool) -> anyhow::Result<()> {
    let fragments = pacer.fragment(text);
    let style = pacing_style(&fragments);

    if json {
        let value = serde_json::json!({ "fragments": fragments, "pacing_style": style });
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    for (index, fragment) in fragments.iter().enumerate() {
        println!("{} {}", format!("[{}/{}]", index + 1, fragments.len()).dimmed(), fragment);
    }
    println!("{} {:?}", "pacing:".dimmed(), style);
    Ok(())
}

async fn play(pacer: &ResponsePacer, text: &str, cli: &Cli) -> anyhow::Result<()> {
    let sequencer = pacer.sequencer();
    let mut events = sequencer.subscribe();
    let sequence_id = pacer.deliver(ResponsePayload::new(text, "companion", "cli"))?;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => anyhow::bail!("Event stream closed"),
        };
        if event.sequence_id() != sequence_id {
            continue;
        }

        if cli.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{}", describe(&event));
        }

        if cli.fast && matches!(event, FragmentEvent::FragmentDisplayed { .. }) {
            sequencer.force_complete(&sequence_id);
        }
        if event.is_terminal() {
            break;
        }
    }
    Ok(())
}

fn describe(event: &FragmentEvent) -> String {
    match event {
        FragmentEvent::SequenceStarted { sequence } => format!(
            "{} {} fragments",
            "started".dimmed(),
            sequence.total()
        ),
        FragmentEvent::TypingStarted { delay_ms, .. } => {
            format!("{}", format!("  typing... ({} ms)", delay_ms).dimmed())
        }
        FragmentEvent::FragmentDisplayed { record } => {
            let bubble = format!("> {}", record.text).cyan().bold();
            if record.forced {
                format!("{} {}", bubble, "(forced)".yellow())
            } else {
                bubble.to_string()
            }
        }
        FragmentEvent::SequenceCompleted { sequence } => {
            format!("{} {}", "completed".green(), sequence.summary())
        }
        FragmentEvent::SequenceCancelled { sequence } => {
            format!("{} {}", "cancelled".red(), sequence.summary())
        }
    }
}
