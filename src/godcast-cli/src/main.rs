//! Godcast CLI - AI Podcast Player
//!
//! A command-line player for generated debate episodes between history's
//! great minds.

use clap::Parser;
use colored::Colorize;
use godcast_core::{
    AudioSink, Catalog, DialogueClient, EpisodeOrchestrator, FileSink, GatewayConfig,
    PlaybackCallback, PlaybackController, PlaybackEvent, RodioSink, SynthesisClient,
    default_catalog,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "godcast",
    version,
    about = "AI Podcast Player - Listen to history's great minds debate",
    long_about = "A CLI player for Godcast episodes: generates a debate script for an episode's participants, synthesizes each turn, and plays the episode through."
)]
struct Cli {
    /// Episode to play (see --list for available episodes)
    #[arg(value_name = "EPISODE_ID", required_unless_present = "list")]
    episode: Option<String>,

    /// List available episodes and exit
    #[arg(short, long)]
    list: bool,

    /// Load the episode catalog from a TOML file instead of the built-in one
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Write each turn's audio to this directory instead of playing it
    #[arg(long, value_name = "DIR")]
    export: Option<PathBuf>,

    /// Number of turns each participant speaks
    #[arg(short, long, default_value = "2", value_name = "TURNS")]
    turns: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // Load the episode catalog
    let catalog = Arc::new(match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => default_catalog(),
    });

    if cli.list {
        print_episode_list(&catalog);
        return Ok(());
    }

    let Some(episode_id) = cli.episode.clone() else {
        // clap enforces the argument unless --list was given
        return Ok(());
    };

    let Some(episode) = catalog.episode(&episode_id).cloned() else {
        eprintln!(
            "{} Unknown episode '{}'. Run {} to see what is available.",
            "Error:".red().bold(),
            episode_id,
            "godcast --list".bold()
        );
        std::process::exit(1);
    };
    let participants = catalog.characters_for(&episode);

    // Get API configuration from environment
    let api_base = match env::var("GODCAST_API_BASE") {
        Ok(value) => value,
        Err(_) => {
            eprintln!(
                "{} GODCAST_API_BASE is not set. Point it at your gateway host, e.g. https://example.supabase.co",
                "Error:".red().bold()
            );
            std::process::exit(1);
        }
    };

    let api_key = env::var("GODCAST_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: GODCAST_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    // Validate turns
    let turns = cli.turns.max(1);
    if cli.turns < 1 {
        eprintln!(
            "{}",
            format!("Warning: Turns increased to minimum of 1 (was {}).", cli.turns).yellow()
        );
    }

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {}", "Godcast".bold(), episode.title)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), episode.topic.bright_white());
    println!();
    println!("{}", "Participants:".bold());
    for (i, character) in participants.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            character.name.bright_cyan(),
            format!("({})", character.era).dimmed()
        );
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());
    println!("{}", "  Generating dialogue...".dimmed());
    println!();

    // Pick the audio output: a file exporter or the default device
    let sink: Arc<dyn AudioSink> = match &cli.export {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Arc::new(FileSink::new(dir, episode_id.as_str()))
        }
        None => Arc::new(RodioSink::new()?),
    };

    let config = GatewayConfig::new(api_base, api_key);
    let generator = Arc::new(DialogueClient::new(config.clone())?);
    let synthesizer = Arc::new(SynthesisClient::new(config, Arc::clone(&catalog))?);

    let controller = PlaybackController::new(synthesizer, sink);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    controller.set_callback(create_console_callback(Arc::clone(&catalog), done_tx));

    let orchestrator = EpisodeOrchestrator::new(Arc::clone(&catalog), generator, controller)
        .with_turns_per_participant(turns);

    // Generate the script and start playback
    orchestrator.play_episode(&episode_id).await?;

    // Auto-advance walks the remaining turns; wait for the outcome
    match done_rx.recv().await {
        Some(Ok(())) => {}
        Some(Err(_)) => std::process::exit(1),
        None => {}
    }

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Episode concluded.".bright_green().bold());
    if let Some(dir) = &cli.export {
        println!(
            "{}",
            format!("  Turn audio saved to {}", dir.display()).bright_green()
        );
    }
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Print the catalog's episodes, featured ones first.
fn print_episode_list(catalog: &Catalog) {
    println!();
    println!("{}", "Episodes:".bold());
    let mut episodes: Vec<_> = catalog.episodes().iter().collect();
    episodes.sort_by_key(|episode| !episode.is_featured);
    for episode in episodes {
        let marker = if episode.is_featured {
            "★".yellow().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "  {} {} {}",
            marker,
            format!("{:<24}", episode.id).bright_cyan(),
            format!("{} ({}, {} speakers)", episode.title, episode.duration, episode.participants.len())
                .dimmed()
        );
    }
    println!();
}

/// Create a callback that prints playback events to the console and
/// reports the episode's outcome on `done`.
fn create_console_callback(
    catalog: Arc<Catalog>,
    done: mpsc::UnboundedSender<Result<(), String>>,
) -> PlaybackCallback {
    Box::new(move |event| match event {
        PlaybackEvent::TurnLoading { .. } => {
            // Quiet; the turn prints once its audio starts.
        }
        PlaybackEvent::TurnStarted { index, turn } => {
            let name = catalog
                .character(&turn.character_id)
                .map(|character| character.name.clone())
                .unwrap_or_else(|| turn.character_id.clone());
            println!(
                "{} {} {}",
                format!("▶ {}.", index + 1).bright_cyan(),
                name.bright_cyan().bold(),
                format!("[{}]", format_timestamp(turn.timestamp_ms)).dimmed()
            );
            print_wrapped(&turn.content, 66, "  ");
            println!();
        }
        PlaybackEvent::TurnFailed { index, message } => {
            eprintln!(
                "{} Turn {} failed: {}",
                "Error:".red().bold(),
                index + 1,
                message
            );
            let _ = done.send(Err(message));
        }
        PlaybackEvent::EpisodeFinished => {
            let _ = done.send(Ok(()));
        }
    })
}

/// Word-wrap a turn's content to `width` columns, printing each line
/// behind `indent`.
fn print_wrapped(text: &str, width: usize, indent: &str) {
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + word.len() + 1 > width {
            println!("{indent}{line}");
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        println!("{indent}{line}");
    }
}

/// Render a turn's display timestamp as m:ss.
fn format_timestamp(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
