//! Symposium CLI - Moderated Philosophy Debates
//!
//! Runs a moderated debate between language-model philosophers and prints it
//! to the console as it happens.

use clap::{ArgAction, Parser};
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use symposium_core::{
    Config, DebateCallback, DebateEvent, DebateSession, NoteKind, OpenAiInference, Stage,
    default_config,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "symposium",
    version,
    about = "Symposium - Watch AI philosophers debate",
    long_about = "A CLI tool for running moderated debates between AI philosophers using OpenAI-compatible APIs."
)]
struct Cli {
    /// The topic to debate (overrides the config file)
    #[arg(value_name = "TOPIC")]
    topic: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// A speaker as NAME=STANCE (repeat for each speaker; replaces the configured roster)
    #[arg(short, long, action = ArgAction::Append, value_name = "NAME=STANCE")]
    speaker: Vec<String>,

    /// Maximum number of moderated rebuttal turns
    #[arg(short, long, value_name = "ROUNDS")]
    rounds: Option<u32>,

    /// Default model for every speaker
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Model for the moderator
    #[arg(long, value_name = "MODEL")]
    moderator_model: Option<String>,

    /// Skip the moderator's summary and commentary after each turn
    #[arg(long)]
    no_analysis: bool,

    /// Write the finished transcript to this file
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match resolve_config(&cli, &EnvOverrides::from_env()) {
        Ok(config) => config,
        Err(e) => fail(&e.to_string()),
    };
    tracing::debug!(
        api_base = %config.inference.api_base,
        model = %config.inference.model,
        speakers = config.speakers.len(),
        "resolved configuration"
    );

    let api_key = config.inference.api_key.clone().unwrap_or_else(|| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    let inference = OpenAiInference::new(
        &config.inference.api_base,
        &api_key,
        config.inference.model.clone(),
        config.inference.request_timeout(),
        config.inference.connect_timeout(),
    )?;

    let mut session = match DebateSession::new(
        config.session_config(),
        config.speakers.clone(),
        Arc::new(inference),
    ) {
        Ok(session) => session.with_callback(create_console_callback()),
        Err(e) => fail(&e.to_string()),
    };

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Symposium".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), session.state().topic().bright_white());
    println!();
    println!("{}", "Speakers:".bold());
    for (i, speaker) in session.roster().iter().enumerate() {
        println!(
            "  {}. {} ({}) - using {}",
            i + 1,
            speaker.name().bright_cyan(),
            speaker.stance().yellow(),
            speaker.model().unwrap_or(&config.inference.model).dimmed()
        );
    }
    println!(
        "{} {}",
        "Rounds:".bold(),
        session.state().round_budget().to_string().bright_white()
    );
    println!();
    println!("{}", "─".repeat(70).dimmed());

    // Run the debate
    let transcript = session.run().await;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!(
            "  Debate concluded after {} rebuttal turns.",
            session.state().rounds_completed()
        )
        .bright_green()
        .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    if let Some(path) = &cli.output {
        std::fs::write(path, transcript.render())?;
        println!("{} {}", "Transcript written to".dimmed(), path.display());
    }

    Ok(())
}

/// Logs go to stderr so the debate on stdout stays readable.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Connection settings read from the environment.
#[derive(Debug, Default)]
struct EnvOverrides {
    api_base: Option<String>,
    api_key: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            api_base: env::var("OPENAI_API_BASE")
                .or_else(|_| env::var("OPENAI_BASE_URL"))
                .ok(),
            api_key: env::var("OPENAI_API_KEY").ok(),
        }
    }
}

/// Config file (or the built-in default), then environment, then flags.
fn resolve_config(cli: &Cli, env: &EnvOverrides) -> Result<Config, symposium_core::DebateError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };

    apply_overrides(config, cli, env)
}

fn apply_overrides(
    mut config: Config,
    cli: &Cli,
    env: &EnvOverrides,
) -> Result<Config, symposium_core::DebateError> {
    if let Some(api_base) = &env.api_base {
        config.inference.api_base = api_base.clone();
    }
    if env.api_key.is_some() {
        config.inference.api_key = env.api_key.clone();
    }

    if let Some(topic) = &cli.topic {
        config.debate.topic = topic.clone();
    }
    if let Some(rounds) = cli.rounds {
        config.debate.rounds = rounds;
    }
    if cli.no_analysis {
        config.debate.analyze_turns = false;
    }
    if let Some(model) = &cli.model {
        config.inference.model = model.clone();
    }
    if cli.moderator_model.is_some() {
        config.inference.moderator_model = cli.moderator_model.clone();
    }
    if !cli.speaker.is_empty() {
        config.speakers = cli
            .speaker
            .iter()
            .map(|arg| Config::parse_speaker(arg))
            .collect::<Result<_, _>>()?;
    }

    Ok(config)
}

fn fail(message: &str) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message.red());
    std::process::exit(1);
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> DebateCallback {
    Box::new(move |event| match event {
        DebateEvent::StageChanged { stage } => {
            if stage == Stage::Done {
                return;
            }
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!(
                "{}",
                format!("  📢 {}", stage.to_string().to_uppercase())
                    .bright_magenta()
                    .bold()
            );
            println!("{}", "═".repeat(70).bright_magenta());
            println!();
        }
        DebateEvent::ModeratorNote { kind, text } => {
            let label = "MODERATOR:".bright_magenta().bold();
            match kind {
                NoteKind::Introduction | NoteKind::Announcement => {
                    let wrapped = textwrap(&text, 56);
                    for (i, line) in wrapped.lines().enumerate() {
                        if i == 0 {
                            println!("  {} {}", label, line.bright_magenta());
                        } else {
                            println!("             {}", line.bright_magenta());
                        }
                    }
                    println!();
                }
                NoteKind::Summary | NoteKind::Commentary => {
                    for line in textwrap(&text, 64).lines() {
                        println!("    {}", line.italic().dimmed());
                    }
                    println!();
                }
            }
        }
        DebateEvent::SpeakerStart { name, phase } => {
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                name.bright_cyan().bold(),
                format!("({})", phase).yellow()
            );
        }
        DebateEvent::SpeakerMessage { content, .. } => {
            // Word wrap and indent the content
            let wrapped = textwrap(&content, 66);
            for line in wrapped.lines() {
                println!("  {}", line);
            }
            println!();
        }
        DebateEvent::DebateEnd { .. } => {
            // Handled in main
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_line_len + word_len + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word_len;
    }

    result
}
