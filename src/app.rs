//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// A live call assistant that streams screen and audio capture to a cloud AI model
#[derive(Parser)]
#[command(name = "sidecoach")]
#[command(version)]
#[command(about = "Live call assistant: stream screen and audio to an AI model")]
#[command(
    long_about = "sidecoach captures your screen and audio during a call or interview,\nstreams the media to a cloud AI model and prints incremental responses.\n\nDEFAULT COMMAND:\n    If no command is specified, 'run' is used by default.\n\nEXAMPLES:\n    # Start an assist session with the configured preferences\n    $ sidecoach\n    $ sidecoach run\n\n    # Start a session for a sales call, speaker audio only\n    $ sidecoach run --profile sales --audio-mode speaker_only\n\n    # List audio input devices for the microphone setting\n    $ sidecoach list-devices\n\n    # Browse transcripts of previous sessions\n    $ sidecoach transcripts\n\n    # Edit configuration file\n    $ sidecoach config"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/sidecoach/sidecoach.toml\n    API key:            SIDECOACH_API_KEY or ~/.config/sidecoach/credentials\n    Logs:               ~/.local/state/sidecoach/sidecoach.log.*\n\nFor more information, visit: https://github.com/kristoferlund/sidecoach"
)]
struct Cli {
    /// Assistant profile to use for this session (run default command)
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Audio mode: speaker_only, mic_only or both (run default command)
    #[arg(short, long, value_name = "MODE", global = true)]
    audio_mode: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an assist session (default)
    ///
    /// Captures screen and audio per your configured preferences and streams
    /// them to the assistant. Type a line to send a follow-up question,
    /// '/shot' to send a screenshot, Ctrl-C to end the session.
    #[command(visible_alias = "r")]
    Run {
        /// Assistant profile (e.g. interview, sales, meeting)
        #[arg(short, long)]
        profile: Option<String>,

        /// Audio mode: speaker_only, mic_only or both
        #[arg(short, long, value_name = "MODE")]
        audio_mode: Option<String>,
    },

    /// Browse transcripts of previous sessions
    ///
    /// Prints the stored responses of recent sessions, most recent first.
    #[command(visible_alias = "t")]
    Transcripts {
        /// Number of sessions to show
        #[arg(value_name = "N")]
        count: Option<usize>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Edit session preferences, audio settings and the assistant endpoint.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the microphone device in sidecoach.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    ///
    /// Examples:
    ///   sidecoach completions bash > sidecoach.bash
    ///   sidecoach completions zsh > _sidecoach
    ///   sidecoach completions fish > sidecoach.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails (e.g., session start, transcript viewing)
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "sidecoach", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    // Initialize logging for all other commands
    logging::init_logging()?;

    // Route to appropriate command handler
    match cli.command {
        None | Some(Commands::Run { .. }) => {
            // Default command is run
            // Merge top-level options with explicit run command options
            // If both are specified, the explicit run command options take precedence
            let (profile, audio_mode) = match cli.command {
                Some(Commands::Run {
                    profile,
                    audio_mode,
                }) => (profile, audio_mode),
                None => (cli.profile, cli.audio_mode),
                _ => unreachable!(),
            };
            commands::handle_run(profile, audio_mode).await?;
        }
        Some(Commands::Transcripts { count }) => {
            commands::handle_transcripts(count)?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
