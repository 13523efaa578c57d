//! dashfetch CLI - Command-line interface
//!
//! Downloads segmented DASH media assets with the dashfetch library.

mod commands;
mod error;
mod runner;
mod ui;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use commands::batch::BatchArgs;
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use commands::inspect::InspectArgs;
use commands::track::TrackArgs;
use error::CliError;
use runner::GlobalOptions;

#[derive(Parser)]
#[command(name = "dashfetch")]
#[command(version, about = "Fetch segmented DASH media and reassemble it into one file", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.dashfetch/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a manifest and print what it addresses
    Inspect {
        /// Manifest file, or - for stdin
        manifest: PathBuf,

        /// Segment number token in the media template
        #[arg(long)]
        placeholder: Option<String>,

        /// List every segment URL
        #[arg(long)]
        urls: bool,
    },

    /// Download one asset from an encoded manifest
    Fetch {
        /// Manifest file, or - for stdin
        manifest: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Concurrent segment fetches
        #[arg(long)]
        workers: Option<usize>,

        /// Bearer token sent with every request
        #[arg(long)]
        token: Option<String>,

        /// Segment number token in the media template
        #[arg(long)]
        placeholder: Option<String>,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Resolve a track through the catalog API and download it
    Track {
        /// Track id
        id: u64,

        /// Audio quality (LOW, HIGH, LOSSLESS, HI_RES_LOSSLESS)
        #[arg(long)]
        quality: Option<String>,

        /// Access token for the catalog API
        #[arg(long)]
        token: String,

        /// Output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Track descriptor JSON used for naming and tagging
        #[arg(long)]
        track_json: Option<PathBuf>,

        /// Embed metadata and cover art with ffmpeg
        #[arg(long)]
        tag: bool,

        /// Concurrent segment fetches
        #[arg(long)]
        workers: Option<usize>,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Download every *.manifest file in a directory
    Batch {
        /// Directory of manifest files
        manifest_dir: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Jobs run at the same time
        #[arg(long)]
        jobs: Option<usize>,

        /// Concurrent segment fetches per job
        #[arg(long)]
        workers: Option<usize>,

        /// Bearer token sent with every request
        #[arg(long)]
        token: Option<String>,

        /// Segment number token in the media template
        #[arg(long)]
        placeholder: Option<String>,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalOptions {
        config: cli.config,
        verbose: cli.verbose,
        log_file: cli.log_file,
    };

    if let Err(e) = run(&global, cli.command) {
        ui::print_failure("error", &e);
        process::exit(e.exit_code());
    }
}

fn run(global: &GlobalOptions, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Inspect {
            manifest,
            placeholder,
            urls,
        } => commands::inspect::run(InspectArgs {
            manifest,
            placeholder,
            urls,
        }),
        Commands::Fetch {
            manifest,
            output,
            workers,
            token,
            placeholder,
            no_progress,
        } => commands::fetch::run(
            global,
            FetchArgs {
                manifest,
                output,
                workers,
                token,
                placeholder,
                no_progress,
            },
        ),
        Commands::Track {
            id,
            quality,
            token,
            output_dir,
            track_json,
            tag,
            workers,
            no_progress,
        } => commands::track::run(
            global,
            TrackArgs {
                track_id: id,
                quality,
                token,
                output_dir,
                track_json,
                tag,
                workers,
                no_progress,
            },
        ),
        Commands::Batch {
            manifest_dir,
            output,
            jobs,
            workers,
            token,
            placeholder,
            no_progress,
        } => commands::batch::run(
            global,
            BatchArgs {
                manifest_dir,
                output_dir: output,
                jobs,
                workers,
                token,
                placeholder,
                no_progress,
            },
        ),
        Commands::Config { command } => commands::config::run(global, command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_globals() {
        let cli = Cli::try_parse_from([
            "dashfetch", "-vv", "fetch", "a.manifest", "-o", "out.flac", "--workers", "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Fetch {
                output, workers, ..
            } => {
                assert_eq!(output, PathBuf::from("out.flac"));
                assert_eq!(workers, Some(2));
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_track_requires_token() {
        assert!(Cli::try_parse_from(["dashfetch", "track", "42"]).is_err());
    }
}
