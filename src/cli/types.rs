//! clap surface.
//!
//! Help and version are explicit flags instead of clap's auto-exit variants:
//! both are rendered through the directive bus so the whole pipeline stays
//! headless-testable, and subcommand help must short-circuit without touching
//! the task queue.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "clifp",
    about = "CLI companion for the Flashpoint web-game preservation archive",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", short_alias = '?', action = ArgAction::SetTrue)]
    pub help: bool,

    /// Prints the current version of this tool.
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue)]
    pub version: bool,

    /// Silences all non-critical messages.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Silences all messages (takes precedence over quiet mode).
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Option<CommandArgs>,
}

#[derive(Subcommand, Debug)]
pub enum CommandArgs {
    /// Launch a game/animation
    Play(PlayArgs),
    /// Download data packs for an entire playlist
    Download(DownloadArgs),
    /// Create a shortcut to a title
    Link(LinkArgs),
    /// Obtain a title's data pack without playing it
    Prepare(PrepareArgs),
    /// Start services and run an arbitrary application
    Run(RunArgs),
    /// Generate a sharable URL for a title
    Share(ShareArgs),
    /// Display a message or extras folder
    Show(ShowArgs),
    /// Check for and optionally install updates
    Update(UpdateArgs),
}

/// Title selection options shared by the title-oriented commands.
#[derive(Args, Debug, Clone, Default)]
pub struct TitleArgs {
    /// UUID of title to process
    #[arg(short = 'i', long = "id")]
    pub id: Option<String>,

    /// Title to process
    #[arg(short = 't', long = "title")]
    pub title: Option<String>,

    /// Same as -t, but exact matches only
    #[arg(short = 'T', long = "title-strict")]
    pub title_strict: Option<String>,

    /// Name of additional-app under the title to process. Must be used with -t / -T
    #[arg(short = 's', long = "subtitle")]
    pub subtitle: Option<String>,

    /// Same as -s, but exact matches only
    #[arg(short = 'S', long = "subtitle-strict")]
    pub subtitle_strict: Option<String>,

    /// Select a random title from the database. Must be followed by a library
    /// filter: all/any, game/arcade or animation/theatre
    #[arg(short = 'r', long = "random")]
    pub random: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct PlayArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    #[command(flatten)]
    pub title: TitleArgs,

    /// Flashpoint protocol URL of the title to start
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Runs the title in fullscreen mode, if supported.
    #[arg(short = 'f', long = "fullscreen")]
    pub fullscreen: bool,

    /// Forces the use of Ruffle for Flash games.
    #[arg(long = "ruffle")]
    pub ruffle: bool,

    /// Forces the use of the standard app (usually Flash Player) for Flash games.
    #[arg(long = "flash")]
    pub flash: bool,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct DownloadArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    /// Name of the playlist to preload data packs for
    #[arg(short = 'p', long = "playlist")]
    pub playlist: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct LinkArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    #[command(flatten)]
    pub title: TitleArgs,

    /// Directory to place the shortcut in
    #[arg(short = 'p', long = "path")]
    pub path: Option<PathBuf>,

    /// Name of the shortcut
    #[arg(short = 'n', long = "name")]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct PrepareArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    #[command(flatten)]
    pub title: TitleArgs,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    /// Relative (to the install) path of the application to launch
    #[arg(short = 'a', long = "app")]
    pub app: Option<String>,

    /// Command-line parameters to use when starting the application
    #[arg(short = 'p', long = "param")]
    pub param: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct ShareArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    #[command(flatten)]
    pub title: TitleArgs,

    /// Registers CLIFp at its current location to handle 'flashpoint://' links.
    #[arg(short = 'c', long = "configure")]
    pub configure: bool,

    /// Unregisters CLIFp as the 'flashpoint://' link handler if registered.
    #[arg(short = 'C', long = "unconfigure")]
    pub unconfigure: bool,

    /// Creates a share URL that utilizes an https redirect for increased portability.
    #[arg(short = 'u', long = "universal")]
    pub universal: bool,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct ShowArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    /// Displays a pop-up dialog with the supplied message.
    #[arg(short = 'm', long = "msg")]
    pub message: Option<String>,

    /// Opens an explorer window to the specified extra.
    #[arg(short = 'e', long = "extra")]
    pub extra: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct UpdateArgs {
    /// Prints this help message.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    /// Finish an in-progress update by swapping in the staged binary.
    #[arg(long = "install", value_name = "path")]
    pub install: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_play_by_url() {
        let cli = Cli::try_parse_from(vec![
            "clifp",
            "play",
            "-u",
            "flashpoint://11111111-2222-3333-4444-555555555555",
        ])
        .unwrap();

        match cli.command {
            Some(CommandArgs::Play(args)) => {
                assert_eq!(
                    args.url.as_deref(),
                    Some("flashpoint://11111111-2222-3333-4444-555555555555")
                );
                assert!(!args.fullscreen);
            }
            other => panic!("wrong command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_precede_command() {
        let cli = Cli::try_parse_from(vec!["clifp", "-q", "play", "-i", "abc"]).unwrap();
        assert!(cli.quiet);
        assert!(!cli.silent);
    }

    #[test]
    fn test_global_silent_and_subtitle_coexist() {
        let cli =
            Cli::try_parse_from(vec!["clifp", "-s", "play", "-t", "Game", "-s", "Extras"]).unwrap();
        assert!(cli.silent);
        match cli.command {
            Some(CommandArgs::Play(args)) => {
                assert_eq!(args.title.title.as_deref(), Some("Game"));
                assert_eq!(args.title.subtitle.as_deref(), Some("Extras"));
            }
            other => panic!("wrong command {other:?}"),
        }
    }

    #[test]
    fn test_help_flag_without_command() {
        let cli = Cli::try_parse_from(vec!["clifp", "--help"]).unwrap();
        assert!(cli.help);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_subcommand_help_does_not_exit() {
        let cli = Cli::try_parse_from(vec!["clifp", "play", "-h"]).unwrap();
        match cli.command {
            Some(CommandArgs::Play(args)) => assert!(args.help),
            other => panic!("wrong command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_command_is_parse_error() {
        assert!(Cli::try_parse_from(vec!["clifp", "frobnicate"]).is_err());
    }

    #[test]
    fn test_parse_share_configure() {
        let cli = Cli::try_parse_from(vec!["clifp", "share", "-c"]).unwrap();
        match cli.command {
            Some(CommandArgs::Share(args)) => assert!(args.configure),
            other => panic!("wrong command {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_with_params() {
        let cli = Cli::try_parse_from(vec![
            "clifp",
            "run",
            "-a",
            "Server/php",
            "-p",
            "-S localhost:22500",
        ])
        .unwrap();
        match cli.command {
            Some(CommandArgs::Run(args)) => {
                assert_eq!(args.app.as_deref(), Some("Server/php"));
                assert_eq!(args.param.as_deref(), Some("-S localhost:22500"));
            }
            other => panic!("wrong command {other:?}"),
        }
    }

    #[test]
    fn test_parse_random_filter() {
        let cli = Cli::try_parse_from(vec!["clifp", "play", "-r", "game"]).unwrap();
        match cli.command {
            Some(CommandArgs::Play(args)) => {
                assert_eq!(args.title.random.as_deref(), Some("game"));
            }
            other => panic!("wrong command {other:?}"),
        }
    }
}
