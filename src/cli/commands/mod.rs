//! Subcommand implementations and their registry.
//!
//! Commands parse their own argument tail (already structured by clap),
//! validate required options, and enqueue tasks into the core. The registry
//! is an explicit enumeration so construction order is obvious.

use crate::cli::types::CommandArgs;
use crate::services::driver::Command;

pub mod download;
pub mod link;
pub mod play;
pub mod prepare;
pub mod run;
pub mod share;
pub mod show;
pub mod title;
pub mod update;

pub use download::DownloadCommand;
pub use link::LinkCommand;
pub use play::PlayCommand;
pub use prepare::PrepareCommand;
pub use run::RunCommand;
pub use share::ShareCommand;
pub use show::ShowCommand;
pub use update::UpdateCommand;

/// Every registered command with its one-line description.
pub const REGISTERED: &[(&str, &str)] = &[
    ("play", "Launch a game/animation"),
    ("download", "Download data packs for an entire playlist"),
    ("link", "Create a shortcut to a title"),
    ("prepare", "Obtain a title's data pack without playing it"),
    ("run", "Start services and run an arbitrary application"),
    (
        "share",
        "Generates a URL for starting a Flashpoint title that can be shared to other users.",
    ),
    ("show", "Display a message or extras folder"),
    ("update", "Check for and optionally install updates."),
];

/// Construct the command matching the parsed arguments.
pub fn acquire(args: CommandArgs) -> Box<dyn Command> {
    match args {
        CommandArgs::Play(args) => Box::new(PlayCommand::new(args)),
        CommandArgs::Download(args) => Box::new(DownloadCommand::new(args)),
        CommandArgs::Link(args) => Box::new(LinkCommand::new(args)),
        CommandArgs::Prepare(args) => Box::new(PrepareCommand::new(args)),
        CommandArgs::Run(args) => Box::new(RunCommand::new(args)),
        CommandArgs::Share(args) => Box::new(ShareCommand::new(args)),
        CommandArgs::Show(args) => Box::new(ShowCommand::new(args)),
        CommandArgs::Update(args) => Box::new(UpdateCommand::new(args)),
    }
}

/// Combined global help text.
pub fn global_help() -> String {
    let mut text = String::from(
        "Usage:\n\
         clifp <global options> command <command options>\n\n\
         Global Options:\n\
         -h | -? | --help: Prints this help message\n\
         -v | --version: Prints the current version of this tool\n\
         -q | --quiet: Silences all non-critical messages\n\
         -s | --silent: Silences all messages (takes precedence over quiet mode)\n\n\
         Commands:\n",
    );
    for (name, description) in REGISTERED {
        text.push_str(&format!("{name}: {description}\n"));
    }
    text.push_str("\nUse the -h switch after a command to see its specific usage notes");
    text
}

/// Version banner.
pub fn version_message() -> String {
    format!(
        "CLI Flashpoint {}, designed for use with Flashpoint Archive",
        env!("CARGO_PKG_VERSION")
    )
}
