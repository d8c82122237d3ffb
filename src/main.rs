//! CLIFp entry point.

use clap::error::ErrorKind;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;

use clifp::cli::commands;
use clifp::cli::frontend::ConsoleFrontend;
use clifp::cli::Cli;
use clifp::domain::directive::{AsyncDirective, Verbosity};
use clifp::domain::error::{ClifpError, CommandError};
use clifp::infrastructure::config::ConfigLoader;
use clifp::infrastructure::logging::{init_logging, prune_old_logs};
use clifp::services::director::Director;
use clifp::services::driver::{ControlRequest, Driver};

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return invocation_error_code(&e),
    };

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    let config = match ConfigLoader::load(&exe_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return invocation_code(&CommandError::InvalidArguments(e.to_string()).into());
        }
    };

    let log_guard = init_logging(&exe_dir, "clifp").ok();
    let _ = prune_old_logs(&exe_dir, "clifp", config.log.retention).await;

    let verbosity = if cli.silent {
        Verbosity::Silent
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Full
    };
    let (director, directive_rx) = Director::new(verbosity);

    // Help, version, and a missing command never start the pipeline.
    if cli.help || cli.version || cli.command.is_none() {
        let code = if cli.version {
            director.post_async(
                "core",
                AsyncDirective::Message {
                    text: commands::version_message(),
                    selectable: false,
                },
            );
            0
        } else if cli.help {
            director.post_async(
                "core",
                AsyncDirective::Message {
                    text: commands::global_help(),
                    selectable: false,
                },
            );
            0
        } else {
            let err: ClifpError =
                CommandError::InvalidArguments("no command was provided".into()).into();
            director.post_async("core", AsyncDirective::Error(err.details()));
            invocation_code(&err)
        };

        drop(director);
        ConsoleFrontend::new().run(directive_rx).await;
        return code;
    }

    let command = commands::acquire(cli.command.expect("checked above"));

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    spawn_interrupt_listener(control_tx);

    let driver = Driver::new(Arc::clone(&director), config, control_rx);
    driver.core().initialize(cli.quiet, cli.silent, &raw_args);
    drop(director);

    let worker = tokio::spawn(driver.drive(command));
    ConsoleFrontend::new().run(directive_rx).await;

    let code = worker.await.unwrap_or(1);
    drop(log_guard);
    code
}

/// Forward Ctrl-C to the worker as a quit request.
fn spawn_interrupt_listener(control_tx: mpsc::UnboundedSender<ControlRequest>) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if control_tx.send(ControlRequest::Quit).is_err() {
                return;
            }
        }
    });
}

fn invocation_error_code(e: &clap::Error) -> i32 {
    // Help/version never reach here (auto flags are disabled), so any parse
    // failure is a real invocation error.
    let err: ClifpError = match e.kind() {
        ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument => {
            CommandError::InvalidCommand(e.to_string()).into()
        }
        _ => CommandError::InvalidArguments(e.to_string()).into(),
    };
    eprintln!("{e}");
    invocation_code(&err)
}

fn invocation_code(err: &ClifpError) -> i32 {
    i32::try_from(err.code()).unwrap_or(i32::MAX)
}
