//! Console frontend.
//!
//! Consumes the directive stream on the main task while the driver runs on a
//! worker task. Obligations: render every async directive, acknowledge every
//! sync directive after rendering, and answer every request directive with a
//! typed response (the declared default when the user cancels).

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::domain::directive::{
    AsyncDirective, DirectiveResponse, RequestDirective, SyncDirective,
};
use crate::domain::error::{ErrorDetails, Severity};
use crate::services::director::{Directive, DirectiveReceiver};

pub struct ConsoleFrontend {
    input: Lines<BufReader<Stdin>>,
    progress: Option<ProgressBar>,
}

impl Default for ConsoleFrontend {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleFrontend {
    pub fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
            progress: None,
        }
    }

    /// Render directives until the backend closes the bus.
    pub async fn run(mut self, mut rx: DirectiveReceiver) {
        while let Some(directive) = rx.recv().await {
            match directive {
                Directive::Async { payload, .. } => self.render_async(payload),
                Directive::Sync { payload, ack, .. } => {
                    self.render_sync(&payload);
                    let _ = ack.send(());
                }
                Directive::Request { payload, reply, .. } => {
                    let response = self.answer_request(&payload).await;
                    let _ = reply.send(response);
                }
            }
        }

        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
    }

    fn render_async(&mut self, payload: AsyncDirective) {
        match payload {
            AsyncDirective::Message { text, .. } => println!("{text}"),
            AsyncDirective::Error(details) => print_error(&details),
            AsyncDirective::ProcedureStart { label } => {
                let bar = ProgressBar::new_spinner().with_message(label);
                bar.set_style(
                    ProgressStyle::with_template("{spinner} {msg} {bytes}/{total_bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                self.progress = Some(bar);
            }
            AsyncDirective::ProcedureStop => {
                if let Some(bar) = self.progress.take() {
                    bar.finish_and_clear();
                }
            }
            AsyncDirective::ProcedureScale { max } => {
                if let Some(bar) = &self.progress {
                    bar.set_length(max);
                }
            }
            AsyncDirective::ProcedureProgress { current } => {
                if let Some(bar) = &self.progress {
                    bar.set_position(current);
                }
            }
            AsyncDirective::ClipboardUpdate { text } => {
                println!("{text}");
            }
            AsyncDirective::StatusUpdate { heading, message } => {
                eprintln!("{} {message}", style(format!("[{heading}]")).bold());
            }
        }
    }

    fn render_sync(&self, payload: &SyncDirective) {
        match payload {
            SyncDirective::BlockingMessage { text, .. } => println!("{text}"),
        }
    }

    async fn answer_request(&mut self, payload: &RequestDirective) -> DirectiveResponse {
        match payload {
            RequestDirective::BlockingError {
                error,
                choices,
                default,
            } => {
                print_error(error);
                let names: Vec<String> = choices.iter().map(ToString::to_string).collect();
                eprint!("[{}] (default {default}): ", names.join("/"));
                let answer = self.read_line().await;
                let choice = choices
                    .iter()
                    .find(|c| c.to_string().eq_ignore_ascii_case(answer.trim()))
                    .copied()
                    .unwrap_or(*default);
                DirectiveResponse::Choice(choice)
            }
            RequestDirective::SaveFilename { caption, dir, .. } => {
                eprintln!("{caption}");
                eprint!("Filename (under {dir}): ");
                DirectiveResponse::Text(self.read_line().await.trim().to_string())
            }
            RequestDirective::ExistingDir {
                caption,
                starting_dir,
            } => {
                eprintln!("{caption}");
                eprint!("Directory [{starting_dir}]: ");
                let answer = self.read_line().await.trim().to_string();
                if answer.is_empty() {
                    DirectiveResponse::Text(starting_dir.clone())
                } else {
                    DirectiveResponse::Text(answer)
                }
            }
            RequestDirective::ItemSelection {
                caption,
                label,
                items,
            } => {
                eprintln!("{caption}");
                for (index, item) in items.iter().enumerate() {
                    eprintln!("  {}) {item}", index + 1);
                }
                eprint!("{label} (1-{}, empty to cancel): ", items.len());
                let answer = self.read_line().await;
                let selected = answer
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| (1..=items.len()).contains(n))
                    .map(|n| items[n - 1].clone());
                DirectiveResponse::Text(selected.unwrap_or_default())
            }
            RequestDirective::YesOrNo { question } => {
                eprint!("{question} [y/N]: ");
                let answer = self.read_line().await;
                DirectiveResponse::YesNo(matches!(
                    answer.trim().to_lowercase().as_str(),
                    "y" | "yes"
                ))
            }
        }
    }

    async fn read_line(&mut self) -> String {
        self.input
            .next_line()
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

fn print_error(details: &ErrorDetails) {
    let tag = match details.severity {
        Severity::Critical => style("CRITICAL").red().bold(),
        Severity::Error => style("ERROR").red(),
        Severity::Warning => style("WARNING").yellow(),
    };
    eprintln!("{tag}: {}", details.primary);
    if let Some(secondary) = &details.secondary {
        eprintln!("  {secondary}");
    }
    if let Some(blob) = &details.details {
        eprintln!("  {blob}");
    }
}
