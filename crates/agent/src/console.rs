//! Line-based operator console.
//!
//! Stands in for the touchscreen buttons: each line read from the input is
//! parsed into a [`ConsoleCommand`] and executed against the sync core.
//!
//! ```text
//! start | pause | resume | cancel | preheat
//! select <path>      load a file without printing it
//! ls [path]          list a folder
//! info <path>        show a single file
//! status             log the current job snapshot
//! dismiss | mute | unmute
//! interval <ms>      change the polling interval
//! ```

use std::sync::Arc;
use std::time::Duration;

use printdeck_core::FolderEntry;
use printdeck_events::NotificationCenter;
use printdeck_octoprint::{
    Command, CommandDispatcher, ConfigProvider, EnvConfig, FileBrowser, JobPoller,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Printer(Command),
    List(String),
    Info(String),
    Status,
    Dismiss,
    Mute,
    Unmute,
    Interval(Duration),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid polling interval: {0}")]
    InvalidInterval(String),
}

/// Parse one console line.
pub fn parse(line: &str) -> Result<ConsoleCommand, ParseError> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));

    let argument = |name: &'static str| {
        if rest.is_empty() {
            Err(ParseError::MissingArgument(name))
        } else {
            Ok(rest.to_string())
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Err(ParseError::Empty),
        "start" => Ok(ConsoleCommand::Printer(Command::Start)),
        "pause" => Ok(ConsoleCommand::Printer(Command::Pause)),
        "resume" => Ok(ConsoleCommand::Printer(Command::Resume)),
        "cancel" => Ok(ConsoleCommand::Printer(Command::Cancel)),
        "preheat" => Ok(ConsoleCommand::Printer(Command::Preheat)),
        "select" => Ok(ConsoleCommand::Printer(Command::SelectFile {
            path: argument("select")?,
        })),
        "ls" => Ok(ConsoleCommand::List(if rest.is_empty() {
            "/".to_string()
        } else {
            rest.to_string()
        })),
        "info" => Ok(ConsoleCommand::Info(argument("info")?)),
        "status" => Ok(ConsoleCommand::Status),
        "dismiss" => Ok(ConsoleCommand::Dismiss),
        "mute" => Ok(ConsoleCommand::Mute),
        "unmute" => Ok(ConsoleCommand::Unmute),
        "interval" => {
            let value = argument("interval")?;
            match value.parse::<u64>() {
                Ok(ms) if ms > 0 => Ok(ConsoleCommand::Interval(Duration::from_millis(ms))),
                _ => Err(ParseError::InvalidInterval(value)),
            }
        }
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

/// Everything the console drives.
#[derive(Clone)]
pub struct Console {
    pub config: Arc<EnvConfig>,
    pub poller: JobPoller,
    pub dispatcher: CommandDispatcher,
    pub files: FileBrowser,
    pub notifications: NotificationCenter,
}

impl Console {
    /// Read and execute lines until the input ends.
    pub async fn run<R>(self, input: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse(&line) {
                    Ok(command) => self.execute(command).await,
                    Err(ParseError::Empty) => {}
                    Err(e) => tracing::warn!(error = %e, "Ignoring console input"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Console input failed");
                    break;
                }
            }
        }
        tracing::debug!("Console input closed");
    }

    pub async fn execute(&self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Printer(command) => {
                // Outcome is logged by the dispatcher; failures become notifications.
                drop(self.dispatcher.issue(command));
            }
            ConsoleCommand::List(path) => {
                // A newer `ls` supersedes this one while it is still pending.
                let files = self.files.clone();
                tokio::spawn(async move {
                    match files.folder(&path).await {
                        Ok(listing) => {
                            tracing::info!(path = %listing.path, entries = listing.entries.len(), "Folder");
                            for entry in &listing.entries {
                                log_entry(entry);
                            }
                        }
                        Err(e) => tracing::debug!(%path, error = %e, "Folder listing failed"),
                    }
                });
            }
            ConsoleCommand::Info(path) => match self.files.file(&path).await {
                Ok(entry) => log_entry(&entry),
                Err(e) => tracing::debug!(%path, error = %e, "File lookup failed"),
            },
            ConsoleCommand::Status => match self.poller.latest() {
                Some(Some(job)) => tracing::info!(
                    file = %job.filename,
                    status = %job.status,
                    progress = job.progress_percent,
                    left = %job.time_left.value,
                    ends_at = %job.estimated_end_time,
                    "Current job",
                ),
                Some(None) => tracing::info!("No job loaded"),
                None => tracing::info!("No status received yet"),
            },
            ConsoleCommand::Dismiss => {
                self.notifications.dismiss();
            }
            ConsoleCommand::Mute => {
                self.notifications.mute_all();
                self.config.set_notifications_muted(true);
            }
            ConsoleCommand::Unmute => {
                self.notifications.unmute_all();
                self.config.set_notifications_muted(false);
            }
            ConsoleCommand::Interval(interval) => {
                self.config.set_polling_interval(interval);
                tracing::info!(
                    interval_ms = self.config.polling_interval().as_millis() as u64,
                    "Polling interval changed",
                );
            }
        }
    }
}

fn log_entry(entry: &FolderEntry) {
    match entry {
        FolderEntry::Folder {
            path, child_count, ..
        } => tracing::info!(%path, children = ?child_count, "  [dir]"),
        FolderEntry::File {
            path,
            size_mb,
            print_time,
            filament_amount,
            date,
            ..
        } => tracing::info!(
            %path,
            size_mb = %size_mb,
            print_time = %print_time.value,
            filament_g = ?filament_amount,
            uploaded = ?date,
            "  [file]",
        ),
    }
}
