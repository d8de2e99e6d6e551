//! Fire-and-forget printer commands.
//!
//! [`CommandDispatcher::issue`] sends a command in the background. Commands
//! on the same [`CommandChannel`] replace each other: issuing a new one
//! cancels the still-pending previous one, so rapid repeated taps only send
//! the last command's outcome to the operator. Failures are reported through
//! the [`NotificationCenter`]; callers never see an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use printdeck_core::{ErrorClass, GatewayError};
use printdeck_events::{Notification, NotificationCenter};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::Gateway;
use crate::files::{clean_path, storage_path};
use crate::poller::JobPoller;

/// A state-changing request against the printer server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Cancel,
    /// Preheat plugin: heat to the configured profile.
    Preheat,
    /// Load a file for printing without starting it.
    SelectFile { path: String },
}

/// Commands on the same channel supersede each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandChannel {
    Job,
    Plugin,
    Files,
}

impl Command {
    pub fn channel(&self) -> CommandChannel {
        match self {
            Self::Start | Self::Pause | Self::Resume | Self::Cancel => CommandChannel::Job,
            Self::Preheat => CommandChannel::Plugin,
            Self::SelectFile { .. } => CommandChannel::Files,
        }
    }

    /// API path the command is posted to.
    pub fn path(&self) -> String {
        match self {
            Self::Start | Self::Pause | Self::Resume | Self::Cancel => "job".to_string(),
            Self::Preheat => "plugin/preheat".to_string(),
            Self::SelectFile { path } => storage_path(&clean_path(path)),
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Start => json!({ "command": "start" }),
            Self::Pause => json!({ "command": "pause", "action": "pause" }),
            Self::Resume => json!({ "command": "pause", "action": "resume" }),
            Self::Cancel => json!({ "command": "cancel" }),
            Self::Preheat => json!({ "command": "preheat" }),
            Self::SelectFile { .. } => json!({ "command": "select", "print": false }),
        }
    }

    /// Notification heading when the command fails.
    pub fn failure_heading(&self) -> &'static str {
        match self {
            Self::Start => "Can't start Job!",
            Self::Pause => "Can't pause Job!",
            Self::Resume => "Can't resume Job!",
            Self::Cancel => "Can't cancel Job!",
            Self::Preheat => "Can't preheat printer!",
            Self::SelectFile { .. } => "Can't load the file!",
        }
    }

    /// Explanation of a 409 response, for commands where it has a meaning.
    pub fn conflict_message(&self) -> Option<&'static str> {
        match self {
            Self::Start => Some("There is already a job running (409)"),
            Self::Pause => Some("There is no running job, that could be paused (409)"),
            Self::Resume => Some("There is no paused job, that could be resumed (409)"),
            Self::Cancel => Some("There is no running job, that could be cancelled (409)"),
            Self::Preheat | Self::SelectFile { .. } => None,
        }
    }

    /// Build the operator-facing notification for a failed request.
    pub fn failure_notification(&self, error: &GatewayError) -> Notification {
        let text = match self.conflict_message() {
            Some(message) if error.is_conflict() => message.to_string(),
            _ => error.message.clone(),
        };
        Notification::error(self.failure_heading(), text).with_cause(error.class)
    }
}

/// How an issued command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// The server rejected the request; a notification was submitted.
    Failed(ErrorClass),
    /// A newer command on the same channel replaced this one.
    Superseded,
}

struct Pending {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Channels {
    pending: HashMap<CommandChannel, Pending>,
    next_id: u64,
}

struct DispatcherInner {
    gateway: Arc<dyn Gateway>,
    notifications: NotificationCenter,
    poller: Option<JobPoller>,
    channels: Mutex<Channels>,
}

/// Issues commands and routes their failures into notifications.
#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<DispatcherInner>,
}

impl CommandDispatcher {
    pub fn new(gateway: Arc<dyn Gateway>, notifications: NotificationCenter) -> Self {
        Self::build(gateway, notifications, None)
    }

    /// Clear `poller`'s snapshot whenever a cancel succeeds.
    pub fn with_poller(
        gateway: Arc<dyn Gateway>,
        notifications: NotificationCenter,
        poller: JobPoller,
    ) -> Self {
        Self::build(gateway, notifications, Some(poller))
    }

    fn build(
        gateway: Arc<dyn Gateway>,
        notifications: NotificationCenter,
        poller: Option<JobPoller>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                gateway,
                notifications,
                poller,
                channels: Mutex::new(Channels::default()),
            }),
        }
    }

    /// Send `command` in the background.
    ///
    /// The returned handle may be dropped; it only exists for callers that
    /// want to observe the outcome.
    pub fn issue(&self, command: Command) -> JoinHandle<CommandOutcome> {
        let channel = command.channel();
        let cancel = CancellationToken::new();
        let id = {
            let mut channels = self.lock_channels();
            channels.next_id += 1;
            let id = channels.next_id;
            let pending = Pending {
                id,
                cancel: cancel.clone(),
            };
            if let Some(previous) = channels.pending.insert(channel, pending) {
                tracing::debug!(?channel, "Superseding pending command");
                previous.cancel.cancel();
            }
            id
        };

        tracing::info!(?command, "Issuing printer command");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let path = command.path();
            let result = tokio::select! {
                _ = cancel.cancelled() => return CommandOutcome::Superseded,
                result = inner.gateway.post(&path, command.body()) => result,
            };
            inner.finish(channel, id, &command, result)
        })
    }

    fn lock_channels(&self) -> std::sync::MutexGuard<'_, Channels> {
        self.inner.lock_channels()
    }
}

impl DispatcherInner {
    fn finish(
        &self,
        channel: CommandChannel,
        id: u64,
        command: &Command,
        result: Result<(), GatewayError>,
    ) -> CommandOutcome {
        {
            let mut channels = self.lock_channels();
            if channels.pending.get(&channel).map(|p| p.id) != Some(id) {
                // Replaced after the response arrived but before we got here.
                return CommandOutcome::Superseded;
            }
            channels.pending.remove(&channel);
        }

        match result {
            Ok(()) => {
                tracing::info!(?command, "Printer command accepted");
                if *command == Command::Cancel {
                    if let Some(poller) = &self.poller {
                        poller.clear();
                    }
                }
                CommandOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(?command, error = %e, class = ?e.class, "Printer command failed");
                self.notifications.submit(command.failure_notification(&e));
                CommandOutcome::Failed(e.class)
            }
        }
    }

    fn lock_channels(&self) -> std::sync::MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
