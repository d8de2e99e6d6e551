//! OctoPrint REST client and the synchronization core built on top of it.
//!
//! Provides the connection configuration, the [`Gateway`] seam and its
//! HTTP implementation, the job status poller that fans snapshots out to
//! observers, the command dispatcher, and folder browsing.

pub mod api;
pub mod commands;
pub mod config;
pub mod files;
pub mod poller;

pub use api::{Gateway, OctoPrintApi, OctoPrintApiError};
pub use commands::{Command, CommandChannel, CommandDispatcher, CommandOutcome};
pub use config::{ConfigError, ConfigProvider, EnvConfig};
pub use files::{FileBrowser, FileBrowserError, FolderListing};
pub use poller::{JobPoller, SnapshotUpdate};
