//! Printer status domain model and payload normalization.
//!
//! Pure types and functions shared by the polling, notification and command
//! layers:
//!
//! - [`error`]: the gateway failure taxonomy ([`ErrorClass`], [`GatewayError`]).
//! - [`raw`]: tolerant serde shapes of the OctoPrint REST payloads.
//! - [`normalize`]: raw payloads to [`JobSnapshot`] and [`FolderEntry`] lists.
//! - [`format`]: duration, clock and filament formatting.

pub mod error;
pub mod format;
pub mod job;
pub mod normalize;
pub mod raw;

pub use error::{ErrorClass, GatewayError};
pub use format::{FilamentProfile, FormattedDuration, UNKNOWN_TIME};
pub use job::{JobSnapshot, PrinterState};
pub use normalize::{normalize, normalize_file_entry, normalize_folder, FolderEntry, NormalizeContext};
pub use raw::{RawFileEntry, RawFolderListing, RawJobStatus};
