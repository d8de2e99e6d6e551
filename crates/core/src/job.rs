//! The print job domain model consumed by status displays.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::format::FormattedDuration;

/// Printer state as reported by the server.
///
/// Known states get their own variant; anything else is passed through
/// untouched in [`PrinterState::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterState {
    Operational,
    Printing,
    Pausing,
    Paused,
    Cancelling,
    Error,
    Offline,
    Other(String),
}

impl PrinterState {
    pub fn parse(state: &str) -> Self {
        match state {
            "Operational" => Self::Operational,
            "Printing" => Self::Printing,
            "Pausing" => Self::Pausing,
            "Paused" => Self::Paused,
            "Cancelling" => Self::Cancelling,
            "Error" => Self::Error,
            "Offline" => Self::Offline,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Operational => "Operational",
            Self::Printing => "Printing",
            Self::Pausing => "Pausing",
            Self::Paused => "Paused",
            Self::Cancelling => "Cancelling",
            Self::Error => "Error",
            Self::Offline => "Offline",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PrinterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Point-in-time view of the loaded print job.
///
/// Built once per poll cycle and shared read-only between observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub status: PrinterState,
    /// Display name without the file extension.
    pub filename: String,
    /// 0..=100.
    pub progress_percent: u8,
    /// Grams of filament the job needs; `None` if the server has no analysis.
    pub filament_amount: Option<f64>,
    pub time_left: FormattedDuration,
    pub time_printed: FormattedDuration,
    pub estimated_print_time: FormattedDuration,
    /// `HH:MM` computed when the snapshot was built.
    pub estimated_end_time: String,
}
