//! Recognition of benign startup errors.
//!
//! While the printer server (or the printer behind it) is still coming up,
//! status requests fail with connection-level errors that say nothing useful
//! to the operator. [`BenignFilter`] identifies them so the notification
//! center can hide them during its boot grace window.

use std::sync::LazyLock;

use printdeck_core::ErrorClass;
use regex::RegexSet;

use crate::notify::{Notification, NotificationKind};

/// Message tails produced by a request that received no response at all.
const DEFAULT_SIGNATURES: &[&str] = &[r"0 Unknown Error$"];

static DEFAULT_SET: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(DEFAULT_SIGNATURES).expect("valid regex"));

/// Matches error notifications caused by a not-yet-reachable device.
#[derive(Debug, Clone)]
pub struct BenignFilter {
    signatures: RegexSet,
}

impl BenignFilter {
    /// Build a filter from custom message patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            signatures: RegexSet::new(patterns)?,
        })
    }

    /// Whether `notification` is a benign startup error.
    ///
    /// Only errors qualify. A transient network cause matches regardless of
    /// the message; otherwise the text is checked against the signatures.
    pub fn matches(&self, notification: &Notification) -> bool {
        if notification.kind != NotificationKind::Error {
            return false;
        }
        notification.cause == Some(ErrorClass::TransientNetwork)
            || self.signatures.is_match(&notification.text)
    }
}

impl Default for BenignFilter {
    fn default() -> Self {
        Self {
            signatures: DEFAULT_SET.clone(),
        }
    }
}
