//! Single-slot notification delivery.
//!
//! [`NotificationCenter`] serializes notifications from any number of
//! producers into one visible slot on one attached surface:
//!
//! - the newest admitted notification always wins the slot, and the one it
//!   replaces is closed first;
//! - non-sticky notifications close themselves after
//!   [`NotificationSettings::auto_dismiss`];
//! - while muted nothing is delivered;
//! - during the boot grace window, errors recognised by the
//!   [`BenignFilter`] are dropped;
//! - before a surface attaches, the latest notification waits in a
//!   one-element pending slot.
//!
//! Every submission returns a [`ClosedHandle`] that resolves exactly once,
//! including for notifications that were never shown.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use printdeck_core::ErrorClass;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::filter::BenignFilter;

/// Default lifetime of a non-sticky notification.
pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_secs(30);

/// Default length of the boot grace window.
pub const DEFAULT_BOOT_GRACE: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Error,
    Warning,
    Info,
}

/// A message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub heading: String,
    pub text: String,
    pub kind: NotificationKind,
    /// Sticky notifications stay until dismissed or replaced.
    pub sticky: bool,
    /// Classified failure that produced this notification, if any.
    pub cause: Option<ErrorClass>,
}

impl Notification {
    pub fn new(kind: NotificationKind, heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            text: text.into(),
            kind,
            sticky: false,
            cause: None,
        }
    }

    pub fn error(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, heading, text)
    }

    pub fn warning(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, heading, text)
    }

    pub fn info(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, heading, text)
    }

    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    pub fn with_cause(mut self, cause: ErrorClass) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// Why a notification left (or never entered) the visible slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    /// The auto-dismiss timer elapsed.
    TimedOut,
    /// The operator closed it.
    Dismissed,
    /// A newer notification took the slot.
    Superseded,
    /// Closed by `close_all` or a mute toggle.
    Cleared,
    /// Dropped during boot grace.
    Suppressed,
    /// Dropped because notifications are muted.
    Muted,
    /// The center was dropped before the notification closed.
    Shutdown,
}

/// Resolves once the submitted notification has closed.
#[derive(Debug)]
pub struct ClosedHandle {
    rx: oneshot::Receiver<CloseReason>,
}

impl ClosedHandle {
    /// The close reason, if the notification has already closed.
    pub fn try_reason(&mut self) -> Option<CloseReason> {
        match self.rx.try_recv() {
            Ok(reason) => Some(reason),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(CloseReason::Shutdown),
        }
    }
}

impl Future for ClosedHandle {
    type Output = CloseReason;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(CloseReason::Shutdown))
    }
}

// ---------------------------------------------------------------------------
// Surface protocol
// ---------------------------------------------------------------------------

/// What the surface renders for a visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    pub id: u64,
    pub heading: String,
    pub text: String,
    pub kind: NotificationKind,
    pub sticky: bool,
}

/// Instruction sent to the attached surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SurfaceEvent {
    /// Replace whatever is shown with this notification.
    Show(NotificationView),
    /// Hide the visible notification.
    Close,
}

pub type SurfaceReceiver = mpsc::UnboundedReceiver<SurfaceEvent>;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub auto_dismiss: Duration,
    pub boot_grace: Duration,
    /// Initial mute flag.
    pub muted: bool,
    pub filter: BenignFilter,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            auto_dismiss: DEFAULT_AUTO_DISMISS,
            boot_grace: DEFAULT_BOOT_GRACE,
            muted: false,
            filter: BenignFilter::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationCenter
// ---------------------------------------------------------------------------

/// An admitted notification together with its close signal.
struct Entry {
    id: u64,
    notification: Notification,
    closed: oneshot::Sender<CloseReason>,
}

impl Entry {
    fn view(&self) -> NotificationView {
        NotificationView {
            id: self.id,
            heading: self.notification.heading.clone(),
            text: self.notification.text.clone(),
            kind: self.notification.kind,
            sticky: self.notification.sticky,
        }
    }

    /// Consumes the entry, so the close signal can only fire once.
    fn close(self, reason: CloseReason) {
        tracing::debug!(id = self.id, ?reason, "Notification closed");
        let _ = self.closed.send(reason);
    }
}

struct Visible {
    entry: Entry,
    /// Auto-dismiss timer; `None` for sticky notifications.
    timer: Option<CancellationToken>,
}

impl Visible {
    fn close(self, reason: CloseReason) {
        if let Some(timer) = self.timer {
            timer.cancel();
        }
        self.entry.close(reason);
    }
}

#[derive(Default)]
struct State {
    visible: Option<Visible>,
    pending: Option<Entry>,
    surface: Option<mpsc::UnboundedSender<SurfaceEvent>>,
    muted: bool,
    next_id: u64,
}

struct Inner {
    state: Mutex<State>,
    settings: NotificationSettings,
    started: Instant,
}

/// Shared handle to the notification slot.
///
/// Cheap to clone; every clone refers to the same slot. Methods that arm the
/// auto-dismiss timer spawn a Tokio task and must run inside a runtime.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    /// Create a center; the boot grace window starts now.
    pub fn new(settings: NotificationSettings) -> Self {
        let state = State {
            muted: settings.muted,
            ..State::default()
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                settings,
                started: Instant::now(),
            }),
        }
    }

    /// Submit a notification for display.
    pub fn submit(&self, notification: Notification) -> ClosedHandle {
        let (tx, rx) = oneshot::channel();
        let handle = ClosedHandle { rx };
        let mut state = self.lock();

        if state.muted {
            tracing::debug!(heading = %notification.heading, "Notifications muted, dropping");
            let _ = tx.send(CloseReason::Muted);
            return handle;
        }

        if self.in_boot_grace() && self.inner.settings.filter.matches(&notification) {
            tracing::debug!(
                heading = %notification.heading,
                text = %notification.text,
                "Suppressing benign error during boot grace",
            );
            let _ = tx.send(CloseReason::Suppressed);
            return handle;
        }

        state.next_id += 1;
        let entry = Entry {
            id: state.next_id,
            notification,
            closed: tx,
        };

        if let Some(previous) = state.visible.take() {
            previous.close(CloseReason::Superseded);
        }
        self.deliver(&mut state, entry);
        handle
    }

    pub fn error(&self, heading: impl Into<String>, text: impl Into<String>) -> ClosedHandle {
        self.submit(Notification::error(heading, text))
    }

    pub fn warning(&self, heading: impl Into<String>, text: impl Into<String>) -> ClosedHandle {
        self.submit(Notification::warning(heading, text))
    }

    pub fn info(&self, heading: impl Into<String>, text: impl Into<String>) -> ClosedHandle {
        self.submit(Notification::info(heading, text))
    }

    /// Close the visible notification on behalf of the operator.
    ///
    /// Returns `false` if nothing was visible.
    pub fn dismiss(&self) -> bool {
        let mut state = self.lock();
        Self::close_visible(&mut state, CloseReason::Dismissed)
    }

    /// Stop delivering notifications and close the visible one.
    pub fn mute_all(&self) {
        let mut state = self.lock();
        state.muted = true;
        if let Some(pending) = state.pending.take() {
            pending.close(CloseReason::Muted);
        }
        Self::close_visible(&mut state, CloseReason::Cleared);
        tracing::info!("Notifications muted");
    }

    /// Resume delivering notifications and close the visible one.
    pub fn unmute_all(&self) {
        let mut state = self.lock();
        state.muted = false;
        Self::close_visible(&mut state, CloseReason::Cleared);
        tracing::info!("Notifications unmuted");
    }

    /// Close the visible notification and drop the pending one, if any.
    pub fn close_all(&self) {
        let mut state = self.lock();
        if let Some(pending) = state.pending.take() {
            pending.close(CloseReason::Cleared);
        }
        Self::close_visible(&mut state, CloseReason::Cleared);
    }

    pub fn is_muted(&self) -> bool {
        self.lock().muted
    }

    /// Whether the boot grace window is still open.
    pub fn in_boot_grace(&self) -> bool {
        self.inner.started.elapsed() < self.inner.settings.boot_grace
    }

    /// The notification currently shown, if any.
    pub fn visible(&self) -> Option<NotificationView> {
        self.lock().visible.as_ref().map(|v| v.entry.view())
    }

    /// Attach the surface that renders notifications.
    ///
    /// Replaces any previously attached surface. A visible or pending
    /// notification is shown on the new surface immediately.
    pub fn attach_surface(&self) -> SurfaceReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();

        if let Some(visible) = &state.visible {
            let _ = tx.send(SurfaceEvent::Show(visible.entry.view()));
        }
        state.surface = Some(tx);

        if let Some(pending) = state.pending.take() {
            tracing::debug!(id = pending.id, "Surface attached, delivering pending notification");
            self.deliver(&mut state, pending);
        }
        rx
    }

    // ---- private helpers ----

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Show `entry` on the surface, or park it until a surface attaches.
    fn deliver(&self, state: &mut State, entry: Entry) {
        let shown = state
            .surface
            .as_ref()
            .is_some_and(|surface| surface.send(SurfaceEvent::Show(entry.view())).is_ok());

        if !shown {
            if state.surface.take().is_some() {
                tracing::warn!("Notification surface detached");
            }
            if let Some(older) = state.pending.replace(entry) {
                older.close(CloseReason::Superseded);
            }
            return;
        }

        let timer = (!entry.notification.sticky).then(|| self.arm_timer(entry.id));
        tracing::debug!(
            id = entry.id,
            kind = ?entry.notification.kind,
            heading = %entry.notification.heading,
            "Notification visible",
        );
        state.visible = Some(Visible { entry, timer });
    }

    fn arm_timer(&self, id: u64) -> CancellationToken {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let delay = self.inner.settings.auto_dismiss;
        let center: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(inner) = center.upgrade() {
                        NotificationCenter { inner }.expire(id);
                    }
                }
            }
        });
        token
    }

    /// Auto-dismiss `id` if it is still the visible notification.
    fn expire(&self, id: u64) {
        let mut state = self.lock();
        if state.visible.as_ref().map(|v| v.entry.id) == Some(id) {
            Self::close_visible(&mut state, CloseReason::TimedOut);
        }
    }

    fn close_visible(state: &mut State, reason: CloseReason) -> bool {
        let Some(visible) = state.visible.take() else {
            return false;
        };
        visible.close(reason);
        if let Some(surface) = &state.surface {
            let _ = surface.send(SurfaceEvent::Close);
        }
        true
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(NotificationSettings::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
