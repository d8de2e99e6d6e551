//! Fan-out and notification delivery for the printer display.
//!
//! - [`ReplayBus`]: broadcast that replays its latest value to new
//!   subscribers, used for job snapshots.
//! - [`NotificationCenter`]: the single visible notification slot with
//!   auto-dismiss, mute and boot grace suppression.
//! - [`BenignFilter`]: recognises startup errors that are not worth showing.

pub mod bus;
pub mod filter;
pub mod notify;

pub use bus::{ReplayBus, ReplayReceiver};
pub use filter::BenignFilter;
pub use notify::{
    CloseReason, ClosedHandle, Notification, NotificationCenter, NotificationKind,
    NotificationSettings, NotificationView, SurfaceEvent, SurfaceReceiver,
};
