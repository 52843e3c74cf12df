//! crates/relevamiento_client/src/notify.rs

use relevamiento_core::ports::{Notification, NotificationLevel, Notifier};
use tracing::{error, info, warn};

/// Surfaces notifications as log events, for hosts without a toast area.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message;
        match notification.level {
            NotificationLevel::Success => info!(kind = "success", "{}", message),
            NotificationLevel::Info => info!(kind = "info", "{}", message),
            NotificationLevel::Warning => warn!("{}", message),
            NotificationLevel::Error => error!("{}", message),
        }
    }
}
