//! Transient user-facing notifications (toasts).
//!
//! Every mutation reports its outcome through a [`Notifier`]; this is the only
//! error channel the interface sees.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "application::notify";
const DEFAULT_TOAST_TTL: Duration = Duration::from_millis(6000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    /// Rendered with the destructive style.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: Uuid,
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
    #[serde(skip)]
    pub ttl: Duration,
}

impl Toast {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_kind(ToastKind::Success, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_kind(ToastKind::Error, title, description)
    }

    fn with_kind(kind: ToastKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            description: description.into(),
            ttl: DEFAULT_TOAST_TTL,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ToastKind::Error
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the log; used by headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Success => info!(
                toast_id = %toast.id,
                title = %toast.title,
                description = %toast.description,
                "Notification"
            ),
            ToastKind::Error => warn!(
                toast_id = %toast.id,
                title = %toast.title,
                description = %toast.description,
                "Notification"
            ),
        }
    }
}

/// Holds toasts until the interface drains them into its toast stack.
#[derive(Debug, Default)]
pub struct ToastBuffer {
    toasts: Mutex<Vec<Toast>>,
}

impl ToastBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *mutex_lock(&self.toasts, SOURCE, "drain"))
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.toasts, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for ToastBuffer {
    fn notify(&self, toast: Toast) {
        mutex_lock(&self.toasts, SOURCE, "notify").push(toast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_drains_in_order() {
        let buffer = ToastBuffer::new();
        buffer.notify(Toast::success("Saved", "Article created"));
        buffer.notify(Toast::error("Failed", "permission denied"));

        assert_eq!(buffer.len(), 2);
        let drained = buffer.drain();
        assert_eq!(drained[0].kind, ToastKind::Success);
        assert!(drained[1].is_error());
        assert!(buffer.is_empty());
    }

    #[test]
    fn toasts_get_distinct_ids() {
        let first = Toast::success("a", "b");
        let second = Toast::success("a", "b");
        assert_ne!(first.id, second.id);
        assert_eq!(first.ttl, DEFAULT_TOAST_TTL);
    }
}
