//! Transient user-facing notifications.
//!
//! Every message is fire-and-forget: it slides in over the entry animation,
//! stays for the configured lifetime and slides out again. Messages stack
//! without coordination; nobody waits for one to leave before the next one
//! appears.
//!
//! ```text
//!  0        300ms                      4000ms     4300ms
//!  ├─Entering─┼────────Visible────────────┼─Leaving──┤ gone
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Info => "info",
        }
    }
}

/// Where a notification is in its on-screen life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStage {
    Entering,
    Visible,
    Leaving,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub shown_at: Instant,
}

impl Notification {
    /// Stage at `now`, or `None` once the exit animation has finished.
    pub fn stage(&self, now: Instant, ttl: Duration, animation: Duration) -> Option<NotificationStage> {
        let age = now.saturating_duration_since(self.shown_at);
        if age < animation {
            Some(NotificationStage::Entering)
        } else if age < ttl {
            Some(NotificationStage::Visible)
        } else if age < ttl + animation {
            Some(NotificationStage::Leaving)
        } else {
            None
        }
    }
}

/// Receives each notification as it is pushed.
pub trait NotificationListener: Send + Sync {
    fn on_notification(&self, notification: &Notification);
}

/// Shared list of live notifications. Cloning yields another handle to the
/// same list.
#[derive(Clone)]
pub struct NotificationCenter {
    live: Arc<Mutex<Vec<Notification>>>,
    next_id: Arc<AtomicU64>,
    ttl: Duration,
    animation: Duration,
    listener: Option<Arc<dyn NotificationListener>>,
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("ttl", &self.ttl)
            .field("animation", &self.animation)
            .field("live", &self.live.lock().unwrap_or_else(PoisonError::into_inner).len())
            .finish()
    }
}

impl NotificationCenter {
    pub fn new(ttl: Duration, animation: Duration) -> Self {
        Self {
            live: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            ttl,
            animation,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn NotificationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn set_listener(&mut self, listener: Arc<dyn NotificationListener>) {
        self.listener = Some(listener);
    }

    /// Show `message`. Returns the notification id. Dismissed notifications
    /// are dropped first, so a center nobody renders stays bounded.
    pub fn push(&self, kind: NotificationKind, message: impl Into<String>) -> u64 {
        let now = Instant::now();
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            message: message.into(),
            shown_at: now,
        };
        match kind {
            NotificationKind::Error => warn!("[notify] {}", notification.message),
            _ => info!("[notify] {}", notification.message),
        }
        if let Some(listener) = &self.listener {
            listener.on_notification(&notification);
        }
        let id = notification.id;
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        live.retain(|n| n.stage(now, self.ttl, self.animation).is_some());
        live.push(notification);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Info, message)
    }

    /// Notifications still on screen at `now`, oldest first, with their
    /// stage. Dismissed ones are dropped from the list.
    pub fn visible(&self, now: Instant) -> Vec<(Notification, NotificationStage)> {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        live.retain(|n| n.stage(now, self.ttl, self.animation).is_some());
        live.iter()
            .filter_map(|n| {
                n.stage(now, self.ttl, self.animation)
                    .map(|stage| (n.clone(), stage))
            })
            .collect()
    }

    pub fn clear(&self) {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center() -> NotificationCenter {
        NotificationCenter::new(Duration::from_millis(4000), Duration::from_millis(300))
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_stages() {
        let c = center();
        c.success("PDF file uploaded and analyzed successfully!");
        let t0 = Instant::now();
        assert_eq!(c.visible(t0)[0].1, NotificationStage::Entering);
        assert_eq!(c.visible(t0 + Duration::from_millis(300))[0].1, NotificationStage::Visible);
        assert_eq!(c.visible(t0 + Duration::from_millis(4100))[0].1, NotificationStage::Leaving);
        assert!(c.visible(t0 + Duration::from_millis(4300)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn messages_stack_independently() {
        let c = center();
        c.error("first");
        tokio::time::advance(Duration::from_secs(2)).await;
        c.info("second");
        let shown = c.visible(Instant::now());
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].0.message, "first");

        tokio::time::advance(Duration::from_millis(2500)).await;
        let shown = c.visible(Instant::now());
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0.message, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn push_drops_dismissed_messages() {
        let c = center();
        for i in 0..50 {
            c.info(format!("page {i}"));
            tokio::time::advance(Duration::from_secs(5)).await;
        }
        c.success("done");
        let live = c.live.lock().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].message, "done");
    }

    #[test]
    fn listener_sees_every_push() {
        struct Count(Mutex<Vec<NotificationKind>>);
        impl NotificationListener for Count {
            fn on_notification(&self, n: &Notification) {
                self.0.lock().unwrap().push(n.kind);
            }
        }
        let count = Arc::new(Count(Mutex::new(Vec::new())));
        let c = center().with_listener(count.clone());
        let a = c.success("a");
        let b = c.error("b");
        assert!(b > a);
        assert_eq!(
            *count.0.lock().unwrap(),
            vec![NotificationKind::Success, NotificationKind::Error]
        );
    }
}
