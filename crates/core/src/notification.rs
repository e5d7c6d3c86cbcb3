use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use console_config::NotificationConfig;
use console_domain::{NotificationKind, Notifier};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Shown(Notification),
    Dismissed(u64),
}

struct CenterInner {
    active: Mutex<VecDeque<Notification>>,
    next_id: AtomicU64,
    dismiss_after: Duration,
    capacity: usize,
    events: broadcast::Sender<NotificationEvent>,
}

impl CenterInner {
    fn active(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dismiss(&self, id: u64) -> bool {
        let removed = {
            let mut active = self.active();
            let before = active.len();
            active.retain(|n| n.id != id);
            active.len() != before
        };
        if removed {
            let _ = self.events.send(NotificationEvent::Dismissed(id));
        }
        removed
    }
}

/// 瞬时通知中心
///
/// 每条通知有独立的自动消失计时器，多条通知可以同时堆叠显示；
/// 超出容量时最旧的一条被挤掉。
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<CenterInner>,
}

impl NotificationCenter {
    pub fn new(dismiss_after: Duration, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(CenterInner {
                active: Mutex::new(VecDeque::new()),
                next_id: AtomicU64::new(1),
                dismiss_after,
                capacity: capacity.max(1),
                events,
            }),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.dismiss_after_ms),
            config.capacity,
        )
    }

    /// 显示一条通知并返回其id
    pub fn push(&self, message: &str, kind: NotificationKind) -> u64 {
        match kind {
            NotificationKind::Success => info!(kind = %kind, "{}", message),
            NotificationKind::Warning => warn!(kind = %kind, "{}", message),
            NotificationKind::Error => error!(kind = %kind, "{}", message),
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            id,
            message: message.to_string(),
            kind,
            created_at: Utc::now(),
        };

        let evicted: Vec<u64> = {
            let mut active = self.inner.active();
            active.push_back(notification.clone());
            let overflow = active.len().saturating_sub(self.inner.capacity);
            active.drain(..overflow).map(|n| n.id).collect()
        };
        for evicted_id in evicted {
            debug!("通知 {} 超出容量被移除", evicted_id);
            let _ = self.inner.events.send(NotificationEvent::Dismissed(evicted_id));
        }
        let _ = self.inner.events.send(NotificationEvent::Shown(notification));

        self.schedule_dismiss(id);
        id
    }

    fn schedule_dismiss(&self, id: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("没有运行时，通知 {} 不会自动消失", id);
            return;
        };
        let inner = Arc::downgrade(&self.inner);
        let delay = self.inner.dismiss_after;
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                inner.dismiss(id);
            }
        });
    }

    pub fn dismiss(&self, id: u64) -> bool {
        self.inner.dismiss(id)
    }

    /// 当前可见的通知，按显示顺序
    pub fn active(&self) -> Vec<Notification> {
        self.inner.active().iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, message: &str, kind: NotificationKind) {
        self.push(message, kind);
    }
}
