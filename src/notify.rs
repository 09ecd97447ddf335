//! Push delivery of user notifications.
//!
//! Notification rows are written inside the same unit of work as the
//! decision that produced them, so the `notifications` table is the durable
//! record. A [`NotificationSink`] is told about each one after commit.
//! Delivery is best-effort: a failing sink is logged and counted, and never
//! undoes the committed decision.

use async_trait::async_trait;
use opentelemetry::KeyValue;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{NewNotification, UserId};
use crate::telemetry::metrics;

/// Fire-and-forget delivery channel (push, mail, websocket, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn enqueue(&self, user_id: UserId, title: &str, message: &str) -> Result<()>;
}

/// Sink that only logs. The default when no delivery channel is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn enqueue(&self, user_id: UserId, title: &str, message: &str) -> Result<()> {
        info!(user_id = user_id.0, title, message, "notification");
        Ok(())
    }
}

/// Hand committed notifications to `sink`, logging failures. Returns how
/// many were accepted.
pub async fn deliver_all(sink: &dyn NotificationSink, notifications: &[NewNotification]) -> usize {
    let mut delivered = 0;
    for n in notifications {
        match sink.enqueue(n.user_id, &n.title, &n.message).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!(user_id = n.user_id.0, title = %n.title, "notification delivery failed: {e}");
                metrics::notification_delivery_failures()
                    .add(1, &[KeyValue::new("title", n.title.clone())]);
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    struct FlakySink {
        seen: Mutex<Vec<UserId>>,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn enqueue(&self, user_id: UserId, _title: &str, _message: &str) -> Result<()> {
            if user_id == UserId(13) {
                return Err(Error::Other("mail relay down".to_string()));
            }
            self.seen.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failures_are_skipped_not_propagated() {
        let sink = FlakySink {
            seen: Mutex::new(Vec::new()),
        };
        let batch = vec![
            NewNotification::new(UserId(1), "a", "first"),
            NewNotification::new(UserId(13), "b", "lost"),
            NewNotification::new(UserId(2), "c", "third"),
        ];

        let delivered = deliver_all(&sink, &batch).await;
        assert_eq!(delivered, 2);
        assert_eq!(*sink.seen.lock().unwrap(), vec![UserId(1), UserId(2)]);
    }

    #[tokio::test]
    async fn tracing_sink_accepts_everything() {
        let batch = vec![NewNotification::new(UserId(1), "Job approved", "ok")];
        assert_eq!(deliver_all(&TracingSink, &batch).await, 1);
    }
}
