//! Reply waiter
//!
//! Lets a command handler suspend until the same user sends one more
//! message in the same chat, with a bounded wait. Used by the full
//! unsubscribe confirmation; an elapsed wait resolves to `None` and the
//! caller treats it as a declined confirmation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tracing::debug;

struct PendingReply {
    id: u64,
    tx: oneshot::Sender<String>,
}

/// Pending reply waiters keyed by (user, chat).
#[derive(Default)]
pub struct ReplyWaiter {
    pending: RwLock<HashMap<(i64, i64), PendingReply>>,
    next_id: AtomicU64,
}

impl ReplyWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the user's next message in this chat. Registering replaces
    /// any previous waiter for the same key, which resolves the replaced
    /// wait as `None`. Returns `None` when the wait elapses without a
    /// reply.
    pub async fn wait(&self, user_id: i64, chat_id: i64, timeout: Duration) -> Option<String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .write()
            .await
            .insert((user_id, chat_id), PendingReply { id, tx });

        let reply = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(text)) => Some(text),
            // Elapsed, or the waiter was replaced and its sender dropped.
            _ => None,
        };

        if reply.is_none() {
            // Clean up, but only our own registration: a replacement
            // waiter under the same key must survive this wait's timeout.
            let mut pending = self.pending.write().await;
            if pending.get(&(user_id, chat_id)).map(|p| p.id) == Some(id) {
                pending.remove(&(user_id, chat_id));
            }
            debug!("Reply wait resolved empty for {}/{}", user_id, chat_id);
        }

        reply
    }

    /// Route an inbound message to a pending waiter. Returns whether the
    /// message was consumed.
    pub async fn deliver(&self, user_id: i64, chat_id: i64, text: &str) -> bool {
        let pending = self.pending.write().await.remove(&(user_id, chat_id));
        match pending {
            Some(p) => p.tx.send(text.to_string()).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_deliver_resolves_wait() {
        let waiter = Arc::new(ReplyWaiter::new());

        let w = Arc::clone(&waiter);
        let handle =
            tokio::spawn(async move { w.wait(1, 100, Duration::from_secs(5)).await });

        // Give the waiter a moment to register.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(waiter.deliver(1, 100, "yes").await);

        assert_eq!(handle.await.unwrap(), Some("yes".to_string()));
    }

    #[tokio::test]
    async fn test_timeout_resolves_none() {
        let waiter = ReplyWaiter::new();
        let reply = waiter.wait(1, 100, Duration::from_millis(20)).await;
        assert_eq!(reply, None);

        // Nothing pending afterwards.
        assert!(!waiter.deliver(1, 100, "late").await);
    }

    #[tokio::test]
    async fn test_deliver_without_waiter_is_noop() {
        let waiter = ReplyWaiter::new();
        assert!(!waiter.deliver(9, 9, "hello").await);
    }

    #[tokio::test]
    async fn test_waiters_are_scoped_by_user_and_chat() {
        let waiter = Arc::new(ReplyWaiter::new());

        let w = Arc::clone(&waiter);
        let handle =
            tokio::spawn(async move { w.wait(1, 100, Duration::from_millis(100)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Wrong user and wrong chat both fall through.
        assert!(!waiter.deliver(2, 100, "no").await);
        assert!(!waiter.deliver(1, 200, "no").await);

        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replacement_survives_replaced_waits_cleanup() {
        let waiter = Arc::new(ReplyWaiter::new());

        let w = Arc::clone(&waiter);
        let first =
            tokio::spawn(async move { w.wait(1, 100, Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let w = Arc::clone(&waiter);
        let second =
            tokio::spawn(async move { w.wait(1, 100, Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The replaced wait resolves empty without tearing down the newer
        // registration.
        assert_eq!(first.await.unwrap(), None);
        assert!(waiter.deliver(1, 100, "yes").await);
        assert_eq!(second.await.unwrap(), Some("yes".to_string()));
    }
}
