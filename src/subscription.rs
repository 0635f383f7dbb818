//! Subscription store
//!
//! Persists per-user keyword subscriptions in SQLite. A subscription is
//! identified by (user_id, channel_id, keyword); subscribing the same
//! triple again is an upsert, not a duplicate.

use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

/// Subscription store with SQLite backend.
pub struct SubscriptionStore {
    conn: Connection,
}

impl SubscriptionStore {
    /// Open or create the subscription database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;

        info!("Subscription store opened: {}", path.display());
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                user_id INTEGER NOT NULL,
                channel_id TEXT NOT NULL,
                keyword TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, channel_id, keyword)
            );
            "#,
        )?;

        Ok(())
    }

    /// Upsert a subscription. Subscribing an existing keyword refreshes the
    /// row and always succeeds.
    pub fn subscribe(&self, user_id: i64, channel_id: &str, keyword: &str) -> Result<()> {
        let created_at = chrono::Utc::now().timestamp();

        self.conn.execute(
            "INSERT OR REPLACE INTO subscriptions (user_id, channel_id, keyword, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, channel_id, keyword, created_at],
        )?;

        debug!("Subscribed {}/{} to {:?}", user_id, channel_id, keyword);
        Ok(())
    }

    /// Delete one subscription. Returns whether a row existed.
    pub fn unsubscribe(&self, user_id: i64, channel_id: &str, keyword: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM subscriptions
             WHERE user_id = ?1 AND channel_id = ?2 AND keyword = ?3",
            params![user_id, channel_id, keyword],
        )?;

        Ok(rows > 0)
    }

    /// Delete every subscription in a (user, channel) scope. Returns the
    /// number of rows removed. Callers gate this behind an explicit
    /// confirmation round-trip.
    pub fn unsubscribe_all(&self, user_id: i64, channel_id: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM subscriptions WHERE user_id = ?1 AND channel_id = ?2",
            params![user_id, channel_id],
        )?;

        info!("Removed {} subscriptions for {}/{}", rows, user_id, channel_id);
        Ok(rows)
    }

    /// All keywords subscribed in a (user, channel) scope, keyword order.
    pub fn list(&self, user_id: i64, channel_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT keyword FROM subscriptions
             WHERE user_id = ?1 AND channel_id = ?2
             ORDER BY keyword",
        )?;

        let keywords = stmt
            .query_map(params![user_id, channel_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(keywords)
    }
}

/// Scope key for a chat. Group chats use the real chat id; direct messages
/// use a synthetic id derived from the user so DM subscriptions never
/// collide with group scope or with another user's DMs.
pub fn channel_scope(is_private: bool, chat_id: i64, user_id: i64) -> String {
    if is_private {
        format!("private:{}", user_id)
    } else {
        chat_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_is_idempotent() {
        let store = SubscriptionStore::open_in_memory().unwrap();

        store.subscribe(1, "100", "南京").unwrap();
        store.subscribe(1, "100", "南京").unwrap();

        let keywords = store.list(1, "100").unwrap();
        assert_eq!(keywords, vec!["南京"]);
    }

    #[test]
    fn test_unsubscribe_reports_existence() {
        let store = SubscriptionStore::open_in_memory().unwrap();

        store.subscribe(1, "100", "东方").unwrap();
        assert!(store.unsubscribe(1, "100", "东方").unwrap());
        assert!(!store.unsubscribe(1, "100", "东方").unwrap());
        assert!(!store.unsubscribe(1, "100", "never-added").unwrap());
    }

    #[test]
    fn test_unsubscribe_all_scoped() {
        let store = SubscriptionStore::open_in_memory().unwrap();

        store.subscribe(1, "100", "a").unwrap();
        store.subscribe(1, "100", "b").unwrap();
        store.subscribe(1, "200", "c").unwrap();
        store.subscribe(2, "100", "d").unwrap();

        assert_eq!(store.unsubscribe_all(1, "100").unwrap(), 2);
        assert!(store.list(1, "100").unwrap().is_empty());
        assert_eq!(store.list(1, "200").unwrap(), vec!["c"]);
        assert_eq!(store.list(2, "100").unwrap(), vec!["d"]);
    }

    #[test]
    fn test_channel_scope_private_vs_group() {
        assert_eq!(channel_scope(false, -10012345, 42), "-10012345");
        assert_eq!(channel_scope(true, 42, 42), "private:42");
        // Two users in their own DMs never share a scope.
        assert_ne!(channel_scope(true, 1, 1), channel_scope(true, 2, 2));
    }
}
