//! Subscription Store Integration Tests
//!
//! Tests for subscription persistence against a real database file.

use expobot::subscription::{channel_scope, SubscriptionStore};
use tempfile::TempDir;

fn create_test_store(name: &str) -> (SubscriptionStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join(format!("{}.db", name));
    let store = SubscriptionStore::open(&db_path).expect("Failed to create store");
    (store, temp_dir)
}

#[test]
fn test_subscribe_and_list() {
    let (store, _temp) = create_test_store("list");

    store.subscribe(1, "100", "南京").unwrap();
    store.subscribe(1, "100", "东方").unwrap();

    let keywords = store.list(1, "100").unwrap();
    assert_eq!(keywords.len(), 2);
    assert!(keywords.contains(&"南京".to_string()));
    assert!(keywords.contains(&"东方".to_string()));
}

#[test]
fn test_double_subscribe_leaves_one_row() {
    let (store, _temp) = create_test_store("upsert");

    store.subscribe(1, "100", "南京").unwrap();
    store.subscribe(1, "100", "南京").unwrap();

    assert_eq!(store.list(1, "100").unwrap().len(), 1);
}

#[test]
fn test_unsubscribe_unknown_keyword_deletes_nothing() {
    let (store, _temp) = create_test_store("unknown");

    store.subscribe(1, "100", "南京").unwrap();

    assert!(!store.unsubscribe(1, "100", "东方").unwrap());
    assert_eq!(store.list(1, "100").unwrap(), vec!["南京"]);
}

#[test]
fn test_unsubscribe_all_only_touches_own_scope() {
    let (store, _temp) = create_test_store("wipe");

    // Same user, group scope and DM scope.
    let group = channel_scope(false, -1001, 7);
    let dm = channel_scope(true, 7, 7);

    store.subscribe(7, &group, "a").unwrap();
    store.subscribe(7, &group, "b").unwrap();
    store.subscribe(7, &dm, "c").unwrap();

    assert_eq!(store.unsubscribe_all(7, &group).unwrap(), 2);
    assert!(store.list(7, &group).unwrap().is_empty());
    assert_eq!(store.list(7, &dm).unwrap(), vec!["c"]);
}

#[test]
fn test_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("reopen.db");

    {
        let store = SubscriptionStore::open(&db_path).unwrap();
        store.subscribe(1, "100", "南京").unwrap();
    }

    let store = SubscriptionStore::open(&db_path).unwrap();
    assert_eq!(store.list(1, "100").unwrap(), vec!["南京"]);
}

#[test]
fn test_users_are_isolated() {
    let (store, _temp) = create_test_store("isolation");

    store.subscribe(1, "100", "a").unwrap();
    store.subscribe(2, "100", "b").unwrap();

    assert_eq!(store.list(1, "100").unwrap(), vec!["a"]);
    assert_eq!(store.list(2, "100").unwrap(), vec!["b"]);
}
