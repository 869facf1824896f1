use std::sync::Arc;
use yinyang_core::{KeyValueStore, Message, Persistence};
use yinyang_storage::SqliteStore;

#[tokio::test]
async fn put_get_overwrite_remove() {
    let store = SqliteStore::in_memory().await.unwrap();

    assert_eq!(store.get("missing").await.unwrap(), None);

    store.put("k", "one".to_string()).await.unwrap();
    store.put("k", "two".to_string()).await.unwrap();
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);

    store.remove("k").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), None);
    // Removing twice is fine.
    store.remove("k").await.unwrap();
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("yinyang.db");

    {
        let store = SqliteStore::open(&db_path).await.unwrap();
        store.put("yinyang-state", r#"{"model":"x"}"#.to_string()).await.unwrap();
    }

    let reopened = SqliteStore::open(&db_path).await.unwrap();
    assert_eq!(
        reopened.get("yinyang-state").await.unwrap().as_deref(),
        Some(r#"{"model":"x"}"#)
    );
}

#[tokio::test]
async fn history_round_trips_through_persistence() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let persistence = Persistence::new(store);
    let history = vec![
        Message::user("hello"),
        Message::assistant("hi"),
        Message::user("陰陽?"),
        Message::diagnostic("⚠️ rate limited"),
    ];

    assert!(persistence.save("yinyang-conversation", &history).await);
    let loaded: Vec<Message> = persistence.load("yinyang-conversation", Vec::new()).await;

    assert_eq!(loaded, history);
    let raw: serde_json::Value =
        persistence.load("yinyang-conversation", serde_json::Value::Null).await;
    assert_eq!(raw.as_array().map(Vec::len), Some(4));
}
