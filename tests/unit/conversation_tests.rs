//! Unit tests for `ConversationLog`.
//!
//! Covers:
//! - append order is preserved in memory and in the store
//! - clear empties both
//! - reopening over the same store restores the sequence
//! - replay pushes every entry to the panel in order

use std::sync::{Arc, Mutex};

use worker_bridge::conversation::{push_entry, ConversationLog, EntryRole};
use worker_bridge::host::{PanelMessage, PanelSink};
use worker_bridge::persistence::memory::MemoryStateStore;
use worker_bridge::persistence::StateStore;

#[derive(Default)]
struct CollectingPanel {
    posted: Mutex<Vec<PanelMessage>>,
}

impl PanelSink for CollectingPanel {
    fn post(&self, message: PanelMessage) {
        self.posted.lock().unwrap().push(message);
    }
}

fn insert(value: &str) -> PanelMessage {
    PanelMessage::InsertOutput {
        value: value.to_owned(),
    }
}

#[tokio::test]
async fn new_log_is_empty() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
    let log = ConversationLog::open(store, "conversation")
        .await
        .expect("open");

    assert!(log.all().await.is_empty());
}

#[tokio::test]
async fn append_preserves_order_and_persists() {
    let store = Arc::new(MemoryStateStore::new());
    let log = ConversationLog::open(store.clone(), "conversation")
        .await
        .expect("open");

    log.append("USER: hi".into()).await.expect("append");
    log.append("ASSISTANT: hello".into()).await.expect("append");
    log.append("USER: bye".into()).await.expect("append");

    let expected = vec![
        "USER: hi".to_owned(),
        "ASSISTANT: hello".to_owned(),
        "USER: bye".to_owned(),
    ];
    assert_eq!(log.all().await, expected);
    assert_eq!(store.get("conversation").await.expect("get"), expected);
}

#[tokio::test]
async fn duplicate_entries_are_kept() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
    let log = ConversationLog::open(store, "conversation")
        .await
        .expect("open");

    log.append("USER: again".into()).await.expect("append");
    log.append("USER: again".into()).await.expect("append");

    assert_eq!(log.all().await.len(), 2);
}

#[tokio::test]
async fn clear_empties_memory_and_store() {
    let store = Arc::new(MemoryStateStore::new());
    let log = ConversationLog::open(store.clone(), "conversation")
        .await
        .expect("open");

    log.append("USER: one".into()).await.expect("append");
    log.append("ASSISTANT: two".into()).await.expect("append");
    log.clear().await.expect("clear");

    assert!(log.all().await.is_empty());
    assert!(store.get("conversation").await.expect("get").is_empty());

    log.append("USER: fresh".into()).await.expect("append after clear");
    assert_eq!(log.all().await, vec!["USER: fresh".to_owned()]);
}

#[tokio::test]
async fn reopen_restores_entries() {
    let store = Arc::new(MemoryStateStore::new());
    {
        let log = ConversationLog::open(store.clone(), "conversation")
            .await
            .expect("open");
        log.append("USER: remember me".into()).await.expect("append");
    }

    let reopened = ConversationLog::open(store, "conversation")
        .await
        .expect("reopen");
    assert_eq!(reopened.all().await, vec!["USER: remember me".to_owned()]);
}

#[tokio::test]
async fn keys_are_independent() {
    let store = Arc::new(MemoryStateStore::new());
    let a = ConversationLog::open(store.clone(), "a").await.expect("open a");
    let b = ConversationLog::open(store.clone(), "b").await.expect("open b");

    a.append("USER: only in a".into()).await.expect("append");

    assert_eq!(a.all().await.len(), 1);
    assert!(b.all().await.is_empty());
    assert!(store.get("b").await.expect("get").is_empty());
}

#[tokio::test]
async fn replay_pushes_entries_in_order() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
    let log = ConversationLog::open(store, "conversation")
        .await
        .expect("open");
    log.append("USER: q".into()).await.expect("append");
    log.append("ASSISTANT: a".into()).await.expect("append");

    let panel = CollectingPanel::default();
    log.replay(&panel).await;

    assert_eq!(
        *panel.posted.lock().unwrap(),
        vec![insert("USER: q"), insert("ASSISTANT: a")]
    );
}

#[test]
fn push_entry_posts_insert_output() {
    let panel = CollectingPanel::default();
    push_entry(&panel, "status line");
    assert_eq!(*panel.posted.lock().unwrap(), vec![insert("status line")]);
}

#[test]
fn entry_role_from_prefix() {
    assert_eq!(EntryRole::of("USER: hi"), EntryRole::User);
    assert_eq!(EntryRole::of("ASSISTANT: hello"), EntryRole::Assistant);
    assert_eq!(EntryRole::of("Listening..."), EntryRole::Other);
    assert_eq!(EntryRole::of("user: lower"), EntryRole::Other);
}
