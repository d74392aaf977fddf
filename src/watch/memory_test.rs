use futures::StreamExt;

use super::*;
use crate::test_utils::secret;
use crate::test_utils::secret_with_data;
use crate::Error;
use crate::ResourceKey;
use crate::WatchError;

#[tokio::test]
async fn list_returns_current_objects_and_version() {
    let source = InMemorySource::new().with_objects(vec![secret("a", "ns"), secret("b", "ns")]);
    source.remove(&ResourceKey::new("a", "ns"));

    let list = source.list().await.unwrap();
    assert_eq!(list.items, vec![secret("b", "ns")]);
    assert_eq!(list.resource_version, 3);
}

#[tokio::test]
async fn upsert_emits_added_then_modified() {
    let source = InMemorySource::new();
    let mut stream = source.watch(0).await.unwrap();

    source.upsert(secret("a", "ns"));
    source.upsert(secret_with_data("a", "ns", "v2"));
    source.remove(&ResourceKey::new("a", "ns"));

    assert_eq!(stream.next().await.unwrap().unwrap(), WatchEvent::Added(secret("a", "ns")));
    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        WatchEvent::Modified(secret_with_data("a", "ns", "v2"))
    );
    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        WatchEvent::Deleted(secret_with_data("a", "ns", "v2"))
    );
}

#[tokio::test]
async fn watch_replays_changes_missed_since_list() {
    let source = InMemorySource::new().with_objects(vec![secret("a", "ns")]);
    let list = source.list().await.unwrap();

    source.upsert(secret("b", "ns"));

    let mut stream = source.watch(list.resource_version).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), WatchEvent::Added(secret("b", "ns")));
}

#[tokio::test]
async fn watch_from_trimmed_version_is_expired() {
    let source = InMemorySource::with_history_limit(2);
    for name in ["a", "b", "c", "d"] {
        source.upsert(secret(name, "ns"));
    }

    match source.watch(1).await {
        Err(Error::Watch(WatchError::Expired { resource_version })) => assert_eq!(resource_version, 1),
        other => panic!("expected Expired, got {:?}", other.map(|_| ())),
    }
    // versions 3 and 4 are still retained
    assert!(source.watch(2).await.is_ok());
}

#[tokio::test]
async fn close_watchers_ends_open_streams() {
    let source: InMemorySource<crate::test_utils::Secret> = InMemorySource::new();
    let mut stream = source.watch(0).await.unwrap();
    assert_eq!(source.watcher_count(), 1);

    source.close_watchers();

    assert!(stream.next().await.is_none());
    assert_eq!(source.watcher_count(), 0);
}

#[tokio::test]
async fn abort_watchers_fails_open_streams() {
    let source: InMemorySource<crate::test_utils::Secret> = InMemorySource::new();
    let mut stream = source.watch(0).await.unwrap();

    source.abort_watchers("connection reset");

    match stream.next().await {
        Some(Err(Error::Watch(WatchError::WatchFailed(reason)))) => assert_eq!(reason, "connection reset"),
        other => panic!("expected WatchFailed, got {:?}", other.map(|r| r.map(|_| ()))),
    }
    assert!(stream.next().await.is_none());
    assert_eq!(source.watcher_count(), 0);
}

#[tokio::test]
async fn remove_of_unknown_key_records_nothing() {
    let source: InMemorySource<crate::test_utils::Secret> = InMemorySource::new();
    assert!(source.remove(&ResourceKey::new("missing", "ns")).is_none());
    assert_eq!(source.resource_version(), 0);
    assert!(source.is_empty());
}
