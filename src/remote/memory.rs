use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::remote::store::{Document, GameStore, Watch};

type Watcher = mpsc::UnboundedSender<Result<Document, StoreError>>;

#[derive(Debug)]
struct Entry {
    doc: Document,
    watchers: Vec<Watcher>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    disconnected: bool,
}

impl State {
    fn check_connected(&self) -> Result<(), StoreError> {
        if self.disconnected {
            Err(StoreError::Disconnected)
        } else {
            Ok(())
        }
    }
}

/// In-process [`GameStore`]. Clones share the same documents, so every
/// client of one `MemoryStore` sees the same games.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing the connection: every watch ends with
    /// [`StoreError::Disconnected`] and requests fail until [`reconnect`](Self::reconnect).
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.disconnected = true;
        for (id, entry) in state.entries.iter_mut() {
            debug!(doc = %id, watchers = entry.watchers.len(), "dropping watchers");
            for watcher in entry.watchers.drain(..) {
                let _ = watcher.send(Err(StoreError::Disconnected));
            }
        }
    }

    pub async fn reconnect(&self) {
        self.state.lock().await.disconnected = false;
    }

    /// Live watchers on `id`, for checking that subscriptions get released.
    pub async fn watcher_count(&self, id: &str) -> usize {
        let mut state = self.state.lock().await;
        match state.entries.get_mut(id) {
            Some(entry) => {
                entry.watchers.retain(|w| !w.is_closed());
                entry.watchers.len()
            }
            None => 0,
        }
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn create(
        &self,
        id: &str,
        fields: BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<Document, StoreError> {
        let mut state = self.state.lock().await;
        state.check_connected()?;
        if state.entries.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        let doc = Document {
            id: id.to_string(),
            revision: 1,
            fields,
            body,
        };
        state.entries.insert(
            id.to_string(),
            Entry {
                doc: doc.clone(),
                watchers: Vec::new(),
            },
        );
        Ok(doc)
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let state = self.state.lock().await;
        state.check_connected()?;
        state
            .entries
            .get(id)
            .map(|entry| entry.doc.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(
        &self,
        id: &str,
        expected_revision: u64,
        fields: BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<Document, StoreError> {
        let mut state = self.state.lock().await;
        state.check_connected()?;
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.doc.revision != expected_revision {
            warn!(
                doc = %id,
                expected = expected_revision,
                actual = entry.doc.revision,
                "rejecting stale update"
            );
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_revision,
                actual: entry.doc.revision,
            });
        }

        entry.doc = Document {
            id: id.to_string(),
            revision: expected_revision + 1,
            fields,
            body,
        };
        // Still under the lock, so watchers see commits in order.
        let doc = entry.doc.clone();
        entry
            .watchers
            .retain(|watcher| watcher.send(Ok(doc.clone())).is_ok());
        Ok(doc)
    }

    async fn query_eq(&self, field: &str, value: &str) -> Result<Vec<Document>, StoreError> {
        let state = self.state.lock().await;
        state.check_connected()?;
        Ok(state
            .entries
            .values()
            .filter(|entry| entry.doc.fields.get(field).is_some_and(|v| v == value))
            .map(|entry| entry.doc.clone())
            .collect())
    }

    async fn watch(&self, id: &str) -> Result<Watch, StoreError> {
        let mut state = self.state.lock().await;
        state.check_connected()?;
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still in hand, so this send cannot fail.
        let _ = tx.send(Ok(entry.doc.clone()));
        entry.watchers.push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(status: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("status".to_string(), status.to_string())])
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        let doc = store
            .create("a", fields("waiting"), Bytes::from_static(b"1"))
            .await
            .unwrap();
        assert_eq!(doc.revision, 1);
        assert_eq!(
            store.create("a", fields("waiting"), Bytes::new()).await,
            Err(StoreError::AlreadyExists("a".to_string()))
        );
    }

    #[tokio::test]
    async fn update_is_conditional_on_revision() {
        let store = MemoryStore::new();
        store.create("a", fields("waiting"), Bytes::new()).await.unwrap();

        let doc = store
            .update("a", 1, fields("inProgress"), Bytes::from_static(b"2"))
            .await
            .unwrap();
        assert_eq!(doc.revision, 2);

        assert_eq!(
            store
                .update("a", 1, fields("finished"), Bytes::from_static(b"3"))
                .await,
            Err(StoreError::Conflict {
                id: "a".to_string(),
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(store.get("a").await.unwrap().body, Bytes::from_static(b"2"));
    }

    #[tokio::test]
    async fn query_matches_field_equality() {
        let store = MemoryStore::new();
        store.create("a", fields("waiting"), Bytes::new()).await.unwrap();
        store.create("b", fields("finished"), Bytes::new()).await.unwrap();
        store.create("c", fields("waiting"), Bytes::new()).await.unwrap();

        let mut ids: Vec<_> = store
            .query_eq("status", "waiting")
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        ids.sort();
        assert_eq!(ids, ["a", "c"]);
        assert!(store.query_eq("nope", "waiting").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn watch_replays_current_then_commits_in_order() {
        let store = MemoryStore::new();
        store.create("a", fields("waiting"), Bytes::new()).await.unwrap();
        let mut watch = store.watch("a").await.unwrap();

        for revision in 1..4 {
            store
                .update("a", revision, fields("inProgress"), Bytes::new())
                .await
                .unwrap();
        }

        for expected in 1..5 {
            let doc = watch.recv().await.unwrap().unwrap();
            assert_eq!(doc.revision, expected);
        }
    }

    #[tokio::test]
    async fn disconnect_ends_watches_with_error() {
        let store = MemoryStore::new();
        store.create("a", fields("waiting"), Bytes::new()).await.unwrap();
        let mut watch = store.watch("a").await.unwrap();
        watch.recv().await.unwrap().unwrap();

        store.disconnect().await;
        assert_eq!(watch.recv().await, Some(Err(StoreError::Disconnected)));
        assert_eq!(watch.recv().await, None);
        assert_eq!(store.get("a").await, Err(StoreError::Disconnected));

        store.reconnect().await;
        assert!(store.get("a").await.is_ok());
    }

    #[tokio::test]
    async fn dropped_watch_is_pruned() {
        let store = MemoryStore::new();
        store.create("a", fields("waiting"), Bytes::new()).await.unwrap();
        let watch = store.watch("a").await.unwrap();
        assert_eq!(store.watcher_count("a").await, 1);

        drop(watch);
        assert_eq!(store.watcher_count("a").await, 0);
        assert_eq!(
            store.watch("missing").await.map(|_| ()),
            Err(StoreError::NotFound("missing".to_string()))
        );
    }
}
