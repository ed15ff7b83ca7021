//! The document store a remote session talks to.
//!
//! Any backend that can create a keyed document, read it, update it
//! conditionally, query it by field equality and push changes to watchers
//! can host online games.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// A stored document. `revision` starts at 1 and grows by one per update.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Document {
    pub id: String,
    pub revision: u64,
    /// Flat string fields the store can match queries against.
    pub fields: BTreeMap<String, String>,
    pub body: Bytes,
}

/// Every committed version of one document, in commit order, starting with
/// the version current when the watch began. An `Err` is terminal.
pub type Watch = mpsc::UnboundedReceiver<Result<Document, StoreError>>;

#[async_trait]
pub trait GameStore: Send + Sync {
    /// Fails with [`StoreError::AlreadyExists`] if `id` is taken.
    async fn create(
        &self,
        id: &str,
        fields: BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<Document, StoreError>;

    async fn get(&self, id: &str) -> Result<Document, StoreError>;

    /// Replaces the document only if it is still at `expected_revision`,
    /// failing with [`StoreError::Conflict`] otherwise.
    async fn update(
        &self,
        id: &str,
        expected_revision: u64,
        fields: BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<Document, StoreError>;

    /// Documents whose `field` equals `value`, in no particular order.
    async fn query_eq(&self, field: &str, value: &str) -> Result<Vec<Document>, StoreError>;

    async fn watch(&self, id: &str) -> Result<Watch, StoreError>;
}
