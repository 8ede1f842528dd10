//! Document store abstraction used by the vocabulary data-access layer.
//!
//! Two backends implement [`DocumentStore`]:
//! - [`FirestoreStore`] talks to Cloud Firestore over its REST API
//! - [`SqliteStore`] keeps documents in a local SQLite file (or in memory)
//!
//! Writes are atomic per document only, except [`DocumentStore::delete_all`]
//! which commits a batch.

mod api_types;
mod firestore;
mod path;
mod sqlite;

pub use firestore::FirestoreStore;
pub use path::{CollectionRef, DocumentRef};
pub use sqlite::SqliteStore;

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  pub id: String,
  pub fields: Fields,
}

impl Document {
  /// Deserialize the document fields into a typed value.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
    serde_json::from_value(Value::Object(self.fields.clone()))
      .map_err(|e| eyre!("Failed to decode document {}: {}", self.id, e))
  }
}

/// Convert a serializable value into a field map.
pub fn to_fields<T: serde::Serialize>(value: &T) -> Result<Fields> {
  match serde_json::to_value(value).map_err(|e| eyre!("Failed to encode document: {}", e))? {
    Value::Object(map) => Ok(map),
    other => Err(eyre!("Documents must be objects, got {}", other)),
  }
}

/// Hierarchical document store.
///
/// Mirrors the subset of Firestore semantics the application relies on:
/// generated ids on `add`, `update` failing on missing documents, and
/// equality queries on top-level fields.
pub trait DocumentStore: Send + Sync {
  /// Create a document with a store-generated id, returning the id.
  fn add(
    &self,
    collection: &CollectionRef,
    fields: Fields,
  ) -> impl Future<Output = Result<String>> + Send;

  /// Read a document, `None` if it does not exist.
  fn get(&self, doc: &DocumentRef) -> impl Future<Output = Result<Option<Document>>> + Send;

  /// Write a document. With `merge`, only the given top-level fields are replaced.
  fn set(
    &self,
    doc: &DocumentRef,
    fields: Fields,
    merge: bool,
  ) -> impl Future<Output = Result<()>> + Send;

  /// Overwrite the given top-level fields of an existing document.
  fn update(&self, doc: &DocumentRef, fields: Fields) -> impl Future<Output = Result<()>> + Send;

  /// Remove a document. Removing a missing document is not an error.
  fn delete(&self, doc: &DocumentRef) -> impl Future<Output = Result<()>> + Send;

  /// All documents of a collection, ordered by id.
  fn list(&self, collection: &CollectionRef) -> impl Future<Output = Result<Vec<Document>>> + Send;

  /// Documents whose top-level `field` equals `value`, ordered by id.
  fn query_eq(
    &self,
    collection: &CollectionRef,
    field: &str,
    value: &Value,
  ) -> impl Future<Output = Result<Vec<Document>>> + Send;

  /// Delete several documents as one batch.
  fn delete_all(&self, docs: &[DocumentRef]) -> impl Future<Output = Result<()>> + Send;
}
