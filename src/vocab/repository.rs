//! Per-user dictionaries and words (`users/{uid}/dictionaries`, `users/{uid}/words`).
//!
//! Store failures never reach the caller: they are logged and turned into an
//! empty list, `None` or `false`.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::{
  dictionary_id_or_default, resolve_dictionary_id, Dictionary, Translation, UserId, Word,
  WordUpdate, DEFAULT_DICTIONARY_ID,
};
use crate::store::{to_fields, CollectionRef, Document, DocumentRef, DocumentStore, Fields};

/// Data access for the subcollection vocabulary model.
pub struct VocabularyRepository<S: DocumentStore> {
  store: Arc<S>,
}

impl<S: DocumentStore> Clone for VocabularyRepository<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

fn user_doc(user: &UserId) -> DocumentRef {
  CollectionRef::root("users").doc(user.as_str())
}

fn dictionaries(user: &UserId) -> CollectionRef {
  user_doc(user).collection("dictionaries")
}

fn words(user: &UserId) -> CollectionRef {
  user_doc(user).collection("words")
}

fn fields(value: Value) -> Fields {
  match value {
    Value::Object(map) => map,
    _ => Fields::new(),
  }
}

fn decode_words(documents: Vec<Document>) -> Vec<Word> {
  documents
    .into_iter()
    .filter_map(|doc| match doc.decode::<Word>() {
      Ok(word) => Some(Word { id: doc.id, ..word }),
      Err(e) => {
        warn!("Skipping malformed word: {}", e);
        None
      }
    })
    .collect()
}

impl<S: DocumentStore> VocabularyRepository<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Create a dictionary. Names are not required to be unique.
  pub async fn create_dictionary(&self, user: &UserId, name: &str) -> Option<String> {
    if user.is_empty() {
      debug!("create_dictionary without user");
      return None;
    }

    match self
      .store
      .add(&dictionaries(user), fields(json!({ "name": name })))
      .await
    {
      Ok(id) => {
        info!(dictionary_id = %id, "Dictionary created");
        Some(id)
      }
      Err(e) => {
        error!("Error adding dictionary: {}", e);
        None
      }
    }
  }

  /// Dictionaries in store order. An empty or unreadable collection yields
  /// the synthesized default dictionary alone.
  pub async fn list_dictionaries(&self, user: &UserId) -> Vec<Dictionary> {
    if user.is_empty() {
      return vec![Dictionary::default_dictionary()];
    }

    let documents = match self.store.list(&dictionaries(user)).await {
      Ok(documents) => documents,
      Err(e) => {
        error!("Error loading dictionaries: {}", e);
        Vec::new()
      }
    };

    let list: Vec<Dictionary> = documents
      .into_iter()
      .filter_map(|doc| match doc.decode::<Dictionary>() {
        Ok(dictionary) => Some(Dictionary {
          id: doc.id,
          ..dictionary
        }),
        Err(e) => {
          warn!("Skipping malformed dictionary: {}", e);
          None
        }
      })
      .collect();

    if list.is_empty() {
      return vec![Dictionary::default_dictionary()];
    }
    list
  }

  /// Dictionaries with the default one first when the store has no record for it.
  pub async fn dictionaries_with_default(&self, user: &UserId) -> Vec<Dictionary> {
    let mut list = self.list_dictionaries(user).await;
    if !list.iter().any(Dictionary::is_default) {
      list.insert(0, Dictionary::default_dictionary());
    }
    list
  }

  pub async fn rename_dictionary(&self, user: &UserId, id: &str, new_name: &str) -> bool {
    if user.is_empty() || id.is_empty() {
      return false;
    }

    let doc = dictionaries(user).doc(id);
    match self
      .store
      .update(&doc, fields(json!({ "name": new_name })))
      .await
    {
      Ok(()) => {
        info!(dictionary_id = %id, "Dictionary renamed");
        true
      }
      Err(e) => {
        error!("Error renaming dictionary: {}", e);
        false
      }
    }
  }

  /// Delete a dictionary together with every word that references it.
  ///
  /// Words and the dictionary record are removed in one batch. Stores that
  /// split large batches (Firestore commits at most 500 writes) only
  /// guarantee atomicity per chunk; a failure between chunks leaves the
  /// earlier chunks deleted.
  pub async fn delete_dictionary(&self, user: &UserId, id: &str) -> bool {
    if user.is_empty() || id.is_empty() {
      return false;
    }

    let collection = words(user);
    let referencing = match self
      .store
      .query_eq(&collection, "dictionaryId", &json!(id))
      .await
    {
      Ok(documents) => documents,
      Err(e) => {
        error!("Error deleting dictionary: {}", e);
        return false;
      }
    };

    let mut batch: Vec<DocumentRef> = referencing
      .iter()
      .map(|doc| collection.doc(doc.id.as_str()))
      .collect();
    batch.push(dictionaries(user).doc(id));

    match self.store.delete_all(&batch).await {
      Ok(()) => {
        info!(
          dictionary_id = %id,
          words = referencing.len(),
          "Dictionary deleted"
        );
        true
      }
      Err(e) => {
        error!("Error deleting dictionary: {}", e);
        false
      }
    }
  }

  /// Add a word with a zero know count. An empty dictionary id means the default one.
  pub async fn add_word(
    &self,
    user: &UserId,
    source_word: &str,
    translation: Translation,
    dictionary_id: Option<&str>,
  ) -> Option<String> {
    if user.is_empty() {
      debug!("add_word without user");
      return None;
    }

    let word = Word {
      id: String::new(),
      source_word: source_word.to_string(),
      translation,
      dictionary_id: Some(dictionary_id_or_default(dictionary_id).to_string()),
      know_count: 0,
    };
    let word_fields = match to_fields(&word) {
      Ok(f) => f,
      Err(e) => {
        error!("Error adding word: {}", e);
        return None;
      }
    };

    match self.store.add(&words(user), word_fields).await {
      Ok(id) => {
        info!(word_id = %id, "Word added");
        Some(id)
      }
      Err(e) => {
        error!("Error adding word: {}", e);
        None
      }
    }
  }

  /// All words of the user, or those whose stored dictionary id equals
  /// `dictionary_id` exactly.
  ///
  /// The exact filter does not apply the default fallback: words without a
  /// dictionary id are not returned for `"default"`. Use
  /// [`Self::words_in_dictionary`] for the grouping users see.
  pub async fn list_words(&self, user: &UserId, dictionary_id: Option<&str>) -> Vec<Word> {
    if user.is_empty() {
      return Vec::new();
    }

    let collection = words(user);
    let result = match dictionary_id.filter(|id| !id.is_empty()) {
      Some(id) => {
        self
          .store
          .query_eq(&collection, "dictionaryId", &json!(id))
          .await
      }
      None => self.store.list(&collection).await,
    };

    match result {
      Ok(documents) => {
        let loaded = decode_words(documents);
        debug!(count = loaded.len(), "Loaded words");
        loaded
      }
      Err(e) => {
        error!("Error loading words: {}", e);
        Vec::new()
      }
    }
  }

  /// Words that logically belong to a dictionary, default fallback included.
  pub async fn words_in_dictionary(&self, user: &UserId, dictionary_id: &str) -> Vec<Word> {
    let target = dictionary_id_or_default(Some(dictionary_id));
    if target != DEFAULT_DICTIONARY_ID {
      return self.list_words(user, Some(target)).await;
    }

    self
      .list_words(user, None)
      .await
      .into_iter()
      .filter(|w| resolve_dictionary_id(w) == DEFAULT_DICTIONARY_ID)
      .collect()
  }

  pub async fn update_word(&self, user: &UserId, id: &str, update: WordUpdate) -> bool {
    if user.is_empty() || id.is_empty() {
      return false;
    }

    let mut changes = fields(json!({
      "sourceWord": update.source_word,
      "translation": update.translation,
    }));
    if let Some(dictionary_id) = update.dictionary_id.as_deref() {
      changes.insert(
        "dictionaryId".to_string(),
        json!(dictionary_id_or_default(Some(dictionary_id))),
      );
    }
    if let Some(count) = update.know_count {
      changes.insert("knowCount".to_string(), json!(count));
    }

    match self.store.update(&words(user).doc(id), changes).await {
      Ok(()) => true,
      Err(e) => {
        error!("Error updating word: {}", e);
        false
      }
    }
  }

  pub async fn update_know_count(&self, user: &UserId, id: &str, new_count: u32) -> bool {
    if user.is_empty() || id.is_empty() {
      return false;
    }

    debug!(word_id = %id, count = new_count, "Updating know count");
    match self
      .store
      .update(&words(user).doc(id), fields(json!({ "knowCount": new_count })))
      .await
    {
      Ok(()) => true,
      Err(e) => {
        error!("Error updating knowCount: {}", e);
        false
      }
    }
  }

  /// Count a successful recall, returning the stored count.
  pub async fn record_recall(&self, user: &UserId, word: &Word) -> Option<u32> {
    let next = word.know_count.saturating_add(1);
    self
      .update_know_count(user, &word.id, next)
      .await
      .then_some(next)
  }

  pub async fn delete_word(&self, user: &UserId, id: &str) -> bool {
    if user.is_empty() || id.is_empty() {
      return false;
    }

    match self.store.delete(&words(user).doc(id)).await {
      Ok(()) => true,
      Err(e) => {
        error!("Error deleting word: {}", e);
        false
      }
    }
  }

  /// Move a word to another dictionary.
  pub async fn change_word_dictionary(
    &self,
    user: &UserId,
    id: &str,
    new_dictionary_id: &str,
  ) -> bool {
    if user.is_empty() || id.is_empty() || new_dictionary_id.is_empty() {
      return false;
    }

    match self
      .store
      .update(
        &words(user).doc(id),
        fields(json!({ "dictionaryId": new_dictionary_id })),
      )
      .await
    {
      Ok(()) => {
        info!(word_id = %id, dictionary_id = %new_dictionary_id, "Word moved");
        true
      }
      Err(e) => {
        error!("Error changing word dictionary: {}", e);
        false
      }
    }
  }
}
