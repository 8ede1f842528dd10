//! Vocabulary data access.
//!
//! Two persisted shapes coexist and are never reconciled:
//! - [`VocabularyRepository`]: `users/{uid}/dictionaries` and `users/{uid}/words`
//! - [`LegacyDictionary`]: one `dictionaries/{uid}` document per user

pub mod import;
mod legacy;
mod repository;
mod types;

pub use legacy::LegacyDictionary;
pub use repository::VocabularyRepository;
pub use types::{
  resolve_dictionary_id, Dictionary, Mastery, Translation, UserId, Word, WordUpdate,
  DEFAULT_DICTIONARY_ID, MASTERED_THRESHOLD,
};
