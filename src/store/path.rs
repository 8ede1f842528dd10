//! Typed paths into a hierarchical document store.
//!
//! Collections live at odd segment counts (`users`, `users/u1/words`),
//! documents at even ones (`users/u1`, `users/u1/words/w1`).

use std::fmt;

/// Path to a collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
  segments: Vec<String>,
}

/// Path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
  segments: Vec<String>,
}

impl CollectionRef {
  /// Top-level collection.
  pub fn root(id: impl Into<String>) -> Self {
    Self {
      segments: vec![id.into()],
    }
  }

  /// Document inside this collection.
  pub fn doc(&self, id: impl Into<String>) -> DocumentRef {
    let mut segments = self.segments.clone();
    segments.push(id.into());
    DocumentRef { segments }
  }

  /// Collection id (last segment).
  pub fn id(&self) -> &str {
    self.segments.last().map(String::as_str).unwrap_or_default()
  }

  /// Owning document, `None` for top-level collections.
  pub fn parent(&self) -> Option<DocumentRef> {
    if self.segments.len() < 3 {
      return None;
    }
    Some(DocumentRef {
      segments: self.segments[..self.segments.len() - 1].to_vec(),
    })
  }

  /// Slash-joined path.
  pub fn path(&self) -> String {
    self.segments.join("/")
  }
}

impl DocumentRef {
  /// Subcollection under this document.
  pub fn collection(&self, id: impl Into<String>) -> CollectionRef {
    let mut segments = self.segments.clone();
    segments.push(id.into());
    CollectionRef { segments }
  }

  /// Document id (last segment).
  pub fn id(&self) -> &str {
    self.segments.last().map(String::as_str).unwrap_or_default()
  }

  /// Collection containing this document.
  pub fn parent(&self) -> CollectionRef {
    CollectionRef {
      segments: self.segments[..self.segments.len() - 1].to_vec(),
    }
  }

  pub fn path(&self) -> String {
    self.segments.join("/")
  }
}

impl fmt::Display for CollectionRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.path())
  }
}

impl fmt::Display for DocumentRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.path())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_nested_paths() {
    let words = CollectionRef::root("users").doc("u1").collection("words");
    assert_eq!(words.path(), "users/u1/words");
    assert_eq!(words.id(), "words");
    assert_eq!(words.parent().map(|p| p.path()), Some("users/u1".to_string()));

    let word = words.doc("w1");
    assert_eq!(word.path(), "users/u1/words/w1");
    assert_eq!(word.id(), "w1");
    assert_eq!(word.parent(), words);
  }

  #[test]
  fn test_root_collection_has_no_parent() {
    let dictionaries = CollectionRef::root("dictionaries");
    assert!(dictionaries.parent().is_none());
    assert_eq!(dictionaries.doc("u1").to_string(), "dictionaries/u1");
  }
}
