use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::api_types::{
  encode_fields, quote_field_path, ApiCommitRequest, ApiDocument, ApiErrorResponse,
  ApiListDocumentsResponse, ApiRunQueryItem, ApiRunQueryRequest, ApiWrite, ApiWriteDocument,
};
use super::{CollectionRef, Document, DocumentRef, DocumentStore, Fields};
use crate::config::FirebaseConfig;

/// Firestore accepts at most this many writes in one commit.
const MAX_WRITES_PER_COMMIT: usize = 500;
const PAGE_SIZE: &str = "300";

/// Cloud Firestore REST client
#[derive(Clone)]
pub struct FirestoreStore {
  http: reqwest::Client,
  /// `{api}/projects/{project}/databases/(default)/documents`
  documents_url: String,
  /// `projects/{project}/databases/(default)/documents`
  documents_name: String,
  id_token: String,
}

impl FirestoreStore {
  pub fn new(config: &FirebaseConfig, id_token: String) -> Result<Self> {
    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let documents_name = format!("projects/{}/databases/(default)/documents", config.project_id);
    let documents_url = format!(
      "{}/{}",
      config.firestore_url.trim_end_matches('/'),
      documents_name
    );

    Ok(Self {
      http,
      documents_url,
      documents_name,
      id_token,
    })
  }

  fn request(&self, method: Method, url: &str) -> RequestBuilder {
    self.http.request(method, url).bearer_auth(&self.id_token)
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.documents_url, path)
  }

  fn resource_name(&self, doc: &DocumentRef) -> String {
    format!("{}/{}", self.documents_name, doc.path())
  }

  /// Send a request and turn non-success statuses into errors.
  async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Failed to {}: {}", what, e))?;

    if response.status().is_success() {
      return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
      .map(|e| format!("{} {}", e.error.status, e.error.message))
      .unwrap_or(body);
    Err(eyre!("Failed to {} ({}): {}", what, status, message.trim()))
  }

  async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
    self
      .send(builder, what)
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse response to {}: {}", what, e))
  }

  /// PATCH a document, optionally restricted to `fields`' keys and to existing documents.
  async fn patch(
    &self,
    doc: &DocumentRef,
    fields: Fields,
    masked: bool,
    must_exist: bool,
  ) -> Result<()> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if masked {
      query.extend(
        fields
          .keys()
          .map(|k| ("updateMask.fieldPaths", quote_field_path(k))),
      );
    }
    if must_exist {
      query.push(("currentDocument.exists", "true".to_string()));
    }

    let body = ApiWriteDocument {
      fields: encode_fields(&fields),
    };
    let builder = self
      .request(Method::PATCH, &self.url(&doc.path()))
      .query(&query)
      .json(&body);

    self.send(builder, &format!("write {}", doc)).await?;
    Ok(())
  }
}

impl DocumentStore for FirestoreStore {
  async fn add(&self, collection: &CollectionRef, fields: Fields) -> Result<String> {
    let body = ApiWriteDocument {
      fields: encode_fields(&fields),
    };
    let builder = self
      .request(Method::POST, &self.url(&collection.path()))
      .json(&body);

    let created: ApiDocument = self
      .send_json(builder, &format!("add to {}", collection))
      .await?;
    let document = created.into_document()?;
    debug!(collection = %collection, id = %document.id, "Created document");
    Ok(document.id)
  }

  async fn get(&self, doc: &DocumentRef) -> Result<Option<Document>> {
    let response = self
      .request(Method::GET, &self.url(&doc.path()))
      .send()
      .await
      .map_err(|e| eyre!("Failed to get {}: {}", doc, e))?;

    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !response.status().is_success() {
      return Err(eyre!("Failed to get {}: {}", doc, response.status()));
    }

    let document: ApiDocument = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {}: {}", doc, e))?;
    document.into_document().map(Some)
  }

  async fn set(&self, doc: &DocumentRef, fields: Fields, merge: bool) -> Result<()> {
    self.patch(doc, fields, merge, false).await
  }

  async fn update(&self, doc: &DocumentRef, fields: Fields) -> Result<()> {
    self.patch(doc, fields, true, true).await
  }

  async fn delete(&self, doc: &DocumentRef) -> Result<()> {
    let builder = self.request(Method::DELETE, &self.url(&doc.path()));
    self.send(builder, &format!("delete {}", doc)).await?;
    Ok(())
  }

  async fn list(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
      if let Some(token) = &page_token {
        query.push(("pageToken", token.clone()));
      }

      let builder = self
        .request(Method::GET, &self.url(&collection.path()))
        .query(&query);
      let page: ApiListDocumentsResponse = self
        .send_json(builder, &format!("list {}", collection))
        .await?;

      for document in page.documents {
        documents.push(document.into_document()?);
      }

      match page.next_page_token.filter(|t| !t.is_empty()) {
        Some(token) => page_token = Some(token),
        None => break,
      }
    }

    Ok(documents)
  }

  async fn query_eq(
    &self,
    collection: &CollectionRef,
    field: &str,
    value: &Value,
  ) -> Result<Vec<Document>> {
    let url = match collection.parent() {
      Some(parent) => format!("{}:runQuery", self.url(&parent.path())),
      None => format!("{}:runQuery", self.documents_url),
    };

    let body = ApiRunQueryRequest::equal(collection.id(), field, value);
    let builder = self.request(Method::POST, &url).json(&body);
    let items: Vec<ApiRunQueryItem> = self
      .send_json(builder, &format!("query {}", collection))
      .await?;

    items
      .into_iter()
      .filter_map(|item| item.document)
      .map(ApiDocument::into_document)
      .collect()
  }

  async fn delete_all(&self, docs: &[DocumentRef]) -> Result<()> {
    let url = format!("{}:commit", self.documents_url);

    for chunk in docs.chunks(MAX_WRITES_PER_COMMIT) {
      let body = ApiCommitRequest {
        writes: chunk
          .iter()
          .map(|doc| ApiWrite {
            delete: self.resource_name(doc),
          })
          .collect(),
      };
      let builder = self.request(Method::POST, &url).json(&body);
      self.send(builder, "commit batch delete").await?;
      debug!(count = chunk.len(), "Committed batch delete");
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> FirestoreStore {
    let config = FirebaseConfig {
      project_id: "flash-cards".to_string(),
      api_key: None,
      firestore_url: "https://firestore.googleapis.com/v1/".to_string(),
      auth_url: String::new(),
      token_url: String::new(),
    };
    FirestoreStore::new(&config, "token".to_string()).unwrap()
  }

  #[test]
  fn test_document_urls() {
    let store = store();
    let word = CollectionRef::root("users").doc("u1").collection("words").doc("w1");

    assert_eq!(
      store.url(&word.path()),
      "https://firestore.googleapis.com/v1/projects/flash-cards/databases/(default)/documents/users/u1/words/w1"
    );
    assert_eq!(
      store.resource_name(&word),
      "projects/flash-cards/databases/(default)/documents/users/u1/words/w1"
    );
  }
}
