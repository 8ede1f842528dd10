//! Serde types matching the Firestore REST API.
//!
//! Firestore wraps every value in a typed envelope (`{"stringValue": "x"}`).
//! These types convert between that wire form and plain `serde_json` values.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use super::{Document, Fields};

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiValue {
  NullValue(()),
  BooleanValue(bool),
  /// int64 encoded as a decimal string
  IntegerValue(String),
  DoubleValue(f64),
  StringValue(String),
  TimestampValue(String),
  BytesValue(String),
  ReferenceValue(String),
  GeoPointValue(Value),
  ArrayValue(ApiArrayValue),
  MapValue(ApiMapValue),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiArrayValue {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub values: Vec<ApiValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiMapValue {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub fields: BTreeMap<String, ApiValue>,
}

impl ApiValue {
  pub fn encode(value: &Value) -> Self {
    match value {
      Value::Null => ApiValue::NullValue(()),
      Value::Bool(b) => ApiValue::BooleanValue(*b),
      Value::Number(n) => match n.as_i64() {
        Some(i) => ApiValue::IntegerValue(i.to_string()),
        None => ApiValue::DoubleValue(n.as_f64().unwrap_or_default()),
      },
      Value::String(s) => ApiValue::StringValue(s.clone()),
      Value::Array(items) => ApiValue::ArrayValue(ApiArrayValue {
        values: items.iter().map(ApiValue::encode).collect(),
      }),
      Value::Object(map) => ApiValue::MapValue(ApiMapValue {
        fields: encode_fields(map),
      }),
    }
  }

  pub fn decode(self) -> Result<Value> {
    Ok(match self {
      ApiValue::NullValue(()) => Value::Null,
      ApiValue::BooleanValue(b) => Value::Bool(b),
      ApiValue::IntegerValue(s) => {
        let i: i64 = s
          .parse()
          .map_err(|e| eyre!("Invalid integerValue '{}': {}", s, e))?;
        Value::Number(i.into())
      }
      ApiValue::DoubleValue(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
      ApiValue::StringValue(s)
      | ApiValue::TimestampValue(s)
      | ApiValue::BytesValue(s)
      | ApiValue::ReferenceValue(s) => Value::String(s),
      ApiValue::GeoPointValue(v) => v,
      ApiValue::ArrayValue(array) => Value::Array(
        array
          .values
          .into_iter()
          .map(ApiValue::decode)
          .collect::<Result<_>>()?,
      ),
      ApiValue::MapValue(map) => Value::Object(decode_fields(map.fields)?),
    })
  }
}

pub fn encode_fields(fields: &Fields) -> BTreeMap<String, ApiValue> {
  fields
    .iter()
    .map(|(k, v)| (k.clone(), ApiValue::encode(v)))
    .collect()
}

pub fn decode_fields(fields: BTreeMap<String, ApiValue>) -> Result<Fields> {
  fields
    .into_iter()
    .map(|(k, v)| Ok((k, v.decode()?)))
    .collect()
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDocument {
  /// Full resource name, `projects/{p}/databases/{d}/documents/{path}`
  pub name: String,
  #[serde(default)]
  pub fields: BTreeMap<String, ApiValue>,
}

impl ApiDocument {
  pub fn into_document(self) -> Result<Document> {
    let id = self
      .name
      .rsplit('/')
      .next()
      .filter(|id| !id.is_empty())
      .ok_or_else(|| eyre!("Malformed document name '{}'", self.name))?
      .to_string();

    Ok(Document {
      id,
      fields: decode_fields(self.fields)?,
    })
  }
}

#[derive(Debug, Serialize)]
pub struct ApiWriteDocument {
  pub fields: BTreeMap<String, ApiValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiListDocumentsResponse {
  #[serde(default)]
  pub documents: Vec<ApiDocument>,
  pub next_page_token: Option<String>,
}

/// One element of a `:runQuery` response stream.
#[derive(Debug, Deserialize)]
pub struct ApiRunQueryItem {
  pub document: Option<ApiDocument>,
}

// ============================================================================
// Queries and commits
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRunQueryRequest {
  pub structured_query: ApiStructuredQuery,
}

#[derive(Debug, Serialize)]
pub struct ApiStructuredQuery {
  pub from: Vec<ApiCollectionSelector>,
  #[serde(rename = "where")]
  pub filter: ApiFilter,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCollectionSelector {
  pub collection_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFilter {
  pub field_filter: ApiFieldFilter,
}

#[derive(Debug, Serialize)]
pub struct ApiFieldFilter {
  pub field: ApiFieldReference,
  pub op: &'static str,
  pub value: ApiValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFieldReference {
  pub field_path: String,
}

impl ApiRunQueryRequest {
  pub fn equal(collection_id: &str, field: &str, value: &Value) -> Self {
    Self {
      structured_query: ApiStructuredQuery {
        from: vec![ApiCollectionSelector {
          collection_id: collection_id.to_string(),
        }],
        filter: ApiFilter {
          field_filter: ApiFieldFilter {
            field: ApiFieldReference {
              field_path: quote_field_path(field),
            },
            op: "EQUAL",
            value: ApiValue::encode(value),
          },
        },
      },
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ApiCommitRequest {
  pub writes: Vec<ApiWrite>,
}

#[derive(Debug, Serialize)]
pub struct ApiWrite {
  /// Full resource name of the document to delete
  pub delete: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
  pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub status: String,
}

/// Quote a top-level field name for use in field paths and update masks.
///
/// Simple names (`[A-Za-z_][A-Za-z0-9_]*`) pass through; anything else is
/// wrapped in backticks with backticks and backslashes escaped.
pub fn quote_field_path(field: &str) -> String {
  let simple = field
    .chars()
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

  if simple {
    field.to_string()
  } else {
    format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_encode_word_fields() {
    let fields = match json!({
      "sourceWord": "hola",
      "translation": ["hello", "hi"],
      "knowCount": 2
    }) {
      Value::Object(map) => map,
      _ => unreachable!(),
    };

    let encoded = serde_json::to_value(encode_fields(&fields)).unwrap();
    assert_eq!(
      encoded,
      json!({
        "knowCount": {"integerValue": "2"},
        "sourceWord": {"stringValue": "hola"},
        "translation": {"arrayValue": {"values": [
          {"stringValue": "hello"},
          {"stringValue": "hi"}
        ]}}
      })
    );
  }

  #[test]
  fn test_decode_nested_document() {
    let doc: ApiDocument = serde_json::from_value(json!({
      "name": "projects/p/databases/(default)/documents/dictionaries/u1",
      "fields": {
        "words": {"mapValue": {"fields": {
          "gato": {"mapValue": {"fields": {
            "sourceLanguage": {"stringValue": "es"},
            "translations": {"mapValue": {"fields": {"en": {"stringValue": "cat"}}}}
          }}}
        }}},
        "empty": {"nullValue": null},
        "ratio": {"doubleValue": 0.5}
      },
      "createTime": "2024-01-01T00:00:00Z"
    }))
    .unwrap();

    let doc = doc.into_document().unwrap();
    assert_eq!(doc.id, "u1");
    assert_eq!(doc.fields["words"]["gato"]["translations"]["en"], json!("cat"));
    assert_eq!(doc.fields["empty"], Value::Null);
    assert_eq!(doc.fields["ratio"], json!(0.5));
  }

  #[test]
  fn test_empty_array_and_map_decode() {
    let value: ApiValue = serde_json::from_value(json!({"arrayValue": {}})).unwrap();
    assert_eq!(value.decode().unwrap(), json!([]));

    let value: ApiValue = serde_json::from_value(json!({"mapValue": {}})).unwrap();
    assert_eq!(value.decode().unwrap(), json!({}));
  }

  #[test]
  fn test_invalid_integer_is_rejected() {
    let value = ApiValue::IntegerValue("twelve".to_string());
    assert!(value.decode().is_err());
  }

  #[test]
  fn test_query_request_shape() {
    let request = ApiRunQueryRequest::equal("words", "dictionaryId", &json!("d1"));
    assert_eq!(
      serde_json::to_value(&request).unwrap(),
      json!({
        "structuredQuery": {
          "from": [{"collectionId": "words"}],
          "where": {"fieldFilter": {
            "field": {"fieldPath": "dictionaryId"},
            "op": "EQUAL",
            "value": {"stringValue": "d1"}
          }}
        }
      })
    );
  }

  #[test]
  fn test_quote_field_path() {
    assert_eq!(quote_field_path("knowCount"), "knowCount");
    assert_eq!(quote_field_path("_x1"), "_x1");
    assert_eq!(quote_field_path("1st"), "`1st`");
    assert_eq!(quote_field_path("a.b"), "`a.b`");
    assert_eq!(quote_field_path("it`s"), "`it\\`s`");
  }
}
