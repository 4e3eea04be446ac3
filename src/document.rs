use serde_json::{Map, Value};

use crate::language::Language;

/// Field holding a document's text in input records.
pub const CONTENT_FIELD: &str = "content";

/// Field holding a document's language tag in input records.
pub const LANGUAGE_FIELD: &str = "language";

/// A source document: its text, language and any other fields it carried.
///
/// `metadata` holds every input field except `content` (so it includes the
/// language tag) and is copied into each chunk cut from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub language: Language,
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>, language: impl Into<String>) -> Self {
        let language = language.into();
        let mut metadata = Map::new();
        metadata.insert(LANGUAGE_FIELD.to_string(), Value::from(language.clone()));
        Self {
            content: content.into(),
            language: Language::new(language),
            metadata,
        }
    }

    /// Build a document from a JSON record.
    ///
    /// Returns `None` when the record is not an object, has no string
    /// `content`, or has no string `language`.
    pub fn from_record(record: &Value) -> Option<Self> {
        let object = record.as_object()?;
        let content = object.get(CONTENT_FIELD)?.as_str()?;
        let language = object.get(LANGUAGE_FIELD)?.as_str()?;

        let metadata = object
            .iter()
            .filter(|(key, _)| key.as_str() != CONTENT_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(Self {
            content: content.to_string(),
            language: Language::new(language),
            metadata,
        })
    }

    /// Add a passthrough metadata field.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Convert raw records into documents, skipping malformed ones.
pub fn documents_from_records(records: &[Value]) -> Vec<Document> {
    let documents: Vec<Document> =
        records.iter().filter_map(Document::from_record).collect();
    let skipped = records.len() - documents.len();
    if skipped > 0 {
        tracing::debug!(skipped, "skipped records without content or language");
    }
    documents
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_record_keeps_metadata_without_content() {
        let record = json!({
            "content": "Hello.",
            "language": "en",
            "domain": "finance",
            "doc_id": 7
        });
        let doc = Document::from_record(&record).unwrap();
        assert_eq!(doc.content, "Hello.");
        assert_eq!(doc.language, Language::from("en"));
        assert_eq!(doc.metadata.get("domain"), Some(&json!("finance")));
        assert_eq!(doc.metadata.get("language"), Some(&json!("en")));
        assert!(!doc.metadata.contains_key("content"));
    }

    #[test]
    fn from_record_rejects_malformed() {
        assert!(Document::from_record(&json!({"language": "en"})).is_none());
        assert!(Document::from_record(&json!({"content": "x"})).is_none());
        assert!(
            Document::from_record(&json!({"content": 3, "language": "en"}))
                .is_none()
        );
        assert!(Document::from_record(&json!(["content"])).is_none());
    }

    #[test]
    fn documents_from_records_skips_bad_entries() {
        let records = vec![
            json!({"content": "a", "language": "en"}),
            json!({"nothing": true}),
            json!({"content": "b", "language": "zh"}),
        ];
        let docs = documents_from_records(&records);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].content, "b");
    }
}
