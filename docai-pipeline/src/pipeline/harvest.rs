//! Reading Document AI output records back from storage.

use serde_json::Value;
use tracing::{debug, warn};

use crate::docai::ParsedDocument;
use crate::error::PipelineResult;
use crate::storage::ObjectStore;

/// Bulk fields that the entity flattener never looks at
const DROPPED_FIELDS: &[&str] = &["pages", "text"];

/// Documents parsed from an output directory plus the records that were dropped
#[derive(Debug, Default)]
pub struct Harvest {
    pub documents: Vec<ParsedDocument>,
    pub skipped: Vec<SkippedRecord>,
}

/// An output object that did not yield a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub key: String,
    pub reason: String,
}

/// Whether a key names a JSON output record
fn is_record(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(".json")
}

/// Decode one output record, stripping the bulk fields first.
pub fn parse_record(data: &[u8]) -> Result<ParsedDocument, String> {
    let value: Value = serde_json::from_slice(data).map_err(|e| format!("invalid JSON: {}", e))?;
    let Value::Object(mut fields) = value else {
        return Err("record is not a JSON object".to_string());
    };

    for field in DROPPED_FIELDS {
        fields.remove(*field);
    }

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| format!("does not match document schema: {}", e))
}

/// Parse every JSON record under `bucket/prefix`, in listing order.
///
/// Records that cannot be parsed, non-JSON objects and objects that vanish
/// between listing and reading are skipped with a diagnostic. Listing and
/// other storage failures abort the harvest.
pub async fn harvest(store: &dyn ObjectStore, bucket: &str, prefix: &str) -> PipelineResult<Harvest> {
    let mut harvest = Harvest::default();

    for object in store.list_objects(bucket, prefix).await? {
        debug!(bucket = %bucket, key = %object.key, "Fetching output record");

        if !is_record(&object.key) {
            warn!(bucket = %bucket, key = %object.key, "Skipping non-JSON output object");
            harvest.skip(&object.key, "not a JSON record");
            continue;
        }

        let data = match store.read_object(bucket, &object.key).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                warn!(bucket = %bucket, key = %object.key, "Output record disappeared before read");
                harvest.skip(&object.key, "object no longer exists");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match parse_record(&data) {
            Ok(document) => harvest.documents.push(document),
            Err(reason) => {
                warn!(bucket = %bucket, key = %object.key, reason = %reason, "Failed to parse output record");
                harvest.skip(&object.key, &reason);
            }
        }
    }

    metrics::counter!("docai_documents_harvested_total").increment(harvest.documents.len() as u64);
    metrics::counter!("docai_records_skipped_total").increment(harvest.skipped.len() as u64);
    Ok(harvest)
}

impl Harvest {
    fn skip(&mut self, key: &str, reason: &str) {
        self.skipped.push(SkippedRecord {
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStorage, put};
    use tempfile::TempDir;

    const RECORD: &str = r#"{
        "uri": "gs://in/a.pdf",
        "text": "lots of text",
        "pages": [{"pageNumber": 1, "tokens": []}],
        "entities": [{"type": "total_amount", "mentionText": "$10", "normalizedValue": {"text": "10.00"}}]
    }"#;

    #[test]
    fn test_parse_record_drops_bulk_fields() {
        let document = parse_record(RECORD.as_bytes()).unwrap();
        assert_eq!(document.uri.as_deref(), Some("gs://in/a.pdf"));
        assert_eq!(document.entities.len(), 1);
    }

    #[test]
    fn test_parse_record_without_bulk_fields() {
        let document = parse_record(br#"{"entities": []}"#).unwrap();
        assert!(document.entities.is_empty());
    }

    #[test]
    fn test_parse_record_rejects_non_objects() {
        assert!(parse_record(b"[1, 2, 3]").is_err());
        assert!(parse_record(b"{ truncated").is_err());
        assert!(parse_record(br#"{"entities": [{"type": 7}]}"#).is_err());
    }

    #[test]
    fn test_is_record() {
        assert!(is_record("out/1/0/a-0.json"));
        assert!(is_record("out/1/0/A-0.JSON"));
        assert!(!is_record("out/1/0/a-0.json.tmp"));
        assert!(!is_record("out/1/0/a.pdf"));
    }

    #[tokio::test]
    async fn test_corrupt_record_does_not_abort_harvest() {
        let dir = TempDir::new().unwrap();
        put(dir.path(), "out", "results/1/0/a-0.json", RECORD.as_bytes());
        put(dir.path(), "out", "results/1/0/b-0.json", b"{\"entities\": ");
        put(dir.path(), "out", "results/1/0/readme.txt", b"hello");

        let store = LocalStorage::new(dir.path());
        let harvest = harvest(&store, "out", "results/").await.unwrap();

        assert_eq!(harvest.documents.len(), 1);
        assert_eq!(harvest.documents[0].uri.as_deref(), Some("gs://in/a.pdf"));

        let skipped: Vec<&str> = harvest.skipped.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(skipped, vec!["results/1/0/b-0.json", "results/1/0/readme.txt"]);
        assert!(harvest.skipped[0].reason.starts_with("invalid JSON"));
    }

    #[tokio::test]
    async fn test_harvest_follows_listing_order() {
        let dir = TempDir::new().unwrap();
        for name in ["c", "a", "b"] {
            let record = format!(r#"{{"uri": "gs://in/{}.pdf", "entities": []}}"#, name);
            put(dir.path(), "out", &format!("results/7/0/{}-0.json", name), record.as_bytes());
        }

        let store = LocalStorage::new(dir.path());
        let harvest = harvest(&store, "out", "results/7/").await.unwrap();
        let uris: Vec<&str> = harvest
            .documents
            .iter()
            .filter_map(|d| d.uri.as_deref())
            .collect();
        assert_eq!(uris, vec!["gs://in/a.pdf", "gs://in/b.pdf", "gs://in/c.pdf"]);
        assert!(harvest.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path());
        let harvest = harvest(&store, "out", "results/").await.unwrap();
        assert!(harvest.documents.is_empty());
    }
}
