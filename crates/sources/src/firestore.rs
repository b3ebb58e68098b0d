//! Realtime summary cache kept in Firestore by the collector job.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::gcp::GcpClient;
use crate::{Error, Result, TilesSummary};

const FIRESTORE_API_URL: &str = "https://firestore.googleapis.com/v1";
const SUMMARY_DOCUMENT: &str = "realtime/summary";

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Read `realtime/summary`; `None` when the document does not exist.
pub(crate) async fn realtime_summary(client: &GcpClient) -> Result<Option<TilesSummary>> {
    let url = format!(
        "{FIRESTORE_API_URL}/projects/{}/databases/(default)/documents/{SUMMARY_DOCUMENT}",
        client.project_id()
    );
    let url = reqwest::Url::parse(&url).map_err(|e| Error::Config(e.to_string()))?;

    let document: Option<Document> = client.get_json_optional("firestore", url).await?;
    Ok(document.map(|d| summary_from_fields(&d.fields)))
}

fn summary_from_fields(fields: &Map<String, Value>) -> TilesSummary {
    TilesSummary {
        updated_at: string_field(fields, "updated_at"),
        overall_cpu_avg: number_field(fields, "overall_cpu_avg").unwrap_or(0.0),
        overall_network_mbps: number_field(fields, "overall_network_mbps").unwrap_or(0.0),
        active_instances: Some(
            number_field(fields, "active_instances")
                .map(|n| n.max(0.0) as u64)
                .unwrap_or(0),
        ),
        unlabeled_assets_pct: Some(number_field(fields, "unlabeled_assets_pct").unwrap_or(0.0)),
    }
}

// Firestore wraps every value in a one-key object naming its type.
fn number_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = fields.get(key)?;
    if let Some(d) = value.get("doubleValue") {
        return d.as_f64();
    }
    value
        .get("integerValue")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .map(|i| i as f64)
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let value = fields.get(key)?;
    value
        .get("timestampValue")
        .or_else(|| value.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_typed_fields() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/realtime/summary",
            "fields": {
                "updated_at": {"timestampValue": "2025-03-09T12:00:00Z"},
                "overall_cpu_avg": {"doubleValue": 42.5},
                "overall_network_mbps": {"integerValue": "12"},
                "active_instances": {"integerValue": "7"}
            }
        }))
        .unwrap();

        let summary = summary_from_fields(&doc.fields);
        assert_eq!(summary.updated_at.as_deref(), Some("2025-03-09T12:00:00Z"));
        assert_eq!(summary.overall_cpu_avg, 42.5);
        assert_eq!(summary.overall_network_mbps, 12.0);
        assert_eq!(summary.active_instances, Some(7));
        // absent in the document, defaulted like the other cached fields
        assert_eq!(summary.unlabeled_assets_pct, Some(0.0));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let summary = summary_from_fields(&Map::new());
        assert_eq!(summary.updated_at, None);
        assert_eq!(summary.overall_cpu_avg, 0.0);
        assert_eq!(summary.active_instances, Some(0));
    }
}
