//! Billing data from the BigQuery billing export.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::gcp::GcpClient;
use crate::rows::round_to;
use crate::source::BillingSource;
use crate::{DailyCost, Error, MtdCost, Result, ServiceCost};

const BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const QUERY_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Value,
}

/// A result row keyed by column name. BigQuery encodes every scalar as a string.
type Row = Map<String, Value>;

/// [`BillingSource`] over the standard billing export tables.
pub struct BigQueryBilling {
    client: Arc<GcpClient>,
}

impl BigQueryBilling {
    pub fn new(client: Arc<GcpClient>) -> Self {
        Self { client }
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let url = format!(
            "{BIGQUERY_API_URL}/projects/{}/queries",
            self.client.project_id()
        );
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            timeout_ms: QUERY_TIMEOUT_MS,
        };

        debug!(project = self.client.project_id(), "running billing query");
        let response: QueryResponse = self.client.post_json("bigquery", &url, &request).await?;
        decode_rows(response)
    }

    fn table(&self) -> String {
        format!(
            "`{}.gcp_billing_export_v1_*`",
            self.client.config().billing_dataset
        )
    }
}

impl BillingSource for BigQueryBilling {
    async fn mtd_costs(&self) -> Result<Vec<MtdCost>> {
        let rows = self.query(&mtd_costs_sql(&self.table())).await?;
        rows.iter()
            .map(|row| {
                Ok(MtdCost {
                    project: text(row, "project"),
                    service: text(row, "service"),
                    mtd_cost: number(row, "mtd_cost")?,
                })
            })
            .collect()
    }

    async fn daily_cost_trend(&self, days: u32) -> Result<Vec<DailyCost>> {
        let rows = self.query(&daily_trend_sql(&self.table(), days)).await?;
        rows.iter()
            .map(|row| {
                let day = text(row, "day");
                Ok(DailyCost {
                    day: NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                        Error::InvalidResponse(format!("bad day {day:?}: {e}"))
                    })?,
                    daily_cost: number(row, "daily_cost")?,
                })
            })
            .collect()
    }

    async fn top_services(&self, days: u32, limit: u32) -> Result<Vec<ServiceCost>> {
        let rows = self
            .query(&top_services_sql(&self.table(), days, limit))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(ServiceCost {
                    service: text(row, "service"),
                    cost: number(row, "cost")?,
                })
            })
            .collect()
    }
}

fn mtd_costs_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
          project.name AS project,
          service.description AS service,
          ROUND(SUM(cost), 2) AS mtd_cost
        FROM {table}
        WHERE usage_start_time >= TIMESTAMP_TRUNC(CURRENT_TIMESTAMP(), MONTH)
        GROUP BY 1, 2
        ORDER BY mtd_cost DESC
        "#
    )
}

fn daily_trend_sql(table: &str, days: u32) -> String {
    format!(
        r#"
        SELECT
          DATE(usage_start_time) AS day,
          ROUND(SUM(cost), 2) AS daily_cost
        FROM {table}
        WHERE usage_start_time >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL {days} DAY)
        GROUP BY day
        ORDER BY day
        "#
    )
}

fn top_services_sql(table: &str, days: u32, limit: u32) -> String {
    format!(
        r#"
        SELECT
          service.description AS service,
          ROUND(SUM(cost), 2) AS cost
        FROM {table}
        WHERE usage_start_time >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL {days} DAY)
        GROUP BY service
        ORDER BY cost DESC
        LIMIT {limit}
        "#
    )
}

fn decode_rows(response: QueryResponse) -> Result<Vec<Row>> {
    if !response.job_complete {
        return Err(Error::InvalidResponse(format!(
            "query did not complete within {QUERY_TIMEOUT_MS}ms"
        )));
    }

    let Some(schema) = response.schema else {
        return Ok(Vec::new());
    };

    response
        .rows
        .into_iter()
        .map(|row| {
            if row.f.len() != schema.fields.len() {
                return Err(Error::InvalidResponse(format!(
                    "row has {} cells, schema has {} fields",
                    row.f.len(),
                    schema.fields.len()
                )));
            }
            Ok(schema
                .fields
                .iter()
                .zip(row.f)
                .map(|(field, cell)| (field.name.clone(), cell.v))
                .collect())
        })
        .collect()
}

fn text(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        // Projects without a name (e.g. billing-account level charges) come back NULL.
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn number(row: &Row, column: &str) -> Result<f64> {
    match row.get(column) {
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map(|v| round_to(v, 2))
            .map_err(|e| Error::InvalidResponse(format!("column {column}: {e}"))),
        Some(Value::Number(n)) => Ok(round_to(n.as_f64().unwrap_or_default(), 2)),
        Some(Value::Null) => Ok(0.0),
        _ => Err(Error::InvalidResponse(format!("missing column {column}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> QueryResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_rows_by_schema() {
        let rows = decode_rows(response(json!({
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "project", "type": "STRING"},
                {"name": "service", "type": "STRING"},
                {"name": "mtd_cost", "type": "FLOAT"}
            ]},
            "rows": [
                {"f": [{"v": "p1"}, {"v": "Compute Engine"}, {"v": "120.5"}]},
                {"f": [{"v": null}, {"v": "Support"}, {"v": "3.0"}]}
            ]
        })))
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(text(&rows[0], "service"), "Compute Engine");
        assert_eq!(number(&rows[0], "mtd_cost").unwrap(), 120.5);
        assert_eq!(text(&rows[1], "project"), "");
    }

    #[test]
    fn empty_result_has_no_rows_field() {
        let rows = decode_rows(response(json!({
            "jobComplete": true,
            "schema": {"fields": [{"name": "day"}]}
        })))
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn incomplete_job_is_an_error() {
        let err = decode_rows(response(json!({"jobComplete": false}))).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn missing_numeric_column_is_an_error() {
        let row = Row::new();
        assert!(number(&row, "mtd_cost").is_err());
    }

    #[test]
    fn trend_sql_embeds_window() {
        let sql = daily_trend_sql("`billing.gcp_billing_export_v1_*`", 45);
        assert!(sql.contains("INTERVAL 45 DAY"));
        assert!(sql.contains("FROM `billing.gcp_billing_export_v1_*`"));
        assert!(sql.contains("ORDER BY day"));
    }

    #[test]
    fn top_services_sql_limits() {
        let sql = top_services_sql("t", 7, 10);
        assert!(sql.contains("INTERVAL 7 DAY"));
        assert!(sql.contains("LIMIT 10"));
        assert!(mtd_costs_sql("t").contains("TIMESTAMP_TRUNC(CURRENT_TIMESTAMP(), MONTH)"));
    }
}
