//! Fleet health from Cloud Monitoring, with the Firestore tiles cache in front.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::gcp::GcpClient;
use crate::rows::{bytes_per_sec_to_mbps, round_to};
use crate::source::MetricsSource;
use crate::{CpuSeries, Error, Result, TilesSummary, TrafficSeries, firestore};

const MONITORING_API_URL: &str = "https://monitoring.googleapis.com/v3";

const CPU_METRIC: &str = "compute.googleapis.com/instance/cpu/utilization";
const RECEIVED_BYTES_METRIC: &str = "compute.googleapis.com/instance/network/received_bytes_count";
const SENT_BYTES_METRIC: &str = "compute.googleapis.com/instance/network/sent_bytes_count";

// Cloud Monitoring rejects shorter alignment periods whenever an aligner is set.
const MIN_ALIGNMENT_SECONDS: u32 = 60;

// Window used for the live tiles fallback.
const LIVE_WINDOW_MINUTES: u32 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<TimeSeries>,
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
struct TimeSeries {
    #[serde(default)]
    points: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Point {
    interval: PointInterval,
    value: TypedValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointInterval {
    end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedValue {
    double_value: Option<f64>,
    int64_value: Option<String>,
}

impl TypedValue {
    fn as_f64(&self) -> Option<f64> {
        self.double_value
            .or_else(|| self.int64_value.as_deref().and_then(|s| s.parse().ok()))
    }
}

/// How samples from several series landing on the same timestamp are combined.
#[derive(Debug, Clone, Copy)]
enum Reduce {
    Mean,
    Sum,
}

#[derive(Debug, Clone, Copy)]
struct SeriesQuery {
    metric: &'static str,
    aligner: &'static str,
    reducer: &'static str,
    reduce: Reduce,
    minutes: u32,
    step_seconds: u32,
}

impl SeriesQuery {
    fn cpu(minutes: u32, step_seconds: u32) -> Self {
        Self {
            metric: CPU_METRIC,
            aligner: "ALIGN_MEAN",
            reducer: "REDUCE_MEAN",
            reduce: Reduce::Mean,
            minutes,
            step_seconds,
        }
    }

    fn bytes(metric: &'static str, minutes: u32, step_seconds: u32) -> Self {
        Self {
            metric,
            aligner: "ALIGN_RATE",
            reducer: "REDUCE_SUM",
            reduce: Reduce::Sum,
            minutes,
            step_seconds,
        }
    }

    /// Sampling step actually requested from the API.
    fn alignment_period(&self) -> u32 {
        self.step_seconds.max(MIN_ALIGNMENT_SECONDS)
    }

    fn params(
        &self,
        now: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        let start = now - Duration::minutes(i64::from(self.minutes));
        let mut params = vec![
            ("filter", format!("metric.type=\"{}\"", self.metric)),
            ("interval.startTime", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("interval.endTime", now.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("aggregation.alignmentPeriod", format!("{}s", self.alignment_period())),
            ("aggregation.perSeriesAligner", self.aligner.to_string()),
            ("aggregation.crossSeriesReducer", self.reducer.to_string()),
            ("view", "FULL".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        params
    }
}

/// [`MetricsSource`] over Cloud Monitoring.
pub struct CloudMetrics {
    client: Arc<GcpClient>,
}

impl CloudMetrics {
    pub fn new(client: Arc<GcpClient>) -> Self {
        Self { client }
    }

    /// All samples for `query`, combined per timestamp, oldest first.
    async fn series(&self, query: SeriesQuery) -> Result<BTreeMap<DateTime<Utc>, f64>> {
        let base = format!(
            "{MONITORING_API_URL}/projects/{}/timeSeries",
            self.client.project_id()
        );
        if query.alignment_period() != query.step_seconds {
            debug!(
                requested = query.step_seconds,
                aligned = query.alignment_period(),
                "raised alignment period to the API minimum"
            );
        }

        let now = Utc::now();
        let mut samples: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = reqwest::Url::parse_with_params(
                &base,
                query.params(now, page_token.as_deref()),
            )
            .map_err(|e| Error::Config(e.to_string()))?;

            let page: ListTimeSeriesResponse = self.client.get_json("monitoring", url).await?;
            for series in page.time_series {
                for point in series.points {
                    if let Some(v) = point.value.as_f64() {
                        samples.entry(point.interval.end_time).or_default().push(v);
                    }
                }
            }

            if page.next_page_token.is_empty() {
                break;
            }
            page_token = Some(page.next_page_token);
        }

        debug!(metric = query.metric, points = samples.len(), "fetched time series");
        Ok(reduce(samples, query.reduce))
    }

    async fn live_summary(&self) -> Result<TilesSummary> {
        let window = LIVE_WINDOW_MINUTES;
        let step = window * 60;

        let cpu = self.series(SeriesQuery::cpu(window, step)).await?;
        let cpu_avg = if cpu.is_empty() {
            0.0
        } else {
            round_to(100.0 * cpu.values().sum::<f64>() / cpu.len() as f64, 1)
        };

        let egress = self
            .series(SeriesQuery::bytes(SENT_BYTES_METRIC, window, step))
            .await?;

        Ok(TilesSummary {
            updated_at: Some(Utc::now().to_rfc3339()),
            overall_cpu_avg: cpu_avg,
            overall_network_mbps: bytes_per_sec_to_mbps(egress.values().sum()),
            active_instances: None,
            unlabeled_assets_pct: None,
        })
    }
}

impl MetricsSource for CloudMetrics {
    async fn tiles_summary(&self) -> Result<TilesSummary> {
        if self.client.config().use_firestore_cache {
            match firestore::realtime_summary(&self.client).await {
                Ok(Some(summary)) => return Ok(summary),
                Ok(None) => debug!("no cached summary, computing live"),
                Err(e) => warn!(error = %e, "summary cache unavailable, computing live"),
            }
        }
        self.live_summary().await
    }

    async fn cpu_timeseries(&self, minutes: u32, step_seconds: u32) -> Result<CpuSeries> {
        let series = self.series(SeriesQuery::cpu(minutes, step_seconds)).await?;
        Ok(CpuSeries {
            ts: series.keys().copied().collect(),
            cpu_percent: series.values().map(|v| round_to(v * 100.0, 1)).collect(),
        })
    }

    async fn traffic_timeseries(&self, minutes: u32, step_seconds: u32) -> Result<TrafficSeries> {
        let received = self
            .series(SeriesQuery::bytes(RECEIVED_BYTES_METRIC, minutes, step_seconds))
            .await?;
        let sent = self
            .series(SeriesQuery::bytes(SENT_BYTES_METRIC, minutes, step_seconds))
            .await?;
        Ok(merge_traffic(&received, &sent))
    }
}

fn reduce(
    samples: BTreeMap<DateTime<Utc>, Vec<f64>>,
    how: Reduce,
) -> BTreeMap<DateTime<Utc>, f64> {
    samples
        .into_iter()
        .map(|(ts, values)| {
            let sum: f64 = values.iter().sum();
            let v = match how {
                Reduce::Sum => sum,
                Reduce::Mean => sum / values.len() as f64,
            };
            (ts, v)
        })
        .collect()
}

/// Align inbound and outbound rates on the union of their timestamps.
fn merge_traffic(
    received: &BTreeMap<DateTime<Utc>, f64>,
    sent: &BTreeMap<DateTime<Utc>, f64>,
) -> TrafficSeries {
    let mut ts: Vec<DateTime<Utc>> = received.keys().chain(sent.keys()).copied().collect();
    ts.sort();
    ts.dedup();

    TrafficSeries {
        mbps_in: ts
            .iter()
            .map(|t| bytes_per_sec_to_mbps(received.get(t).copied().unwrap_or(0.0)))
            .collect(),
        mbps_out: ts
            .iter()
            .map(|t| bytes_per_sec_to_mbps(sent.get(t).copied().unwrap_or(0.0)))
            .collect(),
        ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 9, 12, minute, 0).unwrap()
    }

    #[test]
    fn parses_double_and_int64_points() {
        let page: ListTimeSeriesResponse = serde_json::from_value(json!({
            "timeSeries": [{
                "metric": {"type": CPU_METRIC},
                "points": [
                    {
                        "interval": {
                            "startTime": "2025-03-09T12:00:00Z",
                            "endTime": "2025-03-09T12:01:00Z"
                        },
                        "value": {"doubleValue": 0.25}
                    },
                    {"interval": {"endTime": "2025-03-09T12:00:00Z"},
                     "value": {"int64Value": "3"}}
                ]
            }]
        }))
        .unwrap();

        let points = &page.time_series[0].points;
        assert_eq!(points[0].value.as_f64(), Some(0.25));
        assert_eq!(points[1].value.as_f64(), Some(3.0));
        assert_eq!(points[0].interval.end_time, at(1));
        assert!(page.next_page_token.is_empty());
    }

    #[test]
    fn reduce_mean_and_sum() {
        let mut samples = BTreeMap::new();
        samples.insert(at(0), vec![0.2, 0.4]);
        samples.insert(at(1), vec![1.0]);

        let mean = reduce(samples.clone(), Reduce::Mean);
        assert!((mean[&at(0)] - 0.3).abs() < 1e-9);

        let sum = reduce(samples, Reduce::Sum);
        assert!((sum[&at(0)] - 0.6).abs() < 1e-9);
        assert_eq!(sum[&at(1)], 1.0);
    }

    #[test]
    fn traffic_is_aligned_on_timestamps() {
        let received = BTreeMap::from([(at(0), 1_250_000.0), (at(1), 2_500_000.0)]);
        let sent = BTreeMap::from([(at(1), 125_000.0), (at(2), 125_000.0)]);

        let traffic = merge_traffic(&received, &sent);
        assert_eq!(traffic.ts, vec![at(0), at(1), at(2)]);
        assert_eq!(traffic.mbps_in, vec![10.0, 20.0, 0.0]);
        assert_eq!(traffic.mbps_out, vec![0.0, 1.0, 1.0]);
    }

    fn param(params: &[(&'static str, String)], key: &str) -> String {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .unwrap()
    }

    #[test]
    fn query_params_use_step_as_alignment() {
        let params = SeriesQuery::cpu(60, 120).params(at(30), Some("next"));
        let get = |k: &str| param(&params, k);
        assert_eq!(get("aggregation.alignmentPeriod"), "120s");
        assert_eq!(get("interval.startTime"), "2025-03-09T11:30:00Z");
        assert_eq!(get("interval.endTime"), "2025-03-09T12:30:00Z");
        assert_eq!(get("pageToken"), "next");
        assert!(get("filter").contains(CPU_METRIC));
    }

    #[test]
    fn short_steps_are_raised_to_one_minute() {
        let cpu = SeriesQuery::cpu(60, 5);
        assert_eq!(cpu.alignment_period(), 60);
        assert_eq!(param(&cpu.params(at(0), None), "aggregation.alignmentPeriod"), "60s");

        let traffic = SeriesQuery::bytes(SENT_BYTES_METRIC, 60, 59);
        let params = traffic.params(at(0), None);
        assert_eq!(param(&params, "aggregation.alignmentPeriod"), "60s");
        assert_eq!(param(&params, "aggregation.perSeriesAligner"), "ALIGN_RATE");

        assert_eq!(SeriesQuery::cpu(60, 600).alignment_period(), 600);
    }
}
