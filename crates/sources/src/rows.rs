//! Row types returned by the data sources.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Month-to-date cost for one (project, service) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtdCost {
    pub project: String,
    pub service: String,
    pub mtd_cost: f64,
}

impl MtdCost {
    pub fn new(project: impl Into<String>, service: impl Into<String>, mtd_cost: f64) -> Self {
        Self {
            project: project.into(),
            service: service.into(),
            mtd_cost,
        }
    }

    /// Sum of `mtd_cost` across rows, rounded to cents.
    pub fn total(rows: &[MtdCost]) -> f64 {
        round_to(rows.iter().map(|r| r.mtd_cost).sum(), 2)
    }
}

/// Total cost for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCost {
    pub day: NaiveDate,
    pub daily_cost: f64,
}

/// Cost of one service over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service: String,
    pub cost: f64,
}

/// Headline metrics shown on the dashboard tiles.
///
/// `active_instances` and `unlabeled_assets_pct` are only known when the
/// summary comes from the realtime cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TilesSummary {
    pub updated_at: Option<String>,
    pub overall_cpu_avg: f64,
    pub overall_network_mbps: f64,
    pub active_instances: Option<u64>,
    pub unlabeled_assets_pct: Option<f64>,
}

/// A cost-saving action suggested by a GCP recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub description: String,
    pub recommender_id: String,
    /// Full resource name of the affected instance or disk, when reported.
    pub resource: Option<String>,
    /// Projected monthly savings; negative when the change raises cost.
    pub est_savings_monthly: f64,
}

/// Fleet-wide CPU utilization, one sample per step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSeries {
    pub ts: Vec<DateTime<Utc>>,
    pub cpu_percent: Vec<f64>,
}

/// Fleet-wide network throughput in megabits per second, one sample per step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSeries {
    pub ts: Vec<DateTime<Utc>>,
    pub mbps_in: Vec<f64>,
    pub mbps_out: Vec<f64>,
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Bytes per second to megabits per second.
pub(crate) fn bytes_per_sec_to_mbps(bps: f64) -> f64 {
    round_to(bps * 8.0 / 1_000_000.0, 1)
}
