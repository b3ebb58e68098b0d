//! Data-source traits consumed by the capability executors.

use std::future::Future;

use crate::{
    CpuSeries, DailyCost, MtdCost, Recommendation, Result, ServiceCost, TilesSummary,
    TrafficSeries,
};

/// Read-only access to billing data.
pub trait BillingSource: Send + Sync {
    /// Month-to-date cost by project and service, most expensive first.
    fn mtd_costs(&self) -> impl Future<Output = Result<Vec<MtdCost>>> + Send;

    /// Total cost per day over the trailing `days`, oldest first.
    fn daily_cost_trend(&self, days: u32) -> impl Future<Output = Result<Vec<DailyCost>>> + Send;

    /// The `limit` most expensive services over the trailing `days`.
    fn top_services(
        &self,
        days: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ServiceCost>>> + Send;
}

/// Read-only access to fleet health metrics.
pub trait MetricsSource: Send + Sync {
    /// Headline dashboard metrics.
    fn tiles_summary(&self) -> impl Future<Output = Result<TilesSummary>> + Send;

    /// CPU utilization over the trailing `minutes`, sampled every `step_seconds`.
    fn cpu_timeseries(
        &self,
        minutes: u32,
        step_seconds: u32,
    ) -> impl Future<Output = Result<CpuSeries>> + Send;

    /// Network throughput over the trailing `minutes`, sampled every `step_seconds`.
    fn traffic_timeseries(
        &self,
        minutes: u32,
        step_seconds: u32,
    ) -> impl Future<Output = Result<TrafficSeries>> + Send;
}

/// Read-only access to cost optimization recommendations.
pub trait RecommendationSource: Send + Sync {
    /// Up to `limit` recommendations, largest projected monthly savings first.
    ///
    /// Recommenders that cannot be read are skipped rather than failing the call.
    fn recommendations(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Recommendation>>> + Send;
}
