//! The five cloud capabilities, bound to concrete data sources.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sources::{BillingSource, MetricsSource};

use crate::{Arguments, Capability, CapabilityName, ParamSpec, Registry, Result};

fn to_json<T: Serialize>(rows: T) -> Result<Value> {
    Ok(serde_json::to_value(rows)?)
}

fn minutes() -> ParamSpec {
    ParamSpec::integer("minutes", "Length of the trailing window in minutes (1-240).")
        .range(1, 240)
        .default_value(60)
}

fn step_seconds() -> ParamSpec {
    ParamSpec::integer("step_seconds", "Sampling interval in seconds (5-600).")
        .range(5, 600)
        .default_value(60)
}

/// Build the registry of cost and health capabilities.
///
/// Registration order here is the order the model sees them in.
pub fn cloud_registry<B, M>(billing: Arc<B>, metrics: Arc<M>) -> Result<Registry>
where
    B: BillingSource + 'static,
    M: MetricsSource + 'static,
{
    let mut registry = Registry::new();

    let source = Arc::clone(&billing);
    registry.register(Capability::new(
        CapabilityName::GetMtdCosts,
        "Month-to-date Google Cloud spend broken down by project and service, \
         most expensive first. Each row has project, service and mtd_cost (USD).",
        move |_args: Arguments| {
            let source = Arc::clone(&source);
            async move { to_json(source.mtd_costs().await?) }
        },
    ))?;

    let source = billing;
    registry.register(
        Capability::new(
            CapabilityName::GetDailyCostTrend,
            "Total Google Cloud spend per day over a trailing window, oldest day \
             first. Each row has day (YYYY-MM-DD) and daily_cost (USD).",
            move |args: Arguments| {
                let source = Arc::clone(&source);
                async move {
                    let days = args.u32("days")?;
                    to_json(source.daily_cost_trend(days).await?)
                }
            },
        )
        .param(
            ParamSpec::integer("days", "Number of trailing days to include (1-365).")
                .range(1, 365)
                .default_value(30),
        ),
    )?;

    let source = Arc::clone(&metrics);
    registry.register(Capability::new(
        CapabilityName::TilesSummary,
        "Current fleet health headline: average CPU percent, network throughput \
         in Mbps, active instance count and share of unlabeled assets.",
        move |_args: Arguments| {
            let source = Arc::clone(&source);
            async move { to_json(source.tiles_summary().await?) }
        },
    ))?;

    let source = Arc::clone(&metrics);
    registry.register(
        Capability::new(
            CapabilityName::CpuTimeseries,
            "Fleet-wide average CPU utilization (percent) over a trailing window. \
             Returns parallel arrays ts and cpu_percent.",
            move |args: Arguments| {
                let source = Arc::clone(&source);
                async move {
                    let minutes = args.u32("minutes")?;
                    let step = args.u32("step_seconds")?;
                    to_json(source.cpu_timeseries(minutes, step).await?)
                }
            },
        )
        .param(minutes())
        .param(step_seconds()),
    )?;

    let source = metrics;
    registry.register(
        Capability::new(
            CapabilityName::TrafficTimeseries,
            "Fleet-wide network throughput in Mbps over a trailing window. Returns \
             parallel arrays ts, mbps_in and mbps_out.",
            move |args: Arguments| {
                let source = Arc::clone(&source);
                async move {
                    let minutes = args.u32("minutes")?;
                    let step = args.u32("step_seconds")?;
                    to_json(source.traffic_timeseries(minutes, step).await?)
                }
            },
        )
        .param(minutes())
        .param(step_seconds()),
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sources::{
        CpuSeries, DailyCost, MtdCost, ServiceCost, TilesSummary, TrafficSeries,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        trend_days: Mutex<Vec<u32>>,
        windows: Mutex<Vec<(u32, u32)>>,
    }

    impl BillingSource for Recorder {
        async fn mtd_costs(&self) -> sources::Result<Vec<MtdCost>> {
            Ok(vec![MtdCost::new("p1", "Compute Engine", 120.5)])
        }

        async fn daily_cost_trend(&self, days: u32) -> sources::Result<Vec<DailyCost>> {
            self.trend_days.lock().unwrap().push(days);
            Ok(Vec::new())
        }

        async fn top_services(&self, _days: u32, _limit: u32) -> sources::Result<Vec<ServiceCost>> {
            Ok(Vec::new())
        }
    }

    impl MetricsSource for Recorder {
        async fn tiles_summary(&self) -> sources::Result<TilesSummary> {
            Err(sources::Error::Network("connection refused".into()))
        }

        async fn cpu_timeseries(&self, minutes: u32, step: u32) -> sources::Result<CpuSeries> {
            self.windows.lock().unwrap().push((minutes, step));
            Ok(CpuSeries::default())
        }

        async fn traffic_timeseries(
            &self,
            minutes: u32,
            step: u32,
        ) -> sources::Result<TrafficSeries> {
            self.windows.lock().unwrap().push((minutes, step));
            Ok(TrafficSeries::default())
        }
    }

    fn registry() -> (Arc<Recorder>, Registry) {
        let recorder = Arc::new(Recorder::default());
        let registry = cloud_registry(Arc::clone(&recorder), Arc::clone(&recorder)).unwrap();
        (recorder, registry)
    }

    #[test]
    fn registers_exactly_five_in_order() {
        let (_, registry) = registry();
        assert_eq!(registry.names(), CapabilityName::ALL.to_vec());
    }

    #[tokio::test]
    async fn mtd_costs_rows() {
        let (_, registry) = registry();
        let cap = registry.resolve("get_mtd_costs").unwrap();
        let out = cap.invoke(cap.bind_arguments(&json!({})).unwrap()).await.unwrap();
        assert_eq!(
            out,
            json!([{"project": "p1", "service": "Compute Engine", "mtd_cost": 120.5}])
        );
    }

    #[tokio::test]
    async fn trend_days_are_clamped_before_the_source_sees_them() {
        let (recorder, registry) = registry();
        let cap = registry.resolve("get_daily_cost_trend").unwrap();

        cap.invoke(cap.bind_arguments(&json!({"days": 400})).unwrap())
            .await
            .unwrap();
        cap.invoke(cap.bind_arguments(&json!({})).unwrap())
            .await
            .unwrap();

        assert_eq!(*recorder.trend_days.lock().unwrap(), vec![365, 30]);
    }

    #[tokio::test]
    async fn timeseries_windows_are_clamped() {
        let (recorder, registry) = registry();

        let cpu = registry.resolve("cpu_timeseries").unwrap();
        let out = cpu
            .invoke(cpu.bind_arguments(&json!({"minutes": 1000, "step_seconds": 1})).unwrap())
            .await
            .unwrap();
        assert_eq!(out, json!({"ts": [], "cpu_percent": []}));

        let traffic = registry.resolve("traffic_timeseries").unwrap();
        traffic
            .invoke(traffic.bind_arguments(&Value::Null).unwrap())
            .await
            .unwrap();

        assert_eq!(*recorder.windows.lock().unwrap(), vec![(240, 5), (60, 60)]);
    }

    #[tokio::test]
    async fn source_failure_is_returned_as_error() {
        let (_, registry) = registry();
        let cap = registry.resolve("tiles_summary").unwrap();
        let err = cap
            .invoke(cap.bind_arguments(&json!({})).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
