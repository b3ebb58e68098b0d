//! Registry-backed tool host.

use std::sync::Arc;
use std::time::Duration;

use capability::Registry;
use serde_json::Value;
use tracing::{Instrument, debug, info_span, warn};

use super::{Execution, ToolError, ToolHost, ToolOutcome};
use crate::model::{ToolCall, ToolSpec};

/// Default per-call limit for a capability executor.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs model-requested calls against a [`Registry`].
///
/// Each executor runs on its own task under a timeout, so a slow data
/// source or a panic inside an executor is reported as an error outcome
/// instead of taking the conversation down.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<Registry>,
    specs: Vec<ToolSpec>,
    timeout: Duration,
}

impl Executor {
    pub fn new(registry: Arc<Registry>) -> Self {
        let specs = registry
            .schema_for_model()
            .into_iter()
            .map(ToolSpec::from)
            .collect();
        Self {
            registry,
            specs,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, call: &ToolCall) -> Execution {
        let capability = match self.registry.resolve(&call.name) {
            Ok(capability) => capability,
            Err(e) => {
                warn!(error = %e, "model requested an unknown capability");
                return Execution::failed(
                    &call.name,
                    call.input.clone(),
                    ToolError::NotFound(call.name.clone()),
                );
            }
        };

        let arguments = match capability.bind_arguments(&call.input) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(error = %e, "argument validation failed");
                return Execution::failed(
                    &call.name,
                    call.input.clone(),
                    ToolError::InvalidInput(e.to_string()),
                );
            }
        };
        let executed: Value = arguments.clone().into_value();
        debug!(arguments = %executed, "executing");

        let mut task = tokio::spawn(capability.invoke(arguments));
        let outcome = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Ok(output))) => ToolOutcome::Success { output },
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "capability failed");
                ToolError::Execution(e.to_string()).into()
            }
            Ok(Err(join)) if join.is_panic() => {
                warn!("capability panicked");
                ToolError::Panicked.into()
            }
            Ok(Err(join)) => ToolError::Execution(join.to_string()).into(),
            Err(_) => {
                task.abort();
                let ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms = ms, "capability timed out");
                ToolError::Timeout(ms).into()
            }
        };

        Execution {
            name: call.name.clone(),
            arguments: executed,
            outcome,
        }
    }
}

impl ToolHost for Executor {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Execution {
        let span = info_span!("tool", name = %call.name, id = %call.id);
        self.run(call).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capability::{Arguments, Capability, CapabilityName, Error as CapabilityError, ParamSpec};
    use serde_json::json;

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            id: "call-1".into(),
            name: name.into(),
            input,
            signature: None,
        }
    }

    fn executor() -> Executor {
        let mut registry = Registry::new();
        registry
            .register(
                Capability::new(CapabilityName::GetDailyCostTrend, "Trend", |args| async move {
                    Ok::<_, CapabilityError>(json!({ "days": args.u32("days")? }))
                })
                .param(
                    ParamSpec::integer("days", "Days")
                        .range(1, 365)
                        .default_value(30),
                ),
            )
            .unwrap();
        registry
            .register(Capability::new(CapabilityName::TilesSummary, "Tiles", |_| async {
                Err::<Value, _>(CapabilityError::DataSource(sources::Error::Network(
                    "connection refused".into(),
                )))
            }))
            .unwrap();
        registry
            .register(Capability::new(CapabilityName::CpuTimeseries, "CPU", |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Value::Null)
            }))
            .unwrap();
        registry
            .register(Capability::new(
                CapabilityName::TrafficTimeseries,
                "Traffic",
                |args: Arguments| async move {
                    if args.get("never").is_none() {
                        panic!("boom");
                    }
                    Ok::<_, CapabilityError>(Value::Null)
                },
            ))
            .unwrap();
        Executor::new(Arc::new(registry)).with_timeout(Duration::from_millis(50))
    }

    #[test]
    fn specs_follow_registry_order() {
        let names: Vec<_> = executor().specs().iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            [
                "get_daily_cost_trend",
                "tiles_summary",
                "cpu_timeseries",
                "traffic_timeseries"
            ]
        );
    }

    #[tokio::test]
    async fn clamped_arguments_are_recorded() {
        let execution = executor()
            .execute(&call("get_daily_cost_trend", json!({"days": 400.0, "extra": 1})))
            .await;
        assert_eq!(execution.arguments, json!({"days": 365}));
        assert_eq!(
            execution.outcome,
            ToolOutcome::Success {
                output: json!({"days": 365})
            }
        );
    }

    #[tokio::test]
    async fn unknown_capability_keeps_raw_arguments() {
        let execution = executor()
            .execute(&call("delete_project", json!({"project": "p1"})))
            .await;
        assert_eq!(execution.arguments, json!({"project": "p1"}));
        assert_eq!(
            execution.outcome.error_message(),
            Some("tool not found: delete_project")
        );
    }

    #[tokio::test]
    async fn non_object_arguments_are_invalid_input() {
        let execution = executor()
            .execute(&call("get_daily_cost_trend", json!("thirty")))
            .await;
        assert!(execution.outcome.error_message().unwrap().starts_with("invalid input"));
        assert_eq!(execution.arguments, json!("thirty"));
    }

    #[tokio::test]
    async fn data_source_error_becomes_outcome() {
        let execution = executor().execute(&call("tiles_summary", json!({}))).await;
        assert!(!execution.outcome.is_success());
        assert!(execution.outcome.error_message().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn slow_capability_times_out() {
        let execution = executor().execute(&call("cpu_timeseries", json!({}))).await;
        assert_eq!(execution.outcome.error_message(), Some("timeout after 50ms"));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let execution = executor().execute(&call("traffic_timeseries", json!({}))).await;
        assert_eq!(execution.outcome.error_message(), Some("executor panicked"));
    }
}
