use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{Arguments, Error, ParamSpec, Result};

/// The capabilities the model may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityName {
    GetMtdCosts,
    GetDailyCostTrend,
    TilesSummary,
    CpuTimeseries,
    TrafficTimeseries,
}

impl CapabilityName {
    pub const ALL: [CapabilityName; 5] = [
        Self::GetMtdCosts,
        Self::GetDailyCostTrend,
        Self::TilesSummary,
        Self::CpuTimeseries,
        Self::TrafficTimeseries,
    ];

    /// Stable wire name, used as the dispatch key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetMtdCosts => "get_mtd_costs",
            Self::GetDailyCostTrend => "get_daily_cost_trend",
            Self::TilesSummary => "tiles_summary",
            Self::CpuTimeseries => "cpu_timeseries",
            Self::TrafficTimeseries => "traffic_timeseries",
        }
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::UnknownCapability(s.to_string()))
    }
}

/// Future returned by a capability executor.
pub type ExecutorFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

type Executor = Arc<dyn Fn(Arguments) -> ExecutorFuture + Send + Sync>;

/// A named, schema-described, read-only operation bound to its executor.
#[derive(Clone)]
pub struct Capability {
    name: CapabilityName,
    description: String,
    params: Vec<ParamSpec>,
    executor: Executor,
}

impl Capability {
    /// Bind `executor` under `name`. Parameters are added with [`Capability::param`].
    pub fn new<F, Fut>(name: CapabilityName, description: impl Into<String>, executor: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name,
            description: description.into(),
            params: Vec::new(),
            executor: Arc::new(move |args| -> ExecutorFuture { Box::pin(executor(args)) }),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn name(&self) -> CapabilityName {
        self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Validate raw model arguments against the parameter schema.
    pub fn bind_arguments(&self, raw: &Value) -> Result<Arguments> {
        Arguments::bind(&self.params, raw)
    }

    /// Run the executor. The returned future owns everything it needs.
    pub fn invoke(&self, args: Arguments) -> ExecutorFuture {
        (self.executor)(args)
    }

    /// What the model sees when choosing among capabilities.
    pub fn descriptor(&self) -> CapabilityDescriptor {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        CapabilityDescriptor {
            name: self.name.as_str().to_string(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Capability declaration forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema (object) for the arguments.
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_wire_form() {
        for name in CapabilityName::ALL {
            assert_eq!(name.as_str().parse::<CapabilityName>().unwrap(), name);
            assert_eq!(serde_json::to_value(name).unwrap(), json!(name.as_str()));
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "drop_database".parse::<CapabilityName>().unwrap_err();
        assert!(matches!(err, Error::UnknownCapability(ref n) if n == "drop_database"));
    }

    #[test]
    fn descriptor_schema() {
        let cap = Capability::new(CapabilityName::CpuTimeseries, "CPU", |_| async {
            Ok(Value::Null)
        })
        .param(ParamSpec::integer("minutes", "Window").range(1, 240).default_value(60))
        .param(ParamSpec::integer("step_seconds", "Step").range(5, 600).required());

        let d = cap.descriptor();
        assert_eq!(d.name, "cpu_timeseries");
        assert_eq!(d.parameters["type"], "object");
        assert_eq!(d.parameters["properties"]["minutes"]["maximum"], 240);
        assert_eq!(d.parameters["required"], json!(["step_seconds"]));
    }

    #[tokio::test]
    async fn invoke_runs_executor_with_bound_arguments() {
        let cap = Capability::new(CapabilityName::GetDailyCostTrend, "Trend", |args| async move {
            let days = args.u32("days")?;
            Ok::<_, Error>(json!({ "days": days }))
        })
        .param(ParamSpec::integer("days", "Days").range(1, 365).default_value(30));

        let args = cap.bind_arguments(&json!({"days": 400})).unwrap();
        assert_eq!(cap.invoke(args).await.unwrap(), json!({"days": 365}));
    }
}
