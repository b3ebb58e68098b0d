//! Parameter specs, argument coercion, and bound clamping.

use serde::Serialize;
use serde_json::{Map, Number, Value, json};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Semantic type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
    String,
    Boolean,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

/// Declaration of one capability parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            minimum: None,
            maximum: None,
            required: false,
            default: None,
        }
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Number, description)
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Boolean, description)
    }

    /// Inclusive bounds for numeric parameters.
    pub fn range(mut self, minimum: impl Into<f64>, maximum: impl Into<f64>) -> Self {
        self.minimum = Some(minimum.into());
        self.maximum = Some(maximum.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when the model omits the parameter.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// JSON-Schema fragment for this parameter.
    pub fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.kind));
        schema.insert("description".into(), json!(self.description));
        if let Some(min) = self.minimum {
            schema.insert("minimum".into(), self.bound_value(min));
        }
        if let Some(max) = self.maximum {
            schema.insert("maximum".into(), self.bound_value(max));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }

    fn bound_value(&self, bound: f64) -> Value {
        match self.kind {
            ParamKind::Integer => json!(bound as i64),
            _ => json!(bound),
        }
    }

    /// Coerce a raw argument to this parameter's type.
    ///
    /// Missing values take the default. Numeric values outside the declared
    /// bounds are clamped rather than rejected. Values that cannot be
    /// coerced fall back to the default when there is one.
    pub fn coerce(&self, raw: Option<&Value>) -> Result<Option<Value>> {
        let raw = raw.filter(|v| !v.is_null());

        let Some(raw) = raw else {
            if let Some(default) = &self.default {
                return Ok(Some(default.clone()));
            }
            if self.required {
                return Err(Error::validation(self.name, "missing required argument"));
            }
            return Ok(None);
        };

        let coerced = match self.kind {
            ParamKind::Integer => as_integer(raw).map(|i| json!(self.clamp(i as f64) as i64)),
            ParamKind::Number => as_number(raw)
                .map(|f| self.clamp(f))
                .and_then(Number::from_f64)
                .map(Value::Number),
            ParamKind::String => as_string(raw).map(Value::String),
            ParamKind::Boolean => as_boolean(raw).map(Value::Bool),
        };

        match (coerced, &self.default) {
            (Some(value), _) => {
                if &value != raw {
                    debug!(param = self.name, from = %raw, to = %value, "coerced argument");
                }
                Ok(Some(value))
            }
            (None, Some(default)) => {
                warn!(param = self.name, value = %raw, "uncoercible argument, using default");
                Ok(Some(default.clone()))
            }
            (None, None) => Err(Error::validation(
                self.name,
                format!("expected {}, got {raw}", self.kind.as_str()),
            )),
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        let lo = self.minimum.unwrap_or(f64::NEG_INFINITY);
        let hi = self.maximum.unwrap_or(f64::INFINITY);
        value.clamp(lo, hi)
    }
}

fn as_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn as_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_string(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(raw.to_string()),
        _ => None,
    }
}

fn as_boolean(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Validated arguments, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    /// Validate `raw` against `params`.
    ///
    /// `raw` must be a JSON object (or null for no arguments). Undeclared
    /// keys are dropped.
    pub fn bind(params: &[ParamSpec], raw: &Value) -> Result<Self> {
        let empty = Map::new();
        let object = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(Error::validation(
                    "arguments",
                    format!("expected an object, got {other}"),
                ));
            }
        };

        for key in object.keys() {
            if !params.iter().any(|p| p.name == key) {
                debug!(param = %key, "dropping undeclared argument");
            }
        }

        let mut bound = Map::new();
        for spec in params {
            if let Some(value) = spec.coerce(object.get(spec.name))? {
                bound.insert(spec.name.to_string(), value);
            }
        }
        Ok(Self(bound))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Read an integer argument as `u32`.
    pub fn u32(&self, name: &str) -> Result<u32> {
        self.0
            .get(name)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Error::validation(name, "missing or not a non-negative integer"))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days() -> ParamSpec {
        ParamSpec::integer("days", "Trailing days")
            .range(1, 365)
            .default_value(30)
    }

    #[test]
    fn missing_optional_takes_default() {
        assert_eq!(days().coerce(None).unwrap(), Some(json!(30)));
        assert_eq!(days().coerce(Some(&Value::Null)).unwrap(), Some(json!(30)));
    }

    #[test]
    fn out_of_bounds_is_clamped() {
        assert_eq!(days().coerce(Some(&json!(400))).unwrap(), Some(json!(365)));
        assert_eq!(days().coerce(Some(&json!(0))).unwrap(), Some(json!(1)));
        assert_eq!(days().coerce(Some(&json!(-20))).unwrap(), Some(json!(1)));
    }

    #[test]
    fn integer_accepts_integral_floats_and_strings() {
        assert_eq!(days().coerce(Some(&json!(7.0))).unwrap(), Some(json!(7)));
        assert_eq!(days().coerce(Some(&json!("14"))).unwrap(), Some(json!(14)));
        assert_eq!(days().coerce(Some(&json!(" 90.0 "))).unwrap(), Some(json!(90)));
    }

    #[test]
    fn uncoercible_falls_back_to_default() {
        assert_eq!(days().coerce(Some(&json!("a week"))).unwrap(), Some(json!(30)));
        assert_eq!(days().coerce(Some(&json!(7.5))).unwrap(), Some(json!(30)));
    }

    #[test]
    fn uncoercible_without_default_is_rejected() {
        let spec = ParamSpec::integer("limit", "Rows").required();
        let err = spec.coerce(Some(&json!(true))).unwrap_err();
        assert!(matches!(err, Error::Validation { ref param, .. } if param == "limit"));

        let err = spec.coerce(None).unwrap_err();
        assert!(err.to_string().contains("missing required argument"));
    }

    #[test]
    fn optional_without_default_is_omitted() {
        let spec = ParamSpec::string("region", "Region filter");
        assert_eq!(spec.coerce(None).unwrap(), None);
        assert_eq!(spec.coerce(Some(&json!(5))).unwrap(), Some(json!("5")));
    }

    #[test]
    fn number_and_boolean_coercion() {
        let ratio = ParamSpec::number("ratio", "Ratio").range(0, 1);
        assert_eq!(ratio.coerce(Some(&json!("1.5"))).unwrap(), Some(json!(1.0)));
        assert_eq!(ratio.coerce(Some(&json!(0.25))).unwrap(), Some(json!(0.25)));

        let flag = ParamSpec::boolean("live", "Skip cache");
        assert_eq!(flag.coerce(Some(&json!("Yes"))).unwrap(), Some(json!(true)));
        assert!(flag.coerce(Some(&json!([]))).is_err());
    }

    #[test]
    fn bind_drops_undeclared_and_applies_defaults() {
        let params = [
            ParamSpec::integer("minutes", "Window").range(1, 240).default_value(60),
            ParamSpec::integer("step_seconds", "Step").range(5, 600).default_value(60),
        ];
        let args =
            Arguments::bind(&params, &json!({"minutes": 999, "zone": "us-east1-b"})).unwrap();

        assert_eq!(args.u32("minutes").unwrap(), 240);
        assert_eq!(args.u32("step_seconds").unwrap(), 60);
        assert!(args.get("zone").is_none());
        assert_eq!(args.into_value(), json!({"minutes": 240, "step_seconds": 60}));
    }

    #[test]
    fn bind_rejects_non_object() {
        assert!(Arguments::bind(&[days()], &json!([1, 2])).is_err());
        assert_eq!(
            Arguments::bind(&[days()], &Value::Null).unwrap().u32("days").unwrap(),
            30
        );
    }

    #[test]
    fn schema_fragment() {
        assert_eq!(
            days().schema(),
            json!({
                "type": "integer",
                "description": "Trailing days",
                "minimum": 1,
                "maximum": 365,
                "default": 30
            })
        );
    }
}
