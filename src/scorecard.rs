use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ParseError;

/// Criterion name → raw rating, as pasted back from the assistant.
///
/// Values are kept as raw JSON; the score engine decides what counts as a
/// number. Keys are not checked against the rubric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scorecard(Map<String, Value>);

impl Scorecard {
    pub fn get(&self, criterion: &str) -> Option<&Value> {
        self.0.get(criterion)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Scorecard {
    fn from(map: Map<String, Value>) -> Self {
        Scorecard(map)
    }
}

pub fn parse(raw: &str) -> Result<Scorecard, ParseError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        warn!(error = %e, "Malformed scorecard JSON");
        ParseError {
            message: e.to_string(),
        }
    })?;

    match value {
        Value::Object(map) => Ok(Scorecard(map)),
        other => {
            warn!(kind = json_kind(&other), "Scorecard JSON is not an object");
            Err(ParseError {
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            })
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
