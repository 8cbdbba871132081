//! Structural validation of dispatcher payloads.
//!
//! The dispatcher boundary is untyped: remote agents answer with arbitrary
//! JSON. A payload is only accepted once every required field is present and
//! every numeric is finite and in range; anything else is a dispatch failure,
//! never a zero-impact completion.

use serde_json::Value;

use crate::domain::models::task::TaskOutput;

/// Why a dispatcher payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    NotAnObject,
    MissingField(&'static str),
    BadField(&'static str),
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "payload is not a JSON object"),
            Self::MissingField(name) => write!(f, "missing field '{name}'"),
            Self::BadField(name) => write!(f, "field '{name}' is malformed"),
        }
    }
}

fn finite_f64(value: &Value, name: &'static str) -> Result<f64, PayloadError> {
    let n = value.as_f64().ok_or(PayloadError::BadField(name))?;
    if n.is_finite() {
        Ok(n)
    } else {
        Err(PayloadError::BadField(name))
    }
}

/// Validate a raw dispatcher payload into a [`TaskOutput`].
///
/// Expected wire shape:
/// `{"resultData": string, "confidenceScore": [0,1], "actualImpact": >= 0,
///   "executionTime": ms >= 0}`.
pub fn validate_payload(value: &Value, produced_by: &str) -> Result<TaskOutput, PayloadError> {
    let obj = value.as_object().ok_or(PayloadError::NotAnObject)?;

    let result_data = obj
        .get("resultData")
        .ok_or(PayloadError::MissingField("resultData"))?
        .as_str()
        .ok_or(PayloadError::BadField("resultData"))?
        .to_string();

    let confidence_score = finite_f64(
        obj.get("confidenceScore")
            .ok_or(PayloadError::MissingField("confidenceScore"))?,
        "confidenceScore",
    )?;
    if !(0.0..=1.0).contains(&confidence_score) {
        return Err(PayloadError::BadField("confidenceScore"));
    }

    let actual_impact = finite_f64(
        obj.get("actualImpact")
            .ok_or(PayloadError::MissingField("actualImpact"))?,
        "actualImpact",
    )?;
    if actual_impact < 0.0 {
        return Err(PayloadError::BadField("actualImpact"));
    }

    let execution_time = finite_f64(
        obj.get("executionTime")
            .ok_or(PayloadError::MissingField("executionTime"))?,
        "executionTime",
    )?;
    if execution_time < 0.0 {
        return Err(PayloadError::BadField("executionTime"));
    }

    Ok(TaskOutput {
        result_data,
        confidence_score,
        actual_impact,
        execution_time_ms: execution_time as u64,
        produced_by: produced_by.to_string(),
    })
}
