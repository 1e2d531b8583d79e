use serde_json::{Map, Value};

use crate::error::{FieldError, ValidationError};
use crate::schema::DecisionRequest;

fn require_float(obj: &Map<String, Value>, key: &str) -> Result<f64, FieldError> {
    match obj.get(key) {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(FieldError::new(key, "must be a finite number")),
        },
        Some(_) => Err(FieldError::new(key, "must be a number")),
        None => Err(FieldError::new(key, "is required")),
    }
}

fn require_position(obj: &Map<String, Value>, key: &str) -> Result<u8, FieldError> {
    let raw = match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
            .ok_or_else(|| FieldError::new(key, "must be an integer"))?,
        Some(_) => return Err(FieldError::new(key, "must be an integer")),
        None => return Err(FieldError::new(key, "is required")),
    };

    match raw {
        0 | 1 => Ok(raw as u8),
        _ => Err(FieldError::new(key, "must be 0 (FLAT) or 1 (LONG)")),
    }
}

fn collect<T: Default>(result: Result<T, FieldError>, errors: &mut Vec<FieldError>) -> T {
    result.unwrap_or_else(|e| {
        errors.push(e);
        T::default()
    })
}

/// Parse and validate a `/decide` payload. Every offending field is reported,
/// not just the first one.
pub fn validate_decision_payload(payload: &[u8]) -> Result<DecisionRequest, ValidationError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let mut errors = Vec::new();
    let request = DecisionRequest {
        return_1: collect(require_float(obj, "return_1"), &mut errors),
        return_5: collect(require_float(obj, "return_5"), &mut errors),
        ema_spread: collect(require_float(obj, "ema_spread"), &mut errors),
        ema_9_slope: collect(require_float(obj, "ema_9_slope"), &mut errors),
        ema_21_slope: collect(require_float(obj, "ema_21_slope"), &mut errors),
        position: collect(require_position(obj, "position"), &mut errors),
        unrealized_pnl: collect(require_float(obj, "unrealized_pnl"), &mut errors),
    };

    if !errors.is_empty() {
        return Err(ValidationError::Fields(errors));
    }

    Ok(request)
}
