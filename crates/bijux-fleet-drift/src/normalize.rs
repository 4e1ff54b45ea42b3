// SPDX-License-Identifier: Apache-2.0

use bijux_fleet_core::canonical::normalize_json_number;
use serde_json::{Number, Value};

/// Folds equivalent spellings of a setting value onto one form so that
/// `"10"`, `10` and `10.0` compare equal, as do `"true"` and `true`.
#[must_use]
pub fn normalize_setting_value(value: &Value) -> Value {
    match value {
        Value::String(s) => normalize_scalar_text(s).unwrap_or_else(|| value.clone()),
        Value::Number(n) => Value::Number(normalize_json_number(n.clone())),
        Value::Array(items) => Value::Array(items.iter().map(normalize_setting_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_setting_value(v)))
                .collect(),
        ),
        Value::Bool(_) | Value::Null => value.clone(),
    }
}

#[must_use]
pub fn values_equivalent(desired: &Value, actual: &Value) -> bool {
    desired == actual || normalize_setting_value(desired) == normalize_setting_value(actual)
}

fn normalize_scalar_text(raw: &str) -> Option<Value> {
    let text = raw.trim();
    match text {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Number(Number::from(i)));
    }
    if let Ok(u) = text.parse::<u64>() {
        return Some(Value::Number(Number::from(u)));
    }
    let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(f).map(|n| Value::Number(normalize_json_number(n)))
}
