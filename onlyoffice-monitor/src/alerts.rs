//! Lecture tolérante des payloads Alertmanager reçus sur /webhook/alerts.
//!
//! Seul le champ `alerts` (tableau) est obligatoire ; chaque alerte est lue
//! champ par champ et les valeurs absentes deviennent "unknown".

use crate::error::{MonitorError, MonitorResult};
use crate::models::AlertEvent;
use serde_json::Value;
use std::collections::BTreeMap;

const UNKNOWN: &str = "unknown";

pub fn parse_alerts(body: &[u8]) -> MonitorResult<Vec<AlertEvent>> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| MonitorError::Validation(format!("body is not valid JSON: {e}")))?;
    let alerts = payload
        .get("alerts")
        .and_then(Value::as_array)
        .ok_or_else(|| MonitorError::Validation("missing \"alerts\" array".into()))?;
    Ok(alerts.iter().map(to_event).collect())
}

fn to_event(alert: &Value) -> AlertEvent {
    let labels: BTreeMap<String, String> = alert
        .get("labels")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), label_text(v))).collect())
        .unwrap_or_default();
    AlertEvent {
        alert_name: labels.get("alertname").cloned().unwrap_or_else(|| UNKNOWN.to_string()),
        status: alert
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN)
            .to_string(),
        labels,
    }
}

fn label_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
