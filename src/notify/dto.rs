use serde::Deserialize;
use serde_json::Value;

use crate::{notify::dispatcher::AlertNotice, weather::WeatherSnapshot};

/// Alert description as sent by a client; every part is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AlertPayload {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default)]
    pub condition: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<AlertPayload> for AlertNotice {
    fn from(p: AlertPayload) -> Self {
        let condition = [
            p.parameter.unwrap_or_default(),
            p.condition.as_ref().map(plain).unwrap_or_default(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Self {
            city: p.city.filter(|c| !c.trim().is_empty()),
            condition: if condition.is_empty() {
                "Unknown".into()
            } else {
                condition
            },
            threshold: p.value.as_ref().map(plain).unwrap_or_default(),
            unit: p.unit.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAlertEmailRequest {
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub alert: AlertPayload,
    #[serde(default)]
    pub weather_data: WeatherSnapshot,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTestEmailRequest {
    #[serde(default)]
    pub user_email: Option<String>,
}
