use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::weather::WeatherSnapshot;

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAlertRequest {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAlertsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Batch evaluation of the caller's alerts for one city.
#[derive(Debug, Deserialize)]
pub struct CheckAlertsRequest {
    pub city: String,
    pub weather: WeatherSnapshot,
}

/// What happened to one alert during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub alert_id: Uuid,
    pub fired: bool,
    pub already_triggered: bool,
    pub rearmed: bool,
    pub notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationOutcome {
    pub(crate) fn quiet(alert_id: Uuid) -> Self {
        Self {
            alert_id,
            fired: false,
            already_triggered: false,
            rearmed: false,
            notified: false,
            observed: None,
            skipped: None,
            error: None,
        }
    }

    pub(crate) fn skipped(alert_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::quiet(alert_id)
        }
    }
}
