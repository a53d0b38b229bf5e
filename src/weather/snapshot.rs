use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::alerts::repo_types::WeatherField;

/// Point-in-time weather reading for a location, as supplied by the caller.
/// Every field is optional; evaluation only needs the one an alert watches.
/// A reading that is not a number is kept as absent, so only alerts watching
/// it are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    #[serde(default, deserialize_with = "lenient_reading")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub pressure: Option<f64>,
    #[serde(default, alias = "wind_speed", deserialize_with = "lenient_reading")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    /// Observation time as reported by the provider or client.
    #[serde(default, alias = "observed_at", deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
}

/// Numbers and numeric strings; anything else is `None`.
fn lenient_reading<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let reading = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(reading.filter(|v| v.is_finite()))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl WeatherSnapshot {
    /// The reading for `field`, if present and finite.
    pub fn reading(&self, field: WeatherField) -> Option<f64> {
        let value = match field {
            WeatherField::Temperature => self.temperature,
            WeatherField::Humidity => self.humidity,
            WeatherField::Pressure => self.pressure,
            WeatherField::WindSpeed => self.wind_speed,
        }?;
        value.is_finite().then_some(value)
    }
}
