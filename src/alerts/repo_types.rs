use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// Weather variable an alert watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherField {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
}

impl WeatherField {
    pub fn key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::WindSpeed => "wind_speed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Pressure => "Pressure",
            Self::WindSpeed => "Wind Speed",
        }
    }
}

/// Strict comparison applied against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn holds(self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => observed > threshold,
            Self::LessThan => observed < threshold,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::GreaterThan => "above",
            Self::LessThan => "below",
        }
    }
}

/// Field plus operator. Stored and exchanged as `temperature_above` style
/// keys; `temperature-above` is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlertCondition {
    pub field: WeatherField,
    pub operator: Comparison,
}

impl AlertCondition {
    pub const fn new(field: WeatherField, operator: Comparison) -> Self {
        Self { field, operator }
    }

    /// Human readable form, e.g. `Temperature Above`.
    pub fn label(&self) -> String {
        let op = match self.operator {
            Comparison::GreaterThan => "Above",
            Comparison::LessThan => "Below",
        };
        format!("{} {}", self.field.label(), op)
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field.key(), self.operator.suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCondition(pub String);

impl fmt::Display for UnknownCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" is not a valid choice.", self.0)
    }
}

impl std::error::Error for UnknownCondition {}

impl FromStr for AlertCondition {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let (field, op) = normalized
            .rsplit_once('_')
            .ok_or_else(|| UnknownCondition(s.to_string()))?;
        let field = match field {
            "temperature" => WeatherField::Temperature,
            "humidity" => WeatherField::Humidity,
            "pressure" => WeatherField::Pressure,
            "wind_speed" => WeatherField::WindSpeed,
            _ => return Err(UnknownCondition(s.to_string())),
        };
        let operator = match op {
            "above" => Comparison::GreaterThan,
            "below" => Comparison::LessThan,
            _ => return Err(UnknownCondition(s.to_string())),
        };
        Ok(Self { field, operator })
    }
}

impl TryFrom<String> for AlertCondition {
    type Error = UnknownCondition;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlertCondition> for String {
    fn from(c: AlertCondition) -> Self {
        c.to_string()
    }
}

/// A threshold condition on a weather variable for a city, owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub city: String,
    pub condition: AlertCondition,
    pub value: f64,
    pub unit: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_triggered: Option<OffsetDateTime>,
}

/// Raw `weather_alerts` row; `condition` is still text.
#[derive(Debug, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub city: String,
    pub condition: String,
    pub value: f64,
    pub unit: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub last_triggered: Option<OffsetDateTime>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = StoreError;

    fn try_from(r: AlertRow) -> Result<Self, Self::Error> {
        let condition = r
            .condition
            .parse()
            .map_err(|e: UnknownCondition| StoreError::Corrupt(format!("alert {}: {}", r.id, e)))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            city: r.city,
            condition,
            value: r.value,
            unit: r.unit,
            is_active: r.is_active,
            created_at: r.created_at,
            last_triggered: r.last_triggered,
        })
    }
}

/// Validated input for a new alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub city: String,
    pub condition: AlertCondition,
    pub value: f64,
    pub unit: String,
}

/// Owner-editable alert fields; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct AlertChanges {
    pub city: Option<String>,
    pub condition: Option<AlertCondition>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub is_active: Option<bool>,
}
