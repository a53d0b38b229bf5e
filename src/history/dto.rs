use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RecordSearchRequest {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<i32>,
    #[serde(default)]
    pub pressure: Option<i32>,
    #[serde(default, alias = "windSpeed")]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}
