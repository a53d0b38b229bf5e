use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::WeatherConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// `lat` or `lon` absent, blank or not a number.
    #[error("lat and lon required")]
    MissingCoordinates,
    #[error("weather provider returned status {0}")]
    Upstream(u16),
    #[error("weather provider timed out")]
    Timeout,
    #[error("weather provider request failed: {0}")]
    Request(String),
}

/// Third-party weather data provider.
#[async_trait]
pub trait WeatherGateway: Send + Sync {
    /// Minute-by-minute precipitation forecast, forwarded verbatim.
    async fn fetch_minutely_precipitation(&self, lat: f64, lon: f64)
        -> Result<Value, GatewayError>;
}

/// Parses the raw query values, requiring both.
pub fn parse_coordinates(
    lat: Option<&str>,
    lon: Option<&str>,
) -> Result<(f64, f64), GatewayError> {
    fn one(raw: Option<&str>) -> Option<f64> {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
    match (one(lat), one(lon)) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(GatewayError::MissingCoordinates),
    }
}

/// OpenWeatherMap One Call 3.0 client.
pub struct OpenWeatherGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherGateway {
    pub fn new(config: &WeatherConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl WeatherGateway for OpenWeatherGateway {
    #[instrument(skip(self))]
    async fn fetch_minutely_precipitation(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/data/3.0/onecall", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("exclude", "hourly,daily,current,alerts".to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "weather provider rejected request");
            return Err(GatewayError::Upstream(status.as_u16()));
        }

        let body = resp.json::<Value>().await.map_err(request_error)?;
        debug!("weather provider responded");
        Ok(body)
    }
}

fn request_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Request(e.to_string())
    }
}
