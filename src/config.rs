use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub weather: WeatherConfig,
}

/// Unset falls back to `default`; a set value that does not parse is an error.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("{key}: invalid value {raw:?}")),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e).context(key.to_string()),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "weatherdash".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "weatherdash-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24)?,
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").context("SMTP_HOST")?,
            port: env_or("SMTP_PORT", 587)?,
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Weather Dashboard <noreply@localhost>".into()),
            timeout_secs: env_or("SMTP_TIMEOUT_SECS", 10)?,
        };
        let weather = WeatherConfig {
            api_key: std::env::var("OPENWEATHER_API_KEY").context("OPENWEATHER_API_KEY")?,
            base_url: std::env::var("OPENWEATHER_BASE_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org".into()),
            timeout_secs: env_or("OPENWEATHER_TIMEOUT_SECS", 10)?,
        };
        Ok(Self {
            database_url,
            jwt,
            smtp,
            weather,
        })
    }
}
