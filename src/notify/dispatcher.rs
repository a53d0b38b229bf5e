use std::{sync::Arc, time::Duration};

use handlebars::Handlebars;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    alerts::repo_types::Alert,
    auth::services::is_valid_email,
    notify::{
        mailer::{MailError, Mailer, OutgoingEmail},
        templates::{self, AlertEmailContext},
    },
    weather::WeatherSnapshot,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("recipient email is missing or malformed")]
    InvalidRecipient,
    #[error("email delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("failed to render email: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// What an alert email says about the alert itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertNotice {
    pub city: Option<String>,
    pub condition: String,
    pub threshold: String,
    pub unit: String,
}

impl From<&Alert> for AlertNotice {
    fn from(a: &Alert) -> Self {
        Self {
            city: Some(a.city.clone()),
            condition: a.condition.label(),
            threshold: a.value.to_string(),
            unit: a.unit.clone(),
        }
    }
}

/// Sends alert and test notifications, one email per call.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    templates: Arc<Handlebars<'static>>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            mailer,
            templates: Arc::new(templates::registry()?),
            timeout,
        })
    }

    #[instrument(skip(self, notice, snapshot), fields(city = ?notice.city))]
    pub async fn send_alert_notification(
        &self,
        recipient: &str,
        notice: &AlertNotice,
        snapshot: &WeatherSnapshot,
    ) -> Result<(), DispatchError> {
        let to = checked_recipient(recipient)?;
        let email = compose_alert_email(&self.templates, to, notice, snapshot)?;
        self.deliver(&email).await?;
        info!("alert notification sent");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn send_test_notification(&self, recipient: &str) -> Result<(), DispatchError> {
        let to = checked_recipient(recipient)?;
        let email = compose_test_email(&self.templates, to)?;
        self.deliver(&email).await?;
        info!("test notification sent");
        Ok(())
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        match tokio::time::timeout(self.timeout, self.mailer.send(email)).await {
            Ok(res) => res.map_err(DispatchError::from),
            Err(_) => {
                warn!(timeout = ?self.timeout, "email delivery timed out");
                Err(DispatchError::Timeout(self.timeout))
            }
        }
    }
}

fn checked_recipient(recipient: &str) -> Result<&str, DispatchError> {
    let to = recipient.trim();
    if to.is_empty() || !is_valid_email(to) {
        return Err(DispatchError::InvalidRecipient);
    }
    Ok(to)
}

fn reading(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

pub(crate) fn compose_alert_email(
    registry: &Handlebars<'_>,
    to: &str,
    notice: &AlertNotice,
    snapshot: &WeatherSnapshot,
) -> Result<OutgoingEmail, DispatchError> {
    let ctx = AlertEmailContext {
        city: notice
            .city
            .clone()
            .unwrap_or_else(|| "Unknown City".into()),
        condition: format!("{} {}{}", notice.condition, notice.threshold, notice.unit),
        temperature: reading(snapshot.temperature),
        humidity: reading(snapshot.humidity),
        pressure: reading(snapshot.pressure),
        wind_speed: reading(snapshot.wind_speed),
        description: snapshot.description.clone().unwrap_or_else(|| "N/A".into()),
        observed: snapshot
            .timestamp
            .clone()
            .unwrap_or_else(|| "unknown time".into()),
    };

    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: registry.render(templates::ALERT_SUBJECT, &ctx)?,
        text_body: registry.render(templates::ALERT_TEXT, &ctx)?,
        html_body: Some(registry.render(templates::ALERT_HTML, &ctx)?),
    })
}

pub(crate) fn compose_test_email(
    registry: &Handlebars<'_>,
    to: &str,
) -> Result<OutgoingEmail, DispatchError> {
    let ctx = serde_json::json!({});
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: registry.render(templates::TEST_SUBJECT, &ctx)?,
        text_body: registry.render(templates::TEST_TEXT, &ctx)?,
        html_body: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingMailer;
    use crate::notify::templates::registry;

    fn notice() -> AlertNotice {
        AlertNotice {
            city: Some("Lagos".into()),
            condition: "Temperature Above".into(),
            threshold: "25".into(),
            unit: "°C".into(),
        }
    }

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: Some(26.0),
            humidity: Some(80.0),
            pressure: Some(1012.0),
            wind_speed: Some(3.5),
            description: Some("light rain".into()),
            timestamp: Some("2025-06-01T12:00:00Z".into()),
        }
    }

    fn dispatcher(mailer: Arc<RecordingMailer>) -> NotificationDispatcher {
        NotificationDispatcher::new(mailer, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn alert_email_names_city_condition_and_readings() {
        let email = compose_alert_email(&registry().unwrap(), "bob@x.com", &notice(), &snapshot()).unwrap();
        assert_eq!(email.subject, "Weather Alert: Lagos");
        for needle in [
            "Temperature Above 25°C",
            "Temperature: 26°C",
            "Humidity: 80%",
            "Pressure: 1012 hPa",
            "Wind Speed: 3.5 m/s",
            "Description: light rain",
            "2025-06-01T12:00:00Z",
        ] {
            assert!(email.text_body.contains(needle), "missing {needle}");
        }
        assert!(email.html_body.unwrap().contains("Lagos"));
    }

    #[test]
    fn absent_readings_render_as_not_available() {
        let email = compose_alert_email(&registry().unwrap(), "bob@x.com", &notice(), &WeatherSnapshot::default())
            .unwrap();
        assert!(email.text_body.contains("Humidity: N/A%"));
        assert!(email.text_body.contains("unknown time"));
    }

    #[test]
    fn html_body_escapes_client_text() {
        let mut n = notice();
        n.city = Some("<script>".into());
        let email = compose_alert_email(&registry().unwrap(), "bob@x.com", &n, &snapshot()).unwrap();
        let html = email.html_body.unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn empty_recipient_is_rejected_without_sending() {
        let mailer = Arc::new(RecordingMailer::default());
        let d = dispatcher(mailer.clone());

        let err = d
            .send_alert_notification("", &notice(), &snapshot())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRecipient));
        let err = d.send_test_notification("   ").await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRecipient));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn one_call_sends_exactly_one_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let d = dispatcher(mailer.clone());

        d.send_alert_notification("bob@x.com", &notice(), &snapshot())
            .await
            .unwrap();
        d.send_test_notification("bob@x.com").await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "bob@x.com");
        assert_eq!(sent[1].subject, "Test Email - Weather Dashboard");
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_dispatch_error() {
        let mailer = Arc::new(RecordingMailer::default());
        mailer.fail_next_sends(true);
        let d = dispatcher(mailer.clone());

        let err = d.send_test_notification("bob@x.com").await.unwrap_err();
        assert!(matches!(err, DispatchError::Mail(MailError::Transport(_))));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn slow_transport_times_out() {
        let mailer = Arc::new(RecordingMailer::with_delay(Duration::from_millis(200)));
        let d = NotificationDispatcher::new(mailer, Duration::from_millis(10)).unwrap();

        let err = d.send_test_notification("bob@x.com").await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(_)));
    }
}
