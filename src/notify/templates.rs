use anyhow::Context;
use handlebars::Handlebars;
use serde::Serialize;

pub const ALERT_SUBJECT: &str = "weather-alert-subject";
pub const ALERT_TEXT: &str = "weather-alert-text";
pub const ALERT_HTML: &str = "weather-alert-html";
pub const TEST_SUBJECT: &str = "test-email-subject";
pub const TEST_TEXT: &str = "test-email-text";

/// Values an alert email is rendered from, already formatted for display.
#[derive(Debug, Serialize)]
pub struct AlertEmailContext {
    pub city: String,
    pub condition: String,
    pub temperature: String,
    pub humidity: String,
    pub pressure: String,
    pub wind_speed: String,
    pub description: String,
    pub observed: String,
}

/// Builds the registry with every email template. HTML escaping is the
/// handlebars default; the subject and text templates use triple-stash.
pub fn registry() -> anyhow::Result<Handlebars<'static>> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    register_templates(&mut registry)?;
    Ok(registry)
}

fn register_templates(registry: &mut Handlebars<'_>) -> anyhow::Result<()> {
    registry
        .register_template_string(ALERT_SUBJECT, r#"Weather Alert: {{{city}}}"#)
        .context("registering weather-alert subject template")?;

    registry
        .register_template_string(
            ALERT_TEXT,
            r#"Weather Alert
Your weather alert condition has been met!

Alert Details
City: {{{city}}}
Condition: {{{condition}}}

Current Weather
Temperature: {{{temperature}}}°C
Humidity: {{{humidity}}}%
Pressure: {{{pressure}}} hPa
Wind Speed: {{{wind_speed}}} m/s
Description: {{{description}}}

This alert was triggered at {{{observed}}}.

This is an automated weather alert from your Weather Dashboard.
"#,
        )
        .context("registering weather-alert text template")?;

    registry
        .register_template_string(
            ALERT_HTML,
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <h1>Weather Alert</h1>
    <p>Your weather alert condition has been met!</p>
    <h2>Alert Details</h2>
    <p><strong>City:</strong> {{city}}</p>
    <p><strong>Condition:</strong> {{condition}}</p>
    <h3>Current Weather</h3>
    <p><strong>Temperature:</strong> {{temperature}}°C</p>
    <p><strong>Humidity:</strong> {{humidity}}%</p>
    <p><strong>Pressure:</strong> {{pressure}} hPa</p>
    <p><strong>Wind Speed:</strong> {{wind_speed}} m/s</p>
    <p><strong>Description:</strong> {{description}}</p>
    <p>This alert was triggered at {{observed}}.</p>
    <p>This is an automated weather alert from your Weather Dashboard.</p>
</div>"#,
        )
        .context("registering weather-alert html template")?;

    registry
        .register_template_string(TEST_SUBJECT, "Test Email - Weather Dashboard")
        .context("registering test-email subject template")?;

    registry
        .register_template_string(
            TEST_TEXT,
            r#"Hello!

This is a test email from your Weather Dashboard alert system.

If you received this email, your email notifications are working correctly!

Best regards,
Weather Dashboard Team
"#,
        )
        .context("registering test-email text template")?;

    Ok(())
}
