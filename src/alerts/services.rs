use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    alerts::{
        dto::{CreateAlertRequest, EvaluationOutcome, UpdateAlertRequest},
        evaluator::evaluate,
        repo_types::{Alert, AlertChanges, AlertCondition, NewAlert},
    },
    error::{AppError, FieldError},
    notify::AlertNotice,
    state::AppState,
    weather::WeatherSnapshot,
};

const MAX_CITY_LEN: usize = 100;
const MAX_UNIT_LEN: usize = 10;
const MAX_ABS_VALUE: f64 = 1_000_000.0;
const DEFAULT_UNIT: &str = "°C";

fn check_city_name(city: &str, errors: &mut Vec<FieldError>) {
    if city.is_empty() {
        errors.push(FieldError::new("city", "This field may not be blank."));
    } else if city.chars().count() > MAX_CITY_LEN {
        errors.push(FieldError::new(
            "city",
            format!("Ensure this field has no more than {MAX_CITY_LEN} characters."),
        ));
    }
}

fn check_condition(raw: &str, errors: &mut Vec<FieldError>) -> Option<AlertCondition> {
    match raw.parse::<AlertCondition>() {
        Ok(c) => Some(c),
        Err(e) => {
            errors.push(FieldError::new("condition", e.to_string()));
            None
        }
    }
}

fn check_value(value: f64, errors: &mut Vec<FieldError>) {
    if !value.is_finite() || value.abs() >= MAX_ABS_VALUE {
        errors.push(FieldError::new("value", "A valid number is required."));
    }
}

fn check_unit(unit: &str, errors: &mut Vec<FieldError>) {
    if unit.chars().count() > MAX_UNIT_LEN {
        errors.push(FieldError::new(
            "unit",
            format!("Ensure this field has no more than {MAX_UNIT_LEN} characters."),
        ));
    }
}

pub(crate) fn validate_new_alert(req: CreateAlertRequest) -> Result<NewAlert, Vec<FieldError>> {
    let mut errors = Vec::new();
    let city = req.city.trim().to_string();
    check_city_name(&city, &mut errors);
    let condition = check_condition(&req.condition, &mut errors);
    match req.value {
        Some(v) => check_value(v, &mut errors),
        None => errors.push(FieldError::new("value", "This field is required.")),
    }
    let unit = req
        .unit
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_UNIT.to_string());
    check_unit(&unit, &mut errors);

    match (condition, req.value) {
        (Some(condition), Some(value)) if errors.is_empty() => Ok(NewAlert {
            city,
            condition,
            value,
            unit,
        }),
        _ => Err(errors),
    }
}

pub(crate) fn validate_changes(req: UpdateAlertRequest) -> Result<AlertChanges, Vec<FieldError>> {
    let mut errors = Vec::new();
    let city = req.city.map(|c| c.trim().to_string());
    if let Some(city) = &city {
        check_city_name(city, &mut errors);
    }
    let condition = req
        .condition
        .as_deref()
        .and_then(|raw| check_condition(raw, &mut errors));
    if let Some(v) = req.value {
        check_value(v, &mut errors);
    }
    let unit = req.unit.map(|u| u.trim().to_string());
    if let Some(unit) = &unit {
        check_unit(unit, &mut errors);
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(AlertChanges {
        city,
        condition,
        value: req.value,
        unit,
        is_active: req.is_active,
    })
}

#[instrument(skip(state, req))]
pub async fn create_alert(
    state: &AppState,
    owner: Uuid,
    req: CreateAlertRequest,
) -> Result<Alert, AppError> {
    let new = validate_new_alert(req)
        .map_err(|errors| AppError::validation("Invalid alert", errors))?;
    let alert = state.alerts.create(owner, new).await?;
    info!(alert_id = %alert.id, condition = %alert.condition, "alert created");
    Ok(alert)
}

pub async fn list_alerts(
    state: &AppState,
    owner: Uuid,
    include_inactive: bool,
) -> Result<Vec<Alert>, AppError> {
    let alerts = if include_inactive {
        state.alerts.list_all(owner).await?
    } else {
        state.alerts.list_active(owner).await?
    };
    Ok(alerts)
}

pub async fn get_alert(state: &AppState, owner: Uuid, id: Uuid) -> Result<Alert, AppError> {
    state.alerts.get(owner, id).await?.ok_or(AppError::NotFound)
}

#[instrument(skip(state, req))]
pub async fn update_alert(
    state: &AppState,
    owner: Uuid,
    id: Uuid,
    req: UpdateAlertRequest,
) -> Result<Alert, AppError> {
    let changes =
        validate_changes(req).map_err(|errors| AppError::validation("Invalid alert", errors))?;
    let alert = state
        .alerts
        .update(owner, id, &changes)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(alert_id = %alert.id, "alert updated");
    Ok(alert)
}

#[instrument(skip(state))]
pub async fn delete_alert(state: &AppState, owner: Uuid, id: Uuid) -> Result<(), AppError> {
    if !state.alerts.delete(owner, id).await? {
        return Err(AppError::NotFound);
    }
    info!(alert_id = %id, "alert deleted");
    Ok(())
}

/// `now`, truncated to the microsecond precision the database keeps, so a
/// stored trigger time compares equal to the value that was written.
fn trigger_timestamp() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.microsecond() * 1_000)
        .unwrap_or(now)
}

async fn recipient_for(state: &AppState, owner: Uuid) -> Result<String, AppError> {
    let user = state
        .users
        .find_by_id(owner)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(user.email)
}

/// Evaluates `alert` as it was read, persists the trigger transition with a
/// compare-and-set and notifies on a won transition. A concurrent evaluator
/// that lost the compare-and-set reports `already_triggered` and sends nothing.
pub(crate) async fn run_pipeline(
    state: &AppState,
    alert: &Alert,
    recipient: &str,
    snapshot: &WeatherSnapshot,
) -> Result<EvaluationOutcome, AppError> {
    if !alert.is_active {
        return Ok(EvaluationOutcome::skipped(alert.id, "alert is inactive"));
    }

    let eval = match evaluate(alert, snapshot) {
        Ok(eval) => eval,
        Err(e) => {
            debug!(alert_id = %alert.id, error = %e, "alert skipped");
            return Ok(EvaluationOutcome::skipped(alert.id, e.to_string()));
        }
    };

    let mut outcome = EvaluationOutcome {
        already_triggered: eval.already_triggered,
        observed: Some(eval.observed),
        ..EvaluationOutcome::quiet(alert.id)
    };

    if eval.fired {
        let at = trigger_timestamp();
        let claimed = state
            .alerts
            .set_trigger_state(alert.user_id, alert.id, None, Some(at))
            .await?;
        if !claimed {
            info!(alert_id = %alert.id, "trigger already claimed by another evaluation");
            outcome.already_triggered = true;
            return Ok(outcome);
        }

        let notice = AlertNotice::from(alert);
        if let Err(e) = state
            .dispatcher
            .send_alert_notification(recipient, &notice, snapshot)
            .await
        {
            // Release the claim so the next evaluation retries delivery.
            if let Err(release) = state
                .alerts
                .set_trigger_state(alert.user_id, alert.id, Some(at), None)
                .await
            {
                error!(alert_id = %alert.id, error = %release, "failed to release trigger claim");
            }
            warn!(alert_id = %alert.id, error = %e, "alert notification failed");
            return Err(e.into());
        }

        info!(alert_id = %alert.id, observed = eval.observed, "alert fired");
        outcome.fired = true;
        outcome.notified = true;
    } else if eval.rearms() {
        outcome.rearmed = state
            .alerts
            .set_trigger_state(alert.user_id, alert.id, alert.last_triggered, None)
            .await?;
        if outcome.rearmed {
            info!(alert_id = %alert.id, "alert re-armed");
        }
    }

    Ok(outcome)
}

/// Evaluates one owned alert against a caller supplied snapshot.
#[instrument(skip(state, snapshot))]
pub async fn evaluate_alert(
    state: &AppState,
    owner: Uuid,
    id: Uuid,
    snapshot: &WeatherSnapshot,
) -> Result<EvaluationOutcome, AppError> {
    let alert = get_alert(state, owner, id).await?;
    let recipient = recipient_for(state, owner).await?;
    run_pipeline(state, &alert, &recipient, snapshot).await
}

/// Both names compared case-insensitively, either containing the other.
pub(crate) fn city_matches(alert_city: &str, observed_city: &str) -> bool {
    let a = alert_city.trim().to_lowercase();
    let b = observed_city.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Evaluates every active alert of `owner` for `city`. Failures of a single
/// alert's notification are reported on that alert only.
#[instrument(skip(state, snapshot))]
pub async fn check_city(
    state: &AppState,
    owner: Uuid,
    city: &str,
    snapshot: &WeatherSnapshot,
) -> Result<Vec<EvaluationOutcome>, AppError> {
    let alerts = state.alerts.list_active(owner).await?;
    let matching: Vec<_> = alerts
        .into_iter()
        .filter(|a| city_matches(&a.city, city))
        .collect();
    if matching.is_empty() {
        return Ok(Vec::new());
    }

    let recipient = recipient_for(state, owner).await?;
    let mut outcomes = Vec::with_capacity(matching.len());
    for alert in &matching {
        match run_pipeline(state, alert, &recipient, snapshot).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(AppError::Dispatch(e)) => outcomes.push(EvaluationOutcome {
                error: Some(e.to_string()),
                ..EvaluationOutcome::quiet(alert.id)
            }),
            Err(other) => return Err(other),
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{dto::SignupRequest, services::signup};
    use crate::memory::RecordingMailer;
    use std::sync::Arc;

    async fn user(state: &AppState, username: &str, email: &str) -> Uuid {
        signup(
            state,
            SignupRequest {
                username: username.into(),
                email: email.into(),
                password: "hunter2hunter2".into(),
                confirm_password: "hunter2hunter2".into(),
                first_name: String::new(),
                last_name: String::new(),
                phone_number: None,
            },
        )
        .await
        .expect("signup")
        .id
    }

    fn create_req(city: &str, condition: &str, value: f64) -> CreateAlertRequest {
        CreateAlertRequest {
            city: city.into(),
            condition: condition.into(),
            value: Some(value),
            unit: None,
        }
    }

    fn temperature(t: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: Some(t),
            description: Some("hot".into()),
            ..Default::default()
        }
    }

    fn fake_with_mailer() -> (AppState, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        (AppState::fake_with_mailer(mailer.clone()), mailer)
    }

    #[test]
    fn new_alert_validation_reports_all_fields() {
        let errors = validate_new_alert(CreateAlertRequest {
            city: "  ".into(),
            condition: "visibility_above".into(),
            value: None,
            unit: Some("much-too-long-unit".into()),
        })
        .unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["city", "condition", "value", "unit"]);
    }

    #[test]
    fn new_alert_defaults_unit() {
        let new = validate_new_alert(create_req("Lagos", "temperature-above", 25.0)).unwrap();
        assert_eq!(new.unit, "°C");
        assert_eq!(new.condition.to_string(), "temperature_above");
    }

    #[test]
    fn city_matching_is_loose() {
        assert!(city_matches("Lagos", "lagos"));
        assert!(city_matches("Lagos, NG", "Lagos"));
        assert!(city_matches("Lagos", "Lagos Island"));
        assert!(!city_matches("Lagos", "Abuja"));
        assert!(!city_matches("", "Abuja"));
    }

    #[tokio::test]
    async fn created_alert_is_active_and_untriggered() {
        let (state, _) = fake_with_mailer();
        let owner = user(&state, "gina", "gina@example.com").await;
        let alert = create_alert(&state, owner, create_req("Oslo", "temperature_below", -5.0))
            .await
            .unwrap();
        assert!(alert.is_active);
        assert!(alert.last_triggered.is_none());
        assert_eq!(alert.user_id, owner);
    }

    #[tokio::test]
    async fn list_active_hides_disabled_alerts() {
        let (state, _) = fake_with_mailer();
        let owner = user(&state, "hank", "hank@example.com").await;
        let a = create_alert(&state, owner, create_req("Oslo", "humidity_above", 90.0))
            .await
            .unwrap();
        create_alert(&state, owner, create_req("Rome", "pressure_below", 990.0))
            .await
            .unwrap();
        update_alert(
            &state,
            owner,
            a.id,
            UpdateAlertRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(list_alerts(&state, owner, false).await.unwrap().len(), 1);
        assert_eq!(list_alerts(&state, owner, true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_owners_alerts_are_not_found() {
        let (state, _) = fake_with_mailer();
        let a = user(&state, "anna", "anna@example.com").await;
        let b = user(&state, "bert", "bert@example.com").await;
        let alert = create_alert(&state, b, create_req("Lagos", "temperature_above", 25.0))
            .await
            .unwrap();

        assert!(matches!(get_alert(&state, a, alert.id).await, Err(AppError::NotFound)));
        assert!(matches!(
            update_alert(&state, a, alert.id, UpdateAlertRequest::default()).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(delete_alert(&state, a, alert.id).await, Err(AppError::NotFound)));
        assert!(matches!(
            evaluate_alert(&state, a, alert.id, &temperature(30.0)).await,
            Err(AppError::NotFound)
        ));

        assert_eq!(get_alert(&state, b, alert.id).await.unwrap().id, alert.id);
        let updated = update_alert(
            &state,
            b,
            alert.id,
            UpdateAlertRequest {
                value: Some(27.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.value, 27.5);
        delete_alert(&state, b, alert.id).await.unwrap();
        assert!(matches!(get_alert(&state, b, alert.id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn fires_once_per_satisfied_window() {
        let (state, mailer) = fake_with_mailer();
        let bob = user(&state, "bob", "bob@x.com").await;
        let alert = create_alert(&state, bob, create_req("Lagos", "temperature_above", 25.0))
            .await
            .unwrap();

        let first = evaluate_alert(&state, bob, alert.id, &temperature(26.0)).await.unwrap();
        assert!(first.fired && first.notified);
        let stored = get_alert(&state, bob, alert.id).await.unwrap();
        assert!(stored.last_triggered.is_some());
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].to, "bob@x.com");
        assert_eq!(mailer.sent()[0].subject, "Weather Alert: Lagos");

        let second = evaluate_alert(&state, bob, alert.id, &temperature(26.0)).await.unwrap();
        assert!(!second.fired && second.already_triggered);
        assert_eq!(mailer.sent().len(), 1);

        let cooled = evaluate_alert(&state, bob, alert.id, &temperature(20.0)).await.unwrap();
        assert!(cooled.rearmed);
        assert!(get_alert(&state, bob, alert.id).await.unwrap().last_triggered.is_none());

        let again = evaluate_alert(&state, bob, alert.id, &temperature(26.0)).await.unwrap();
        assert!(again.fired);
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn stale_concurrent_evaluation_does_not_double_fire() {
        let (state, mailer) = fake_with_mailer();
        let owner = user(&state, "ivy", "ivy@example.com").await;
        let alert = create_alert(&state, owner, create_req("Lagos", "temperature_above", 25.0))
            .await
            .unwrap();

        // Both evaluators read the alert before either persisted a trigger.
        let seen_by_a = get_alert(&state, owner, alert.id).await.unwrap();
        let seen_by_b = seen_by_a.clone();

        let a = run_pipeline(&state, &seen_by_a, "ivy@example.com", &temperature(30.0))
            .await
            .unwrap();
        let b = run_pipeline(&state, &seen_by_b, "ivy@example.com", &temperature(30.0))
            .await
            .unwrap();

        assert!(a.fired);
        assert!(!b.fired && b.already_triggered && !b.notified);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_releases_the_trigger() {
        let (state, mailer) = fake_with_mailer();
        let owner = user(&state, "jay", "jay@example.com").await;
        let alert = create_alert(&state, owner, create_req("Lagos", "temperature_above", 25.0))
            .await
            .unwrap();

        mailer.fail_next_sends(true);
        let err = evaluate_alert(&state, owner, alert.id, &temperature(30.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Dispatch(_)));
        assert!(get_alert(&state, owner, alert.id).await.unwrap().last_triggered.is_none());

        mailer.fail_next_sends(false);
        let retry = evaluate_alert(&state, owner, alert.id, &temperature(30.0)).await.unwrap();
        assert!(retry.notified);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn incomplete_snapshot_and_inactive_alerts_are_skipped() {
        let (state, mailer) = fake_with_mailer();
        let owner = user(&state, "kim", "kim@example.com").await;
        let wind = create_alert(&state, owner, create_req("Lagos", "wind_speed_above", 5.0))
            .await
            .unwrap();
        let temp = create_alert(&state, owner, create_req("Lagos", "temperature_above", 25.0))
            .await
            .unwrap();
        let off = create_alert(&state, owner, create_req("Lagos", "temperature_above", 0.0))
            .await
            .unwrap();
        update_alert(
            &state,
            owner,
            off.id,
            UpdateAlertRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let single = evaluate_alert(&state, owner, wind.id, &temperature(30.0)).await.unwrap();
        assert!(single.skipped.is_some());

        let inactive = evaluate_alert(&state, owner, off.id, &temperature(30.0)).await.unwrap();
        assert_eq!(inactive.skipped.as_deref(), Some("alert is inactive"));

        let outcomes = check_city(&state, owner, "lagos", &temperature(30.0)).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        let by_id = |id: Uuid| outcomes.iter().find(|o| o.alert_id == id).unwrap();
        assert!(by_id(wind.id).skipped.is_some());
        assert!(by_id(temp.id).fired);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn check_city_ignores_other_cities() {
        let (state, mailer) = fake_with_mailer();
        let owner = user(&state, "lou", "lou@example.com").await;
        create_alert(&state, owner, create_req("Abuja", "temperature_above", 25.0))
            .await
            .unwrap();

        let outcomes = check_city(&state, owner, "Lagos", &temperature(30.0)).await.unwrap();
        assert!(outcomes.is_empty());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn check_city_reports_dispatch_failure_per_alert() {
        let (state, mailer) = fake_with_mailer();
        let owner = user(&state, "max", "max@example.com").await;
        let alert = create_alert(&state, owner, create_req("Lagos", "temperature_above", 25.0))
            .await
            .unwrap();
        mailer.fail_next_sends(true);

        let outcomes = check_city(&state, owner, "Lagos", &temperature(30.0)).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].alert_id, alert.id);
        assert!(outcomes[0].error.is_some());
        assert!(!outcomes[0].notified);
    }
}
