use serde::Serialize;
use thiserror::Error;

use crate::{alerts::repo_types::Alert, weather::WeatherSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// The snapshot lacks the reading the alert watches. The alert is skipped.
    #[error("snapshot has no usable {0} reading")]
    IncompleteSnapshot(&'static str),
}

/// Decision for one alert against one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    /// The condition holds for this snapshot.
    pub satisfied: bool,
    /// The condition newly holds: notify and record `last_triggered`.
    pub fired: bool,
    /// The alert was already in its satisfied window before this snapshot.
    pub already_triggered: bool,
    pub observed: f64,
}

impl Evaluation {
    /// The satisfied window has closed; `last_triggered` should be cleared so
    /// the next satisfaction fires again.
    pub fn rearms(&self) -> bool {
        !self.satisfied && self.already_triggered
    }
}

/// Edge-triggered check of `alert` against `snapshot`. Pure: the caller
/// persists the trigger state and dispatches the notification.
pub fn evaluate(alert: &Alert, snapshot: &WeatherSnapshot) -> Result<Evaluation, EvaluationError> {
    let field = alert.condition.field;
    let observed = snapshot
        .reading(field)
        .ok_or(EvaluationError::IncompleteSnapshot(field.key()))?;

    let satisfied = alert.condition.operator.holds(observed, alert.value);
    let already_triggered = alert.last_triggered.is_some();

    Ok(Evaluation {
        satisfied,
        fired: satisfied && !already_triggered,
        already_triggered,
        observed,
    })
}
