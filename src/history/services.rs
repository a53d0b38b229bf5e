use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    error::{AppError, FieldError},
    history::{
        dto::RecordSearchRequest,
        repo_types::{NewSearch, SearchEntry},
    },
    state::AppState,
};

const MAX_CITY_LEN: usize = 100;
const MAX_COUNTRY_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 200;

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(crate) fn validate_search(req: RecordSearchRequest) -> Result<NewSearch, Vec<FieldError>> {
    let mut errors = Vec::new();
    let entry = NewSearch {
        city: req.city.trim().to_string(),
        country: non_blank(req.country),
        temperature: req.temperature,
        humidity: req.humidity,
        pressure: req.pressure,
        wind_speed: req.wind_speed,
        description: non_blank(req.description),
    };

    if entry.city.is_empty() {
        errors.push(FieldError::new("city", "This field may not be blank."));
    }
    for (field, value, max) in [
        ("city", Some(&entry.city), MAX_CITY_LEN),
        ("country", entry.country.as_ref(), MAX_COUNTRY_LEN),
        ("description", entry.description.as_ref(), MAX_DESCRIPTION_LEN),
    ] {
        if value.is_some_and(|v| v.chars().count() > max) {
            errors.push(FieldError::new(
                field,
                format!("Ensure this field has no more than {max} characters."),
            ));
        }
    }
    for (field, value) in [("temperature", entry.temperature), ("wind_speed", entry.wind_speed)] {
        if value.is_some_and(|v| !v.is_finite()) {
            errors.push(FieldError::new(field, "A valid number is required."));
        }
    }

    if errors.is_empty() {
        Ok(entry)
    } else {
        Err(errors)
    }
}

#[instrument(skip(state, req))]
pub async fn record_search(
    state: &AppState,
    owner: Uuid,
    req: RecordSearchRequest,
) -> Result<SearchEntry, AppError> {
    let entry =
        validate_search(req).map_err(|errors| AppError::validation("Invalid search", errors))?;
    let saved = state.history.append(owner, entry).await?;
    debug!(search_id = %saved.id, city = %saved.city, "search recorded");
    Ok(saved)
}

pub async fn list_searches(state: &AppState, owner: Uuid) -> Result<Vec<SearchEntry>, AppError> {
    Ok(state.history.list(owner).await?)
}
