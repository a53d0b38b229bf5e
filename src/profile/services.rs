use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        repo_types::{ProfileChanges, User},
        services::{MAX_NAME_LEN, MAX_PHONE_LEN},
    },
    error::{AppError, FieldError},
    profile::dto::UpdateProfileRequest,
    state::AppState,
};

const MAX_CITY_LEN: usize = 100;
const MAX_PICTURE_LEN: usize = 200;
const TEMPERATURE_UNITS: [&str; 2] = ["C", "F"];

fn too_long(field: &'static str, max: usize) -> FieldError {
    FieldError::new(
        field,
        format!("Ensure this field has no more than {max} characters."),
    )
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string())
}

pub(crate) fn validate_profile(req: UpdateProfileRequest) -> Result<ProfileChanges, Vec<FieldError>> {
    let mut errors = Vec::new();
    let changes = ProfileChanges {
        first_name: trimmed(req.first_name),
        last_name: trimmed(req.last_name),
        phone_number: trimmed(req.phone_number),
        profile_picture: trimmed(req.profile_picture),
        default_city: trimmed(req.default_city),
        temperature_unit: trimmed(req.temperature_unit).map(|u| u.to_uppercase()),
    };

    for (field, value) in [
        ("first_name", &changes.first_name),
        ("last_name", &changes.last_name),
    ] {
        if value.as_ref().is_some_and(|v| v.chars().count() > MAX_NAME_LEN) {
            errors.push(too_long(field, MAX_NAME_LEN));
        }
    }
    if let Some(phone) = &changes.phone_number {
        if phone.chars().count() > MAX_PHONE_LEN {
            errors.push(too_long("phone_number", MAX_PHONE_LEN));
        }
    }
    if let Some(url) = &changes.profile_picture {
        if url.chars().count() > MAX_PICTURE_LEN {
            errors.push(too_long("profile_picture", MAX_PICTURE_LEN));
        } else if !url.is_empty() && !is_http_url(url) {
            errors.push(FieldError::new("profile_picture", "Enter a valid URL."));
        }
    }
    if let Some(city) = &changes.default_city {
        if city.chars().count() > MAX_CITY_LEN {
            errors.push(too_long("default_city", MAX_CITY_LEN));
        }
    }
    if let Some(unit) = &changes.temperature_unit {
        if !TEMPERATURE_UNITS.contains(&unit.as_str()) {
            errors.push(FieldError::new(
                "temperature_unit",
                format!("\"{unit}\" is not a valid choice."),
            ));
        }
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/') && !host.contains(char::is_whitespace))
}

pub async fn get_profile(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound)
}

#[instrument(skip(state, req))]
pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<User, AppError> {
    let changes =
        validate_profile(req).map_err(|errors| AppError::validation("Invalid profile", errors))?;
    let user = state
        .users
        .update_profile(user_id, &changes)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}
