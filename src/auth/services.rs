use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::SignupRequest,
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_against_decoy, verify_password},
        repo_types::{NewUser, Session, User},
    },
    error::{AppError, FieldError, StoreError},
    state::AppState,
};

pub(crate) const MAX_NAME_LEN: usize = 150;
pub(crate) const MAX_PHONE_LEN: usize = 15;
const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checks the shape of a signup request. Uniqueness is checked separately.
pub(crate) fn validate_signup(req: &SignupRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if req.username.is_empty() {
        errors.push(FieldError::new("username", "This field may not be blank."));
    } else if req.username.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            "username",
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ));
    } else if !USERNAME_RE.is_match(&req.username) {
        errors.push(FieldError::new(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }

    if req.email.is_empty() {
        errors.push(FieldError::new("email", "This field may not be blank."));
    } else if !is_valid_email(&req.email) {
        errors.push(FieldError::new("email", "Enter a valid email address."));
    }

    if req.password.is_empty() {
        errors.push(FieldError::new("password", "This field may not be blank."));
    } else if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    if req.password != req.confirm_password {
        errors.push(FieldError::new("confirm_password", "Passwords don't match"));
    }

    for (field, value) in [("first_name", &req.first_name), ("last_name", &req.last_name)] {
        if value.chars().count() > MAX_NAME_LEN {
            errors.push(FieldError::new(
                field,
                format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
            ));
        }
    }
    if let Some(phone) = &req.phone_number {
        if phone.chars().count() > MAX_PHONE_LEN {
            errors.push(FieldError::new(
                "phone_number",
                format!("Ensure this field has no more than {MAX_PHONE_LEN} characters."),
            ));
        }
    }

    errors
}

fn conflict_error(field: &'static str) -> FieldError {
    match field {
        "email" => FieldError::new("email", "user with this email already exists."),
        _ => FieldError::new("username", "A user with that username already exists."),
    }
}

/// Creates an account. All field problems are reported together.
pub async fn signup(state: &AppState, mut req: SignupRequest) -> Result<User, AppError> {
    req.username = req.username.trim().to_string();
    req.email = req.email.trim().to_lowercase();
    req.first_name = req.first_name.trim().to_string();
    req.last_name = req.last_name.trim().to_string();
    req.phone_number = req
        .phone_number
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let mut errors = validate_signup(&req);

    if !errors.iter().any(|e| e.field == "username")
        && state.users.find_by_username(&req.username).await?.is_some()
    {
        errors.push(conflict_error("username"));
    }
    if !errors.iter().any(|e| e.field == "email")
        && state.users.find_by_email(&req.email).await?.is_some()
    {
        errors.push(conflict_error("email"));
    }

    if !errors.is_empty() {
        warn!(username = %req.username, count = errors.len(), "signup rejected");
        return Err(AppError::validation("Signup failed", errors));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict { field } => {
                AppError::validation("Signup failed", vec![conflict_error(field)])
            }
            other => AppError::Store(other),
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
    pub token: String,
}

fn password_matches(user: &User, password: &str) -> bool {
    match verify_password(password, &user.password_hash) {
        Ok(ok) => ok,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "stored password hash unreadable");
            false
        }
    }
}

/// Resolves `identifier` as a username, then as an email, and checks the
/// password. Every failure is the same `InvalidCredentials`.
pub async fn login(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<LoginOutcome, AppError> {
    let identifier = identifier.trim();
    let mut matched: Option<User> = None;
    let mut checked: Option<Uuid> = None;

    if let Some(user) = state.users.find_by_username(identifier).await? {
        checked = Some(user.id);
        if password_matches(&user, password) {
            matched = Some(user);
        }
    }

    if matched.is_none() {
        let email = identifier.to_lowercase();
        if let Some(user) = state.users.find_by_email(&email).await? {
            if checked != Some(user.id) {
                checked = Some(user.id);
                if password_matches(&user, password) {
                    matched = Some(user);
                }
            }
        }
    }

    let Some(mut user) = matched else {
        if checked.is_none() {
            verify_against_decoy(password);
        }
        warn!("login rejected");
        return Err(AppError::InvalidCredentials);
    };

    let keys = JwtKeys::from_ref(state);
    let now = OffsetDateTime::now_utc();
    let expires_at = now + TimeDuration::seconds(keys.ttl.as_secs() as i64);

    state.users.touch_last_login(user.id, now).await?;
    user.last_login = Some(now);

    let session = state.sessions.create(user.id, expires_at).await?;
    let token = keys.sign(user.id, session.id, session.expires_at)?;

    info!(user_id = %user.id, session_id = %session.id, "user logged in");
    Ok(LoginOutcome {
        user,
        session,
        token,
    })
}

/// Ends the session behind `token`, if any. Succeeds for missing, invalid
/// or already revoked tokens.
pub async fn logout(state: &AppState, token: Option<&str>) -> Result<(), AppError> {
    let Some(token) = token else {
        return Ok(());
    };
    let keys = JwtKeys::from_ref(state);
    match keys.verify(token) {
        Ok(claims) => {
            state
                .sessions
                .revoke(claims.sid, OffsetDateTime::now_utc())
                .await?;
            info!(user_id = %claims.sub, session_id = %claims.sid, "user logged out");
        }
        Err(_) => {
            info!("logout with unusable token");
        }
    }
    Ok(())
}

/// Maps a bearer token to the session's user, rejecting revoked or expired
/// sessions.
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AppError::Unauthorized("Invalid or expired token")
    })?;

    let session = state
        .sessions
        .find_active(claims.sid, OffsetDateTime::now_utc())
        .await?
        .ok_or(AppError::Unauthorized("Session has ended"))?;

    if session.user_id != claims.sub {
        warn!(session_id = %session.id, "session owner mismatch");
        return Err(AppError::Unauthorized("Invalid or expired token"));
    }

    Ok(AuthUser { user_id: session.user_id })
}
