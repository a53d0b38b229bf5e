//! In-memory stand-ins for the Postgres stores, the SMTP mailer and the
//! weather provider. Test builds only.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    alerts::{
        repo::AlertStore,
        repo_types::{Alert, AlertChanges, NewAlert},
    },
    auth::{
        repo::{SessionStore, UserStore},
        repo_types::{NewUser, ProfileChanges, Session, User},
    },
    error::{StoreError, StoreResult},
    history::{
        repo::SearchHistoryStore,
        repo_types::{NewSearch, SearchEntry},
    },
    notify::mailer::{MailError, Mailer, OutgoingEmail},
    weather::{GatewayError, WeatherGateway},
};

/// Empty string clears, `None` keeps.
fn apply_nullable(slot: &mut Option<String>, change: &Option<String>) {
    if let Some(v) = change {
        *slot = if v.is_empty() { None } else { Some(v.clone()) };
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict { field: "username" });
        }
        if users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict { field: "email" });
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            phone_number: new.phone_number,
            is_verified: false,
            profile_picture: None,
            default_city: None,
            temperature_unit: "C".into(),
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(u) = users.iter_mut().find(|u| u.id == id) {
            u.last_login = Some(at);
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(u) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = &changes.first_name {
            u.first_name = v.clone();
        }
        if let Some(v) = &changes.last_name {
            u.last_name = v.clone();
        }
        apply_nullable(&mut u.phone_number, &changes.phone_number);
        apply_nullable(&mut u.profile_picture, &changes.profile_picture);
        apply_nullable(&mut u.default_city, &changes.default_city);
        if let Some(v) = &changes.temperature_unit {
            u.temperature_unit = v.clone();
        }
        Ok(Some(u.clone()))
    }
}

/// A session plus the revocation mark the `sessions` table keeps in `revoked_at`.
struct StoredSession {
    session: Session,
    revoked_at: Option<OffsetDateTime>,
}

impl StoredSession {
    fn is_active(&self, now: OffsetDateTime) -> bool {
        self.revoked_at.is_none() && self.session.expires_at > now
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<Vec<StoredSession>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: Uuid, expires_at: OffsetDateTime) -> StoreResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at,
        };
        self.sessions.lock().unwrap().push(StoredSession {
            session: session.clone(),
            revoked_at: None,
        });
        Ok(session)
    }

    async fn find_active(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<Option<Session>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .iter()
            .find(|s| s.session.id == id && s.is_active(now))
            .map(|s| s.session.clone()))
    }

    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(s) = sessions
            .iter_mut()
            .find(|s| s.session.id == id && s.revoked_at.is_none())
        {
            s.revoked_at = Some(at);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryAlertStore {
    fn owned(&self, owner: Uuid, pred: impl Fn(&Alert) -> bool) -> Vec<Alert> {
        let alerts = self.alerts.lock().unwrap();
        // Newest first, like the SQL ordering.
        alerts
            .iter()
            .rev()
            .filter(|a| a.user_id == owner && pred(a))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn create(&self, owner: Uuid, new: NewAlert) -> StoreResult<Alert> {
        let alert = Alert {
            id: Uuid::new_v4(),
            user_id: owner,
            city: new.city,
            condition: new.condition,
            value: new.value,
            unit: new.unit,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            last_triggered: None,
        };
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(alert)
    }

    async fn list_active(&self, owner: Uuid) -> StoreResult<Vec<Alert>> {
        Ok(self.owned(owner, |a| a.is_active))
    }

    async fn list_all(&self, owner: Uuid) -> StoreResult<Vec<Alert>> {
        Ok(self.owned(owner, |_| true))
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Alert>> {
        Ok(self.owned(owner, |a| a.id == id).into_iter().next())
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &AlertChanges,
    ) -> StoreResult<Option<Alert>> {
        let mut alerts = self.alerts.lock().unwrap();
        let Some(a) = alerts
            .iter_mut()
            .find(|a| a.id == id && a.user_id == owner)
        else {
            return Ok(None);
        };
        if let Some(v) = &changes.city {
            a.city = v.clone();
        }
        if let Some(v) = changes.condition {
            a.condition = v;
        }
        if let Some(v) = changes.value {
            a.value = v;
        }
        if let Some(v) = &changes.unit {
            a.unit = v.clone();
        }
        if let Some(v) = changes.is_active {
            a.is_active = v;
        }
        Ok(Some(a.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut alerts = self.alerts.lock().unwrap();
        let before = alerts.len();
        alerts.retain(|a| !(a.id == id && a.user_id == owner));
        Ok(alerts.len() != before)
    }

    async fn set_trigger_state(
        &self,
        owner: Uuid,
        id: Uuid,
        expected: Option<OffsetDateTime>,
        new: Option<OffsetDateTime>,
    ) -> StoreResult<bool> {
        let mut alerts = self.alerts.lock().unwrap();
        match alerts
            .iter_mut()
            .find(|a| a.id == id && a.user_id == owner)
        {
            Some(a) if a.last_triggered == expected => {
                a.last_triggered = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<SearchEntry>>,
}

#[async_trait]
impl SearchHistoryStore for InMemoryHistoryStore {
    async fn append(&self, owner: Uuid, new: NewSearch) -> StoreResult<SearchEntry> {
        let entry = SearchEntry {
            id: Uuid::new_v4(),
            user_id: owner,
            city: new.city,
            country: new.country,
            temperature: new.temperature,
            humidity: new.humidity,
            pressure: new.pressure,
            wind_speed: new.wind_speed,
            description: new.description,
            searched_at: OffsetDateTime::now_utc(),
        };
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<SearchEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.user_id == owner)
            .cloned()
            .collect())
    }
}

/// Records every delivered email; can be told to fail or to stall.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingMailer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_next_sends(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Answers every request with the same body, or with an upstream failure.
pub struct StaticWeatherGateway {
    body: Option<Value>,
}

impl StaticWeatherGateway {
    pub fn returning(body: Value) -> Self {
        Self { body: Some(body) }
    }

    pub fn failing() -> Self {
        Self { body: None }
    }
}

#[async_trait]
impl WeatherGateway for StaticWeatherGateway {
    async fn fetch_minutely_precipitation(
        &self,
        _lat: f64,
        _lon: f64,
    ) -> Result<Value, GatewayError> {
        self.body.clone().ok_or(GatewayError::Upstream(503))
    }
}
