use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::alerts::repo_types::{Alert, AlertChanges, AlertRow, NewAlert};
use crate::error::StoreResult;

/// Owner-scoped alert persistence. Every method filters by `owner` in the
/// query itself; a row belonging to someone else behaves as if absent.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create(&self, owner: Uuid, alert: NewAlert) -> StoreResult<Alert>;
    async fn list_active(&self, owner: Uuid) -> StoreResult<Vec<Alert>>;
    async fn list_all(&self, owner: Uuid) -> StoreResult<Vec<Alert>>;
    async fn get(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Alert>>;
    async fn update(&self, owner: Uuid, id: Uuid, changes: &AlertChanges)
        -> StoreResult<Option<Alert>>;
    /// Returns `false` when nothing owned by `owner` had that id.
    async fn delete(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;
    /// Compare-and-set on `last_triggered`: writes `new` only if the stored
    /// value still equals `expected`. Returns whether the write happened.
    async fn set_trigger_state(
        &self,
        owner: Uuid,
        id: Uuid,
        expected: Option<OffsetDateTime>,
        new: Option<OffsetDateTime>,
    ) -> StoreResult<bool>;
}

const ALERT_COLUMNS: &str =
    "id, user_id, city, condition, value, unit, is_active, created_at, last_triggered";

pub struct PgAlertStore {
    db: PgPool,
}

impl PgAlertStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_alerts(rows: Vec<AlertRow>) -> StoreResult<Vec<Alert>> {
    rows.into_iter().map(Alert::try_from).collect()
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn create(&self, owner: Uuid, alert: NewAlert) -> StoreResult<Alert> {
        let sql = format!(
            r#"
            INSERT INTO weather_alerts (id, user_id, city, condition, value, unit)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ALERT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&alert.city)
            .bind(alert.condition.to_string())
            .bind(alert.value)
            .bind(&alert.unit)
            .fetch_one(&self.db)
            .await?;
        Alert::try_from(row)
    }

    async fn list_active(&self, owner: Uuid) -> StoreResult<Vec<Alert>> {
        let sql = format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM weather_alerts
            WHERE user_id = $1 AND is_active
            ORDER BY created_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await?;
        into_alerts(rows)
    }

    async fn list_all(&self, owner: Uuid) -> StoreResult<Vec<Alert>> {
        let sql = format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM weather_alerts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await?;
        into_alerts(rows)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Alert>> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM weather_alerts WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await?;
        row.map(Alert::try_from).transpose()
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &AlertChanges,
    ) -> StoreResult<Option<Alert>> {
        let sql = format!(
            r#"
            UPDATE weather_alerts SET
                city      = COALESCE($3, city),
                condition = COALESCE($4, condition),
                value     = COALESCE($5, value),
                unit      = COALESCE($6, unit),
                is_active = COALESCE($7, is_active)
            WHERE id = $1 AND user_id = $2
            RETURNING {ALERT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id)
            .bind(owner)
            .bind(&changes.city)
            .bind(changes.condition.map(|c| c.to_string()))
            .bind(changes.value)
            .bind(&changes.unit)
            .bind(changes.is_active)
            .fetch_optional(&self.db)
            .await?;
        row.map(Alert::try_from).transpose()
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM weather_alerts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_trigger_state(
        &self,
        owner: Uuid,
        id: Uuid,
        expected: Option<OffsetDateTime>,
        new: Option<OffsetDateTime>,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE weather_alerts
            SET last_triggered = $4
            WHERE id = $1 AND user_id = $2 AND last_triggered IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(expected)
        .bind(new)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
