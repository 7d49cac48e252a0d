use async_trait::async_trait;
use domain::error::{ConfigError, Result};
use domain::report::DriftEvent;
use domain::repository::ResolutionRepository;
use domain::resolution::{ResolutionHistoryEntry, ResolutionPolicy, ResolutionRequest};
use sqlx::{PgPool, Row};

/// Policies, requests and history are stored as whole JSON documents with
/// the hot filter columns (device, status, priority) extracted for
/// indexing. The documents are versioned by the domain types themselves.
pub struct PostgresResolutionRepository {
    pool: PgPool,
}

impl PostgresResolutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse<T: serde::de::DeserializeOwned>(context: &str, raw: serde_json::Value) -> Result<T> {
        serde_json::from_value(raw).map_err(|e| ConfigError::repository(context, e))
    }
}

#[async_trait]
impl ResolutionRepository for PostgresResolutionRepository {
    async fn list_policies(&self) -> Result<Vec<ResolutionPolicy>> {
        let rows = sqlx::query("SELECT policy FROM resolution_policies ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConfigError::repository("failed to list resolution policies", e))?;

        rows.into_iter()
            .map(|row| Self::parse("failed to parse resolution policy", row.get("policy")))
            .collect()
    }

    async fn save_policy(&self, policy: &ResolutionPolicy) -> Result<()> {
        let document = serde_json::to_value(policy)?;
        sqlx::query(
            r#"
            INSERT INTO resolution_policies (id, name, policy)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, policy = EXCLUDED.policy
            "#,
        )
        .bind(policy.id as i32)
        .bind(&policy.name)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to save resolution policy", e))?;
        Ok(())
    }

    async fn save_request(&self, request: &ResolutionRequest) -> Result<()> {
        let document = serde_json::to_value(request)?;
        sqlx::query(
            r#"
            INSERT INTO resolution_requests (id, device_id, status, priority, created_at, request)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                priority = EXCLUDED.priority,
                request = EXCLUDED.request
            "#,
        )
        .bind(&request.id)
        .bind(&request.device_id)
        .bind(request.status.as_str())
        .bind(request.priority.as_str())
        .bind(request.created_at)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to save resolution request", e))?;
        Ok(())
    }

    async fn find_request(&self, id: &str) -> Result<Option<ResolutionRequest>> {
        let row = sqlx::query("SELECT request FROM resolution_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ConfigError::repository("failed to get resolution request", e))?;

        row.map(|r| Self::parse("failed to parse resolution request", r.get("request")))
            .transpose()
    }

    async fn find_pending_requests(&self) -> Result<Vec<ResolutionRequest>> {
        let rows = sqlx::query(
            "SELECT request FROM resolution_requests WHERE status = 'pending' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list pending requests", e))?;

        rows.into_iter()
            .map(|row| Self::parse("failed to parse resolution request", row.get("request")))
            .collect()
    }

    async fn find_requests_for_device(&self, device_id: &str) -> Result<Vec<ResolutionRequest>> {
        let rows = sqlx::query(
            "SELECT request FROM resolution_requests WHERE device_id = $1 ORDER BY created_at",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list device requests", e))?;

        rows.into_iter()
            .map(|row| Self::parse("failed to parse resolution request", row.get("request")))
            .collect()
    }

    async fn append_history(&self, entry: &ResolutionHistoryEntry) -> Result<()> {
        let document = serde_json::to_value(entry)?;
        sqlx::query(
            r#"
            INSERT INTO resolution_history (id, device_id, started_at, entry)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.device_id)
        .bind(entry.started_at)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to append resolution history", e))?;
        Ok(())
    }

    async fn find_history_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<ResolutionHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT entry FROM resolution_history WHERE device_id = $1 ORDER BY started_at",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list resolution history", e))?;

        rows.into_iter()
            .map(|row| Self::parse("failed to parse history entry", row.get("entry")))
            .collect()
    }

    async fn append_drift_event(&self, event: &DriftEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO drift_events (device_id, differences_count, critical_count, detected_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&event.device_id)
        .bind(event.differences_count as i32)
        .bind(event.critical_count as i32)
        .bind(event.detected_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to append drift event", e))?;
        Ok(())
    }
}
