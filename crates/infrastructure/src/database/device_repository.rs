use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::device::{DeviceRecord, SyncStatus};
use domain::error::{ConfigError, Result};
use domain::repository::DeviceConfigRepository;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const DEVICE_COLUMNS: &str = "id, device_type, template_ids, overrides, desired_config, \
                              config_applied, sync_status, updated_at";

pub struct PostgresDeviceRepository {
    pool: PgPool,
}

impl PostgresDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register or refresh a device row (discovery-facing side door; the
    /// config service itself never creates devices).
    pub async fn upsert(&self, record: &DeviceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO devices (id, device_type, template_ids, overrides, desired_config,
                                 config_applied, sync_status, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                device_type = EXCLUDED.device_type,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.device_type)
        .bind(&record.template_ids)
        .bind(&record.overrides)
        .bind(&record.desired_config)
        .bind(record.config_applied)
        .bind(record.sync_status.as_str())
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to upsert device", e))?;
        Ok(())
    }

    fn row_to_record(row: &PgRow) -> DeviceRecord {
        let sync_status: String = row.get("sync_status");
        DeviceRecord {
            id: row.get("id"),
            device_type: row.get("device_type"),
            template_ids: row.get("template_ids"),
            overrides: row.get("overrides"),
            desired_config: row.get("desired_config"),
            config_applied: row.get("config_applied"),
            sync_status: SyncStatus::parse(&sync_status),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        }
    }

    async fn update_column(&self, device_id: &str, query: &str, value: &str) -> Result<()> {
        let result = sqlx::query(query)
            .bind(device_id)
            .bind(value)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| ConfigError::repository("failed to update device", e))?;
        if result.rows_affected() == 0 {
            return Err(ConfigError::DeviceNotFound(device_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceConfigRepository for PostgresDeviceRepository {
    async fn find_by_id(&self, device_id: &str) -> Result<Option<DeviceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM devices WHERE id = $1",
            DEVICE_COLUMNS
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to get device", e))?;

        Ok(row.as_ref().map(Self::row_to_record))
    }

    async fn find_all(&self) -> Result<Vec<DeviceRecord>> {
        let rows = sqlx::query(&format!("SELECT {} FROM devices ORDER BY id", DEVICE_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConfigError::repository("failed to list devices", e))?;
        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    async fn find_referencing_template(&self, template_id: u32) -> Result<Vec<DeviceRecord>> {
        // template_ids is an opaque serialized list, so membership is
        // decided here rather than in SQL. Fleets are small enough that a
        // scan is fine.
        let records = self.find_all().await?;
        let mut referencing = Vec::new();
        for record in records {
            if record.decoded_template_ids()?.contains(&template_id) {
                referencing.push(record);
            }
        }
        Ok(referencing)
    }

    async fn update_templates(&self, device_id: &str, template_ids: &str) -> Result<()> {
        self.update_column(
            device_id,
            "UPDATE devices SET template_ids = $2, updated_at = $3 WHERE id = $1",
            template_ids,
        )
        .await
    }

    async fn update_overrides(&self, device_id: &str, overrides: &str) -> Result<()> {
        self.update_column(
            device_id,
            "UPDATE devices SET overrides = $2, updated_at = $3 WHERE id = $1",
            overrides,
        )
        .await
    }

    async fn update_desired_config(&self, device_id: &str, desired: &str) -> Result<()> {
        self.update_column(
            device_id,
            "UPDATE devices SET desired_config = $2, updated_at = $3 WHERE id = $1",
            desired,
        )
        .await
    }

    async fn set_config_applied(&self, device_id: &str, applied: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE devices SET config_applied = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(device_id)
        .bind(applied)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to set config_applied", e))?;
        if result.rows_affected() == 0 {
            return Err(ConfigError::DeviceNotFound(device_id.to_string()));
        }
        Ok(())
    }

    async fn set_sync_status(&self, device_id: &str, status: SyncStatus) -> Result<()> {
        self.update_column(
            device_id,
            "UPDATE devices SET sync_status = $2, updated_at = $3 WHERE id = $1",
            status.as_str(),
        )
        .await
    }
}
