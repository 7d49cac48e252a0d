use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::{ConfigError, Result};
use domain::repository::TagRepository;
use domain::tag::DeviceTag;
use sqlx::{PgPool, Row};

pub struct PostgresTagRepository {
    pool: PgPool,
}

impl PostgresTagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PostgresTagRepository {
    async fn add(&self, tag: &DeviceTag) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO device_tags (device_id, tag, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (device_id, tag) DO NOTHING
            "#,
        )
        .bind(&tag.device_id)
        .bind(&tag.tag)
        .bind(tag.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to add tag", e))?;
        Ok(())
    }

    async fn remove(&self, device_id: &str, tag: &str) -> Result<()> {
        sqlx::query("DELETE FROM device_tags WHERE device_id = $1 AND tag = $2")
            .bind(device_id)
            .bind(tag)
            .execute(&self.pool)
            .await
            .map_err(|e| ConfigError::repository("failed to remove tag", e))?;
        Ok(())
    }

    async fn find_for_device(&self, device_id: &str) -> Result<Vec<DeviceTag>> {
        let rows = sqlx::query(
            "SELECT device_id, tag, created_at FROM device_tags WHERE device_id = $1 ORDER BY tag",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list device tags", e))?;

        Ok(rows
            .iter()
            .map(|row| DeviceTag {
                device_id: row.get("device_id"),
                tag: row.get("tag"),
                created_at: row.get::<DateTime<Utc>, _>("created_at"),
            })
            .collect())
    }

    async fn find_all_tags(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT tag FROM device_tags ORDER BY tag")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConfigError::repository("failed to list tags", e))?;
        Ok(rows.iter().map(|row| row.get("tag")).collect())
    }

    async fn find_devices_with_tag(&self, tag: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT device_id FROM device_tags WHERE tag = $1 ORDER BY device_id",
        )
        .bind(tag)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list devices by tag", e))?;
        Ok(rows.iter().map(|row| row.get("device_id")).collect())
    }
}
