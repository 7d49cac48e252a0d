use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::{ConfigError, Result};
use domain::template::{NewTemplate, Template, TemplateScope};
use domain::repository::TemplateRepository;
use sqlx::{PgPool, Row};
use sqlx::postgres::PgRow;

pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_template(row: &PgRow) -> Result<Template> {
        let scope: String = row.get("scope");
        let config: serde_json::Value = row.get("config");
        Ok(Template {
            id: row.get::<i32, _>("id") as u32,
            name: row.get("name"),
            description: row.get("description"),
            scope: TemplateScope::parse(&scope)?,
            device_type: row.get("device_type"),
            config: serde_json::from_value(config)
                .map_err(|e| ConfigError::repository("failed to parse template config", e))?,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        })
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn create(&self, template: NewTemplate) -> Result<Template> {
        let config = serde_json::to_value(&template.config)?;
        let row = sqlx::query(
            r#"
            INSERT INTO templates (name, description, scope, device_type, config)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, scope, device_type, config, created_at, updated_at
            "#,
        )
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.scope.as_str())
        .bind(&template.device_type)
        .bind(config)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to create template", e))?;

        Self::row_to_template(&row)
    }

    async fn update(&self, template: &Template) -> Result<()> {
        let config = serde_json::to_value(&template.config)?;
        let result = sqlx::query(
            r#"
            UPDATE templates
            SET name = $2, description = $3, scope = $4, device_type = $5,
                config = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(template.id as i32)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.scope.as_str())
        .bind(&template.device_type)
        .bind(config)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to update template", e))?;

        if result.rows_affected() == 0 {
            return Err(ConfigError::TemplateNotFound(template.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: u32) -> Result<Option<Template>> {
        let row = sqlx::query(
            "SELECT id, name, description, scope, device_type, config, created_at, updated_at \
             FROM templates WHERE id = $1",
        )
        .bind(id as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to get template", e))?;

        row.as_ref().map(Self::row_to_template).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Template>> {
        let row = sqlx::query(
            "SELECT id, name, description, scope, device_type, config, created_at, updated_at \
             FROM templates WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to get template by name", e))?;

        row.as_ref().map(Self::row_to_template).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Template>> {
        let rows = sqlx::query(
            "SELECT id, name, description, scope, device_type, config, created_at, updated_at \
             FROM templates ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list templates", e))?;

        rows.iter().map(Self::row_to_template).collect()
    }

    async fn find_by_scope(&self, scope: TemplateScope) -> Result<Vec<Template>> {
        let rows = sqlx::query(
            "SELECT id, name, description, scope, device_type, config, created_at, updated_at \
             FROM templates WHERE scope = $1 ORDER BY id",
        )
        .bind(scope.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list templates by scope", e))?;

        rows.iter().map(Self::row_to_template).collect()
    }

    async fn find_by_device_type(&self, device_type: &str) -> Result<Vec<Template>> {
        let rows = sqlx::query(
            "SELECT id, name, description, scope, device_type, config, created_at, updated_at \
             FROM templates WHERE device_type = $1 ORDER BY id",
        )
        .bind(device_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfigError::repository("failed to list templates by device type", e))?;

        rows.iter().map(Self::row_to_template).collect()
    }

    async fn delete(&self, id: u32) -> Result<()> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| ConfigError::repository("failed to delete template", e))?;

        if result.rows_affected() == 0 {
            return Err(ConfigError::TemplateNotFound(id));
        }
        Ok(())
    }
}
