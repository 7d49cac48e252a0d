//! PostgreSQL repository implementations (runtime-checked queries).

mod device_repository;
mod resolution_repository;
mod tag_repository;
mod template_repository;

pub use device_repository::PostgresDeviceRepository;
pub use resolution_repository::PostgresResolutionRepository;
pub use tag_repository::PostgresTagRepository;
pub use template_repository::PostgresTemplateRepository;

use domain::error::{ConfigError, Result};
use sqlx::PgPool;

/// Apply the SQL migrations under `migrations/` at the workspace root.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| ConfigError::repository("failed to run migrations", e))
}
