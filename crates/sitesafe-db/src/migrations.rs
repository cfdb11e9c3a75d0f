//! Database migration management.

use sqlx::PgPool;

/// Run all pending migrations.
///
/// Migrations are embedded at compile time from the `migrations/` directory
/// and applied in filename order.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations complete");
    Ok(())
}
