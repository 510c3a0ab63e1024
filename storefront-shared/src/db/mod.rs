/// Database layer for Storefront
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Database migration runner
///
/// Models live in the `models` module at crate root level.
///
/// # Example
///
/// ```no_run
/// use storefront_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;

/// SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Name of the unique constraint a database error violated, if any
pub fn unique_violation_constraint(err: &sqlx::Error) -> Option<&str> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() != Some(UNIQUE_VIOLATION) {
        return None;
    }
    db_err.constraint()
}

/// Whether `err` is a unique violation of `constraint`
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    unique_violation_constraint(err) == Some(constraint)
}
