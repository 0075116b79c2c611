use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

/// Pool settings for `database_url`.
///
/// SQLite locks the whole file for writes, and a deferred transaction that
/// tries to upgrade while another connection holds the write lock fails at
/// once with "database is locked". One pooled connection makes writers
/// queue for the pool instead.
pub fn connect_options(database_url: &str) -> ConnectOptions {
    let mut options = ConnectOptions::new(database_url.to_owned());
    if database_url.starts_with("sqlite:") {
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);
    options
}

pub async fn connect_to_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(connect_options(database_url)).await
}

/// A private in-memory SQLite database. Every pooled connection would get
/// its own empty database, so this relies on the single-connection pool.
pub async fn connect_to_memory_database() -> Result<DatabaseConnection, DbErr> {
    connect_to_database("sqlite::memory:").await
}

/// Connect and bring the schema up to date.
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = connect_to_database(database_url).await?;
    Migrator::up(&db, None).await?;
    info!("Database ready at {}", database_url);
    Ok(db)
}
