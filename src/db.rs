use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::str::FromStr;
use tokio_postgres::NoTls;

/// Schema files applied in order at startup. Each statement is idempotent, so
/// re-running on boot is safe.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_create_users",
        include_str!("../migrations/0001_create_users.sql"),
    ),
    (
        "0002_create_conversations",
        include_str!("../migrations/0002_create_conversations.sql"),
    ),
    (
        "0003_create_messages",
        include_str!("../migrations/0003_create_messages.sql"),
    ),
];

pub fn init_pool(database_url: &str, max_size: usize) -> Result<Pool, crate::error::AppError> {
    let pg_config = tokio_postgres::Config::from_str(database_url)
        .map_err(|e| crate::error::AppError::Config(format!("DATABASE_URL parse: {e}")))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    Pool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(|e| crate::error::AppError::Config(format!("build pool: {e}")))
}

pub async fn run_migrations(pool: &Pool) -> Result<(), crate::error::AppError> {
    let client = pool.get().await?;
    for (name, sql) in MIGRATIONS {
        client
            .batch_execute(sql)
            .await
            .map_err(|e| crate::error::AppError::Database(format!("migration {name}: {e}")))?;
        tracing::debug!(migration = name, "schema applied");
    }
    Ok(())
}
