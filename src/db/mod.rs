use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Embedded so the binary and the tests run the same schema.
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../../migrations/0001_init.sql"))];

/// Opens the pool with foreign keys enforced on every connection.
///
/// An in-memory database lives only as long as its connection, so it gets a
/// single connection that is never recycled.
pub async fn connect(raw_url: &str) -> Result<SqlitePool> {
    let url = normalize_sqlite_url(raw_url);
    let options = SqliteConnectOptions::from_str(&url)
        .with_context(|| format!("invalid database url {url}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if is_memory(&url) {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };
    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("could not open {url}"))?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("migration {name} failed"))?;
        }
        tracing::debug!(migration = name, "migration applied");
    }
    Ok(())
}

/// Accepts `sqlite:foo.db`, `sqlite://foo.db`, `file:foo.db`, a bare path, or
/// `sqlite::memory:`.
pub fn normalize_sqlite_url(input: &str) -> String {
    if input.starts_with("sqlite://") || input.starts_with("sqlite::memory:") {
        return input.to_string();
    }
    if let Some(rest) = input.strip_prefix("sqlite:") {
        return format!("sqlite://{}", rest.trim_start_matches('/'));
    }
    if let Some(rest) = input.strip_prefix("file:") {
        return format!("sqlite://{rest}");
    }
    format!("sqlite://{input}")
}

fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
