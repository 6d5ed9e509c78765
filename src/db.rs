use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::DbConfig;

/// Open the corpus database, creating the file and its parent directory on
/// first use. Foreign keys are enforced so page and paragraph rows cannot
/// outlive their document.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_creates_file_and_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = DbConfig {
            path: tmp.path().join("nested").join("corpus.sqlite"),
            max_connections: 2,
        };
        let pool = connect(&cfg).await.unwrap();
        assert!(cfg.path.is_file());
        pool.close().await;
    }
}
