//! Database connection utilities.

use std::path::Path;

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

use crate::DbError;

/// Default path for the claims database.
pub const DEFAULT_DB_PATH: &str = "data/claims.db";

/// Opens (or creates) the claims `SQLite` database and ensures the schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the database file cannot be created or the
/// schema DDL fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Init(e.to_string()))?;

    ensure_schema(db.as_ref()).await?;

    log::info!("Opened claims database at {}", path.display());

    Ok(db)
}

/// Creates the claims table and its indexes if they don't already exist.
///
/// # Errors
///
/// Returns [`DbError`] if any DDL statement fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS claims (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            policy_id   INTEGER NOT NULL,
            company_id  INTEGER NOT NULL,
            customer_id INTEGER NOT NULL,
            zone_id     INTEGER NOT NULL,
            grid_id     INTEGER NOT NULL,
            period      INTEGER NOT NULL,
            category    TEXT NOT NULL,
            sum_insured REAL NOT NULL,
            amount      REAL,
            status      TEXT NOT NULL DEFAULT 'PROCESSING',
            resolution  TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            UNIQUE(policy_id, period)
        )",
    )
    .await?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_claims_company ON claims (company_id)")
        .await?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_claims_customer ON claims (customer_id)")
        .await?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_claims_status ON claims (status)")
        .await?;

    Ok(())
}
