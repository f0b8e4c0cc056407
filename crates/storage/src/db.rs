use serde::Serialize;
use splitbill_ocr::{ParsedReceipt, ReceiptSource};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Stored receipt data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Stored receipt source is corrupt: {0}")]
    UnknownSource(String),
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database, for tests and throwaway runs.
pub async fn create_in_memory_db() -> Result<DbPool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS receipts (
            id TEXT PRIMARY KEY,
            image_path TEXT NOT NULL,
            image_hash TEXT NOT NULL,
            parsed_data TEXT NOT NULL,
            total_dong INTEGER NOT NULL,
            source TEXT NOT NULL,
            uploaded_by TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_receipts_uploaded_by ON receipts (uploaded_by)")
        .execute(pool)
        .await?;

    Ok(())
}

/// A parse result about to be persisted.
#[derive(Debug, Clone)]
pub struct NewReceipt<'a> {
    pub image_path: &'a str,
    pub image_hash: &'a str,
    pub receipt: &'a ParsedReceipt,
    pub source: ReceiptSource,
    pub uploaded_by: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptRecord {
    pub id: String,
    pub image_path: String,
    pub image_hash: String,
    pub parsed: ParsedReceipt,
    pub source: ReceiptSource,
    pub uploaded_by: Option<String>,
    pub created_at: String,
}

type ReceiptRow = (String, String, String, String, String, Option<String>, String);

fn record_from_row(r: ReceiptRow) -> Result<ReceiptRecord, StorageError> {
    Ok(ReceiptRecord {
        id: r.0,
        image_path: r.1,
        image_hash: r.2,
        parsed: serde_json::from_str(&r.3)?,
        source: r.4.parse().map_err(StorageError::UnknownSource)?,
        uploaded_by: r.5,
        created_at: r.6,
    })
}

pub async fn insert_receipt(
    pool: &DbPool,
    new: NewReceipt<'_>,
) -> Result<ReceiptRecord, StorageError> {
    let id = uuid::Uuid::new_v4().to_string();
    let parsed_data = serde_json::to_string(new.receipt)?;
    let total = i64::try_from(new.receipt.total().dong()).unwrap_or(i64::MAX);

    let row = sqlx::query_as::<_, ReceiptRow>(
        "INSERT INTO receipts (id, image_path, image_hash, parsed_data, total_dong, source, uploaded_by) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         RETURNING id, image_path, image_hash, parsed_data, source, uploaded_by, created_at",
    )
    .bind(&id)
    .bind(new.image_path)
    .bind(new.image_hash)
    .bind(&parsed_data)
    .bind(total)
    .bind(new.source.to_string())
    .bind(new.uploaded_by)
    .fetch_one(pool)
    .await?;

    tracing::debug!(receipt_id = %id, "Receipt stored");
    record_from_row(row)
}

pub async fn get_receipt_by_id(
    pool: &DbPool,
    id: &str,
) -> Result<Option<ReceiptRecord>, StorageError> {
    let row = sqlx::query_as::<_, ReceiptRow>(
        "SELECT id, image_path, image_hash, parsed_data, source, uploaded_by, created_at \
         FROM receipts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(record_from_row).transpose()
}

/// Most recent receipts uploaded by `uploaded_by`, newest first.
pub async fn list_receipts_by_uploader(
    pool: &DbPool,
    uploaded_by: &str,
    limit: u32,
) -> Result<Vec<ReceiptRecord>, StorageError> {
    let rows = sqlx::query_as::<_, ReceiptRow>(
        "SELECT id, image_path, image_hash, parsed_data, source, uploaded_by, created_at \
         FROM receipts WHERE uploaded_by = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
    )
    .bind(uploaded_by)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(record_from_row).collect()
}
