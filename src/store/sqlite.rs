use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::backend::{ProductPatch, StorageBackend};
use crate::config::DatabaseConfig;
use crate::models::{PriceHistoryEntry, ProductRecord, RecordStatus};
use crate::utils::error::StoreError;

const PRODUCT_COLUMNS: &str = "name, url, target_price, current_price, last_alerted, status";

/// Watchlist persisted in a SQLite file. Prices are stored as decimal text.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let in_memory = config.url.contains(":memory:");

        if !in_memory {
            if let Some(parent) = database_path(&config.url).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(sqlx::Error::Io)?;
                }
            }
        }

        // Every connection to `:memory:` opens a fresh database, so the pool
        // must hold exactly one connection for its whole life.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("SQLite schema up to date");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// `sqlite://data/watcher.db?mode=rwc` -> `data/watcher.db`
fn database_path(url: &str) -> &Path {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    Path::new(rest.split('?').next().unwrap_or(rest))
}

fn decimal_cell(column: &'static str, value: String) -> Result<Decimal, StoreError> {
    Decimal::from_str(value.trim()).map_err(|_| StoreError::Corrupt { column, value })
}

fn optional_decimal_cell(column: &'static str, value: Option<String>) -> Result<Option<Decimal>, StoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => decimal_cell(column, v).map(Some),
        _ => Ok(None),
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ProductRecord, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(ProductRecord {
        url: row.try_get("url")?,
        name: row
            .try_get::<Option<String>, _>("name")?
            .filter(|n| !n.trim().is_empty()),
        target_price: decimal_cell("target_price", row.try_get("target_price")?)?,
        current_price: optional_decimal_cell("current_price", row.try_get("current_price")?)?,
        last_alerted: optional_decimal_cell("last_alerted", row.try_get("last_alerted")?)?,
        status: RecordStatus::from_str(&status).map_err(|_| StoreError::Corrupt {
            column: "status",
            value: status.clone(),
        })?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<PriceHistoryEntry, StoreError> {
    let recorded_at: String = row.try_get("recorded_at")?;
    Ok(PriceHistoryEntry {
        recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| StoreError::Corrupt {
                column: "recorded_at",
                value: recorded_at.clone(),
            })?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        price: decimal_cell("price", row.try_get("price")?)?,
        target_price: decimal_cell("target_price", row.try_get("target_price")?)?,
    })
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn read_products(&self) -> Result<Vec<ProductRecord>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM products ORDER BY row_id", PRODUCT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        // A row that no longer decodes is left out so the rest stay usable.
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match record_from_row(row) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let url: String = row.try_get("url").unwrap_or_default();
                    tracing::warn!("Skipping unreadable product row {}: {}", url, err);
                }
            }
        }
        Ok(records)
    }

    async fn append_product(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let result = sqlx::query(&format!(
            "INSERT INTO products ({}) VALUES (?, ?, ?, ?, ?, ?)",
            PRODUCT_COLUMNS
        ))
        .bind(&record.name)
        .bind(&record.url)
        .bind(record.target_price.to_string())
        .bind(record.current_price.map(|p| p.to_string()))
        .bind(record.last_alerted.map(|p| p.to_string()))
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Duplicate {
                url: record.url.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_product(&self, url: &str, patch: &ProductPatch) -> Result<bool, StoreError> {
        if patch.is_empty() {
            let exists = sqlx::query("SELECT 1 FROM products WHERE url = ?")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
            return Ok(exists.is_some());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        let mut cells = builder.separated(", ");
        if let Some(name) = &patch.name {
            cells.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(target) = patch.target_price {
            cells.push("target_price = ").push_bind_unseparated(target.to_string());
        }
        if let Some(current) = patch.current_price {
            cells.push("current_price = ").push_bind_unseparated(current.to_string());
        }
        if let Some(last_alerted) = patch.last_alerted {
            cells
                .push("last_alerted = ")
                .push_bind_unseparated(last_alerted.map(|p| p.to_string()));
        }
        if let Some(status) = patch.status {
            cells.push("status = ").push_bind_unseparated(status.as_str());
        }
        builder.push(" WHERE url = ").push_bind(url);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn read_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    async fn write_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO price_history (recorded_at, url, name, price, target_price) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.recorded_at.to_rfc3339())
        .bind(&entry.url)
        .bind(&entry.name)
        .bind(entry.price.to_string())
        .bind(entry.target_price.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_history(&self, url: &str, limit: usize) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT recorded_at, url, name, price, target_price FROM price_history \
             WHERE url = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(url)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(history_from_row).collect()
    }
}
