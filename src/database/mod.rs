use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::{debug, info};

use crate::models::{ProductSnapshot, TrackedProduct};

/// SQLite store for tracked products and the latest snapshot of each.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database at `db_url`, creating the file and its parent
    /// directory when missing, then apply pending migrations.
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            if let Some(parent) = db_url
                .strip_prefix("sqlite:")
                .and_then(|path| std::path::Path::new(path).parent())
                .filter(|parent| !parent.as_os_str().is_empty())
            {
                tokio::fs::create_dir_all(parent).await?;
            }

            info!("Creating database file");
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePool::connect(db_url).await?;
        Self::from_pool(pool).await
    }

    /// Single-connection in-memory store; more connections would each see their own database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// Insert a tracked product, or replace the cost, category and undercut of
    /// an existing SKU.
    pub async fn upsert_tracked_product(&self, product: &TrackedProduct) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO tracked_products (sku, item_id, product_cost, category, undercut_percent)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(sku) DO UPDATE SET
                item_id = excluded.item_id,
                product_cost = excluded.product_cost,
                category = excluded.category,
                undercut_percent = excluded.undercut_percent
            ",
        )
        .bind(&product.sku)
        .bind(&product.item_id)
        .bind(product.product_cost.to_string())
        .bind(&product.category)
        .bind(product.undercut_percent.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All tracked products ordered by SKU. A stored decimal that no longer
    /// parses is an error naming the SKU.
    pub async fn tracked_products(&self) -> Result<Vec<TrackedProduct>> {
        let rows = sqlx::query(
            "SELECT sku, item_id, product_cost, category, undercut_percent FROM tracked_products ORDER BY sku",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<TrackedProduct> {
                let sku: String = row.get("sku");
                let product_cost = parse_decimal(&row.get::<String, _>("product_cost"))
                    .with_context(|| format!("invalid product_cost for {sku}"))?;
                let undercut_percent = parse_decimal(&row.get::<String, _>("undercut_percent"))
                    .with_context(|| format!("invalid undercut_percent for {sku}"))?;

                Ok(TrackedProduct {
                    item_id: row.get("item_id"),
                    category: row.get("category"),
                    product_cost,
                    undercut_percent,
                    sku,
                })
            })
            .collect()
    }

    /// Store the latest snapshot for its SKU.
    ///
    /// Returns `true` when the content differs from what was stored; an
    /// unchanged snapshot only refreshes `checked_at` and keeps any pending
    /// alert. Changed content marks an alert pending exactly when the new
    /// snapshot needs one.
    pub async fn save_snapshot(&self, snapshot: &ProductSnapshot) -> Result<bool> {
        let hash = content_hash(snapshot)?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM product_snapshots WHERE sku = ?")
                .bind(&snapshot.sku)
                .fetch_optional(&self.pool)
                .await?;

        if stored.as_deref() == Some(hash.as_str()) {
            debug!(sku = %snapshot.sku, "Snapshot unchanged");
            sqlx::query("UPDATE product_snapshots SET checked_at = ?, snapshot_json = ? WHERE sku = ?")
                .bind(snapshot.checked_at)
                .bind(serde_json::to_string(snapshot)?)
                .bind(&snapshot.sku)
                .execute(&self.pool)
                .await?;
            return Ok(false);
        }

        let quote = snapshot.quote.as_ref();

        sqlx::query(
            r"
            INSERT INTO product_snapshots (
                sku, item_id, title, availability, our_rank, competitor_count,
                content_hash, snapshot_json, proposed_price, display_price,
                price_source, verdict, alert_pending, checked_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(sku) DO UPDATE SET
                item_id = excluded.item_id,
                title = excluded.title,
                availability = excluded.availability,
                our_rank = excluded.our_rank,
                competitor_count = excluded.competitor_count,
                content_hash = excluded.content_hash,
                snapshot_json = excluded.snapshot_json,
                proposed_price = excluded.proposed_price,
                display_price = excluded.display_price,
                price_source = excluded.price_source,
                verdict = excluded.verdict,
                alert_pending = excluded.alert_pending,
                checked_at = excluded.checked_at
            ",
        )
        .bind(&snapshot.sku)
        .bind(&snapshot.item_id)
        .bind(&snapshot.title)
        .bind(snapshot.availability.as_str())
        .bind(snapshot.offers.our_rank.and_then(|rank| i64::try_from(rank).ok()))
        .bind(i64::try_from(snapshot.offers.competitor_count).unwrap_or(i64::MAX))
        .bind(&hash)
        .bind(serde_json::to_string(snapshot)?)
        .bind(quote.map(|q| q.result.proposed_price.to_string()))
        .bind(quote.and_then(|q| q.display.price).map(|p| p.to_string()))
        .bind(quote.map(|q| q.display.source.as_str()))
        .bind(quote.map(|q| q.result.verdict.as_str()))
        .bind(snapshot.needs_alert())
        .bind(snapshot.checked_at)
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    /// Whether the stored snapshot for `sku` has an alert not yet delivered
    pub async fn alert_pending(&self, sku: &str) -> Result<bool> {
        let pending: Option<bool> =
            sqlx::query_scalar("SELECT alert_pending FROM product_snapshots WHERE sku = ?")
                .bind(sku)
                .fetch_optional(&self.pool)
                .await?;

        Ok(pending.unwrap_or(false))
    }

    /// Mark the alert for `sku` as delivered.
    pub async fn clear_alert(&self, sku: &str) -> Result<()> {
        sqlx::query("UPDATE product_snapshots SET alert_pending = 0 WHERE sku = ?")
            .bind(sku)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Latest stored snapshot for `sku`, or `None` if it was never checked.
    pub async fn load_snapshot(&self, sku: &str) -> Result<Option<ProductSnapshot>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT snapshot_json FROM product_snapshots WHERE sku = ?")
                .bind(sku)
                .fetch_optional(&self.pool)
                .await?;

        json.map(|json| serde_json::from_str(&json).context("corrupt snapshot_json"))
            .transpose()
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Ok(Decimal::from_str(raw)?)
}

/// Fingerprint of everything in a snapshot except when it was taken
fn content_hash(snapshot: &ProductSnapshot) -> Result<String> {
    let content = serde_json::to_string(&(
        &snapshot.item_id,
        &snapshot.title,
        snapshot.availability,
        &snapshot.offers,
        &snapshot.quote,
    ))?;

    Ok(format!("{:x}", md5::compute(content)))
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}
