//! Durable item storage for the mirror.
//!
//! The sync engine and the read API only see the [`ItemStore`] trait.
//! [`PgItemStore`] is the production implementation; [`MemoryItemStore`]
//! backs tests and database-free local runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hnmirror_core::{Category, CategoryFlags, Item};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;

pub const CRATE_NAME: &str = "hnmirror-storage";

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("stored payload for item {id} is not decodable: {source}")]
    Payload {
        id: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed item storage. Implementations must tolerate concurrent calls from
/// independently running category pipelines; `upsert` merges category flags
/// rather than overwriting them, so no flag bit is lost to a concurrent
/// writer.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Point lookup by id.
    async fn get(&self, id: u64) -> Result<Option<Item>, StoreError>;

    /// The stored item with the highest id flagged for `category`, i.e. the
    /// category's watermark carrier.
    async fn find_latest(&self, category: Category) -> Result<Option<Item>, StoreError>;

    /// Insert the item if its id is unknown, otherwise replace its scalar
    /// fields and OR its category flags into the existing record. Returns
    /// the persisted record.
    async fn upsert(&self, item: Item) -> Result<Item, StoreError>;

    /// Stored items flagged for `category`, highest id first.
    async fn list_category(&self, category: Category, limit: i64)
        -> Result<Vec<Item>, StoreError>;
}

fn flag_column(category: Category) -> &'static str {
    match category {
        Category::Ask => "is_ask",
        Category::Show => "is_show",
        Category::Job => "is_job",
        Category::Top => "is_top",
        Category::Best => "is_best",
        Category::New => "is_new",
    }
}

const ITEM_COLUMNS: &str = "id, payload, is_ask, is_show, is_job, is_top, is_best, is_new";

/// Postgres-backed store. Items are persisted as one row per id: the
/// upstream payload as JSONB plus one boolean column per category flag, so
/// flag merges happen inside the upsert statement itself.
#[derive(Debug, Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    fn row_to_item(row: &PgRow) -> Result<Item, StoreError> {
        let id: i64 = row.try_get("id")?;
        let payload: serde_json::Value = row.try_get("payload")?;
        let mut item: Item = serde_json::from_value(payload).map_err(|source| {
            StoreError::Payload {
                id: id as u64,
                source,
            }
        })?;
        item.flags = CategoryFlags {
            is_ask: row.try_get("is_ask")?,
            is_show: row.try_get("is_show")?,
            is_job: row.try_get("is_job")?,
            is_top: row.try_get("is_top")?,
            is_best: row.try_get("is_best")?,
            is_new: row.try_get("is_new")?,
        };
        Ok(item)
    }

    /// The payload column carries the upstream fields only; flags live in
    /// their own columns and are re-attached on read.
    fn payload_json(item: &Item) -> Result<serde_json::Value, StoreError> {
        let mut stripped = item.clone();
        stripped.flags = CategoryFlags::default();
        serde_json::to_value(&stripped).map_err(|source| StoreError::Payload {
            id: item.id,
            source,
        })
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn get(&self, id: u64) -> Result<Option<Item>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn find_latest(&self, category: Category) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE {flag} ORDER BY id DESC LIMIT 1",
            flag = flag_column(category)
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn upsert(&self, item: Item) -> Result<Item, StoreError> {
        let payload = Self::payload_json(&item)?;
        let sql = format!(
            "INSERT INTO items (id, payload, is_ask, is_show, is_job, is_top, is_best, is_new) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 payload = EXCLUDED.payload, \
                 is_ask  = items.is_ask  OR EXCLUDED.is_ask, \
                 is_show = items.is_show OR EXCLUDED.is_show, \
                 is_job  = items.is_job  OR EXCLUDED.is_job, \
                 is_top  = items.is_top  OR EXCLUDED.is_top, \
                 is_best = items.is_best OR EXCLUDED.is_best, \
                 is_new  = items.is_new  OR EXCLUDED.is_new, \
                 last_seen_at = NOW() \
             RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(item.id as i64)
            .bind(payload)
            .bind(item.flags.is_ask)
            .bind(item.flags.is_show)
            .bind(item.flags.is_job)
            .bind(item.flags.is_top)
            .bind(item.flags.is_best)
            .bind(item.flags.is_new)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_item(&row)
    }

    async fn list_category(
        &self,
        category: Category,
        limit: i64,
    ) -> Result<Vec<Item>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE {flag} ORDER BY id DESC LIMIT $1",
            flag = flag_column(category)
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_item).collect()
    }
}

/// In-memory store with the same merge semantics as [`PgItemStore`].
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: Mutex<BTreeMap<u64, Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("items lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn get(&self, id: u64) -> Result<Option<Item>, StoreError> {
        let items = self.items.lock().expect("items lock poisoned");
        Ok(items.get(&id).cloned())
    }

    async fn find_latest(&self, category: Category) -> Result<Option<Item>, StoreError> {
        let items = self.items.lock().expect("items lock poisoned");
        Ok(items
            .values()
            .rev()
            .find(|item| item.flags.contains(category))
            .cloned())
    }

    async fn upsert(&self, item: Item) -> Result<Item, StoreError> {
        let mut items = self.items.lock().expect("items lock poisoned");
        let mut merged = item;
        if let Some(existing) = items.get(&merged.id) {
            merged.flags.merge(existing.flags);
        }
        items.insert(merged.id, merged.clone());
        Ok(merged)
    }

    async fn list_category(
        &self,
        category: Category,
        limit: i64,
    ) -> Result<Vec<Item>, StoreError> {
        let items = self.items.lock().expect("items lock poisoned");
        Ok(items
            .values()
            .rev()
            .filter(|item| item.flags.contains(category))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
