use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tripsmith_core::SavedItinerary;

/// Keyed store of saved itineraries. A key holds the whole list for one
/// owner (browser profile, user, ...); saving replaces the list.
pub trait ItineraryRepository: Send + Sync {
    async fn load_itineraries(&self, key: &str) -> Result<Vec<SavedItinerary>>;
    async fn save_itineraries(&self, key: &str, itineraries: &[SavedItinerary]) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    itineraries: Arc<RwLock<HashMap<String, Vec<SavedItinerary>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItineraryRepository for MemoryStore {
    async fn load_itineraries(&self, key: &str) -> Result<Vec<SavedItinerary>> {
        Ok(self
            .itineraries
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_itineraries(&self, key: &str, itineraries: &[SavedItinerary]) -> Result<()> {
        self.itineraries
            .write()
            .insert(key.to_string(), itineraries.to_vec());
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // every in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_itineraries (
              owner_key TEXT PRIMARY KEY,
              itineraries_json TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl ItineraryRepository for SqliteStore {
    async fn load_itineraries(&self, key: &str) -> Result<Vec<SavedItinerary>> {
        let row = sqlx::query(
            r#"
            SELECT itineraries_json
            FROM saved_itineraries
            WHERE owner_key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };

        let json: String = row.get("itineraries_json");
        serde_json::from_str(&json)
            .with_context(|| format!("stored itineraries for {} are not valid", key))
    }

    async fn save_itineraries(&self, key: &str, itineraries: &[SavedItinerary]) -> Result<()> {
        let json = serde_json::to_string(itineraries)?;

        sqlx::query(
            r#"
            INSERT INTO saved_itineraries (owner_key, itineraries_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_key) DO UPDATE SET
              itineraries_json=excluded.itineraries_json,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    /// Sqlite when a database url is configured, memory otherwise.
    pub async fn from_database_url(database_url: Option<&str>) -> Result<Self> {
        match database_url {
            Some(url) => Self::sqlite(url).await,
            None => Ok(Self::memory()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl ItineraryRepository for Store {
    async fn load_itineraries(&self, key: &str) -> Result<Vec<SavedItinerary>> {
        match self {
            Store::Memory(store) => store.load_itineraries(key).await,
            Store::Sqlite(store) => store.load_itineraries(key).await,
        }
    }

    async fn save_itineraries(&self, key: &str, itineraries: &[SavedItinerary]) -> Result<()> {
        match self {
            Store::Memory(store) => store.save_itineraries(key, itineraries).await,
            Store::Sqlite(store) => store.save_itineraries(key, itineraries).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripsmith_core::{Day, Plan, TripContext};

    fn itinerary(name: &str) -> SavedItinerary {
        SavedItinerary {
            name: name.to_string(),
            trip_details: TripContext {
                destination: "Goa".to_string(),
                days: "2".to_string(),
                ..TripContext::default()
            },
            planner: Vec::new(),
            day_plan: Some(Plan {
                currency: "INR".to_string(),
                total_min_cost: 0,
                plan: vec![Day {
                    day: 1,
                    date: "2024-01-05".to_string(),
                    slots: Vec::new(),
                }],
            }),
        }
    }

    async fn round_trip(store: Store) {
        assert!(store.load_itineraries("alice").await.unwrap().is_empty());

        let saved = vec![itinerary("Goa getaway"), itinerary("Goa again")];
        store.save_itineraries("alice", &saved).await.unwrap();
        assert_eq!(store.load_itineraries("alice").await.unwrap(), saved);

        store
            .save_itineraries("alice", &saved[..1])
            .await
            .unwrap();
        assert_eq!(store.load_itineraries("alice").await.unwrap(), saved[..1].to_vec());
        assert!(store.load_itineraries("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        round_trip(Store::memory()).await;
    }

    #[tokio::test]
    async fn sqlite_store_round_trip() {
        let store = Store::sqlite("sqlite::memory:")
            .await
            .expect("in-memory sqlite should open");
        assert_eq!(store.backend_name(), "sqlite");
        round_trip(store).await;
    }
}
