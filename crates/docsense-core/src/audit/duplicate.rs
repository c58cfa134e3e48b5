//! Persistent fingerprints of audited documents.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::StoreError;
use crate::models::audit::DuplicateRecord;

/// Lookup and insert of [`DuplicateRecord`]s keyed by the exact
/// `(invoice_number, vendor_name, total_amount)` triple.
///
/// Lookup-then-insert is not transactional: two concurrent audits of the
/// same document can both miss.
#[async_trait]
pub trait DuplicateStore: Send + Sync {
    async fn find_by_key(
        &self,
        invoice_number: &str,
        vendor_name: &str,
        total_amount: Decimal,
    ) -> Result<Option<DuplicateRecord>, StoreError>;

    async fn insert(&self, record: &DuplicateRecord) -> Result<(), StoreError>;
}

/// Totals are keyed as two-decimal text so `1500000` and `1500000.00` match.
fn amount_key(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// SQLite-backed store. Queries run on the blocking pool.
pub struct SqliteDuplicateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDuplicateStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Corrupt(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Private database that lives as long as the store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS duplicate_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                invoice_number TEXT NOT NULL,
                vendor_name TEXT NOT NULL,
                total_amount TEXT NOT NULL,
                created_at TEXT NOT NULL,
                user_id TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_duplicate_key
                ON duplicate_records (invoice_number, vendor_name, total_amount);
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM duplicate_records", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl DuplicateStore for SqliteDuplicateStore {
    async fn find_by_key(
        &self,
        invoice_number: &str,
        vendor_name: &str,
        total_amount: Decimal,
    ) -> Result<Option<DuplicateRecord>, StoreError> {
        let key = (invoice_number.to_string(), vendor_name.to_string(), amount_key(total_amount));

        let row = self
            .with_conn(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT invoice_number, vendor_name, total_amount, created_at, user_id
                         FROM duplicate_records
                         WHERE invoice_number = ?1 AND vendor_name = ?2 AND total_amount = ?3
                         ORDER BY id ASC LIMIT 1",
                        params![key.0, key.1, key.2],
                        |r| {
                            Ok((
                                r.get::<_, String>(0)?,
                                r.get::<_, String>(1)?,
                                r.get::<_, String>(2)?,
                                r.get::<_, String>(3)?,
                                r.get::<_, Option<String>>(4)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let Some((invoice_number, vendor_name, total, created_at, user_id)) = row else {
            return Ok(None);
        };

        let total_amount =
            Decimal::from_str(&total).map_err(|e| StoreError::Corrupt(format!("total {:?}: {}", total, e)))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StoreError::Corrupt(format!("created_at {:?}: {}", created_at, e)))?
            .with_timezone(&Utc);

        Ok(Some(DuplicateRecord {
            invoice_number,
            vendor_name,
            total_amount,
            created_at,
            user_id,
        }))
    }

    async fn insert(&self, record: &DuplicateRecord) -> Result<(), StoreError> {
        let row = (
            record.invoice_number.clone(),
            record.vendor_name.clone(),
            amount_key(record.total_amount),
            record.created_at.to_rfc3339(),
            record.user_id.clone(),
        );

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO duplicate_records (invoice_number, vendor_name, total_amount, created_at, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.0, row.1, row.2, row.3, row.4],
            )?;
            Ok(())
        })
        .await?;
        debug!(invoice = %record.invoice_number, "Stored duplicate record");
        Ok(())
    }
}

/// Process-local store, used when no database path is configured.
#[derive(Default)]
pub struct InMemoryDuplicateStore {
    records: Mutex<Vec<DuplicateRecord>>,
}

impl InMemoryDuplicateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DuplicateStore for InMemoryDuplicateStore {
    async fn find_by_key(
        &self,
        invoice_number: &str,
        vendor_name: &str,
        total_amount: Decimal,
    ) -> Result<Option<DuplicateRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        let key = amount_key(total_amount);
        Ok(records
            .iter()
            .find(|r| {
                r.invoice_number == invoice_number
                    && r.vendor_name == vendor_name
                    && amount_key(r.total_amount) == key
            })
            .cloned())
    }

    async fn insert(&self, record: &DuplicateRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record() -> DuplicateRecord {
        DuplicateRecord {
            invoice_number: "INV-2024-01".to_string(),
            vendor_name: "PT Maju Jaya".to_string(),
            total_amount: Decimal::from(1_500_000),
            created_at: DateTime::parse_from_rfc3339("2024-12-15T08:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            user_id: Some("user-1".to_string()),
        }
    }

    async fn exercise(store: &dyn DuplicateStore) {
        let record = record();
        assert!(store
            .find_by_key("INV-2024-01", "PT Maju Jaya", Decimal::from(1_500_000))
            .await
            .unwrap()
            .is_none());

        store.insert(&record).await.unwrap();

        // Same total at a different scale still matches.
        let found = store
            .find_by_key("INV-2024-01", "PT Maju Jaya", Decimal::new(150_000_000, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, record);

        // Any part of the triple differing is a miss.
        for (number, vendor, total) in [
            ("INV-2024-02", "PT Maju Jaya", Decimal::from(1_500_000)),
            ("INV-2024-01", "PT Maju Jaya Abadi", Decimal::from(1_500_000)),
            ("INV-2024-01", "PT Maju Jaya", Decimal::from(1_500_001)),
            ("inv-2024-01", "PT Maju Jaya", Decimal::from(1_500_000)),
        ] {
            assert!(store.find_by_key(number, vendor, total).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let store = SqliteDuplicateStore::in_memory().unwrap();
        exercise(&store).await;
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.db");

        {
            let store = SqliteDuplicateStore::open(&path).unwrap();
            store.insert(&record()).await.unwrap();
        }

        let reopened = SqliteDuplicateStore::open(&path).unwrap();
        assert!(reopened
            .find_by_key("INV-2024-01", "PT Maju Jaya", Decimal::from(1_500_000))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_locked_database_does_not_stall_runtime() {
        let store = Arc::new(SqliteDuplicateStore::in_memory().unwrap());
        let guard = store.conn.lock().unwrap();

        let lookup = tokio::spawn({
            let store = store.clone();
            async move { store.find_by_key("INV-1", "PT Abadi", Decimal::ONE).await }
        });

        // The single runtime thread keeps running while the query waits.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!lookup.is_finished());

        drop(guard);
        assert!(lookup.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryDuplicateStore::new();
        exercise(&store).await;
        assert_eq!(store.len(), 1);
    }
}
