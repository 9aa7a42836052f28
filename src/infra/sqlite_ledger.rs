use crate::error::{OutreachError, Result};
use crate::storage::{ContactLedger, LedgerEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// SQLite-backed contact ledger. One append-only table, indexed on the dedup key.
///
/// rusqlite is blocking, so every statement runs on the blocking pool.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS contact_ledger (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id         TEXT NOT NULL,
                email             TEXT NOT NULL,
                contact_snapshot  TEXT NOT NULL,
                contacted_at      TEXT NOT NULL,
                run_id            TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_contact_ledger_key
                ON contact_ledger (record_id, email);
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| OutreachError::Ledger("sqlite ledger lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| OutreachError::Ledger(format!("ledger task failed: {e}")))?
    }
}

fn read_entries(conn: &Connection) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT record_id, email, contact_snapshot, contacted_at, run_id
         FROM contact_ledger ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let snapshot: String = row.get(2)?;
        let contacted_at: String = row.get(3)?;
        let run_id: Option<String> = row.get(4)?;
        entries.push(LedgerEntry {
            record_id: row.get(0)?,
            contact_email: row.get(1)?,
            contact_snapshot: serde_json::from_str(&snapshot)?,
            contacted_at: DateTime::parse_from_rfc3339(&contacted_at)
                .map_err(|e| OutreachError::Ledger(format!("bad timestamp '{contacted_at}': {e}")))?
                .with_timezone(&Utc),
            run_id: run_id.and_then(|id| Uuid::parse_str(&id).ok()),
        });
    }
    Ok(entries)
}

#[async_trait]
impl ContactLedger for SqliteLedger {
    async fn was_contacted(&self, record_id: &str, email: &str) -> Result<bool> {
        let (record_id, email) = (record_id.to_string(), email.to_string());
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT 1 FROM contact_ledger WHERE record_id = ?1 AND email = ?2 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![record_id, email])?;
            let found = rows.next()?.is_some();
            Ok(found)
        })
        .await
    }

    async fn record_contact(
        &self,
        record_id: &str,
        email: &str,
        snapshot: &serde_json::Value,
        run_id: Option<Uuid>,
    ) -> Result<()> {
        let snapshot = serde_json::to_string(snapshot)?;
        let (record_id, email) = (record_id.to_string(), email.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO contact_ledger (record_id, email, contact_snapshot, contacted_at, run_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record_id,
                    email,
                    snapshot,
                    Utc::now().to_rfc3339(),
                    run_id.map(|id| id.to_string())
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        self.with_conn(read_entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn entries_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger").join("outreach.db");
        let run_id = Uuid::new_v4();

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger
                .record_contact("NCT1", "a@x.com", &json!({ "name": "A" }), Some(run_id))
                .await
                .unwrap();
        }

        let reopened = SqliteLedger::open(&path).unwrap();
        assert!(reopened.was_contacted("NCT1", "a@x.com").await.unwrap());
        assert!(!reopened.was_contacted("NCT1", "b@x.com").await.unwrap());

        let entries = reopened.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].contact_snapshot, json!({ "name": "A" }));
        assert_eq!(entries[0].run_id, Some(run_id));
    }

    #[tokio::test]
    async fn appends_duplicates_instead_of_overwriting() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.record_contact("NCT1", "a@x.com", &json!({ "v": 1 }), None).await.unwrap();
        ledger.record_contact("NCT1", "a@x.com", &json!({ "v": 2 }), None).await.unwrap();
        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].contact_snapshot, json!({ "v": 2 }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shared_ledger_serves_concurrent_tasks() {
        let ledger = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                let email = format!("person{i}@x.com");
                ledger.record_contact("NCT1", &email, &json!({ "i": i }), None).await.unwrap();
                ledger.was_contacted("NCT1", &email).await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(ledger.entries().await.unwrap().len(), 8);
    }
}
