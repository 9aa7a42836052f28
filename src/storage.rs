use crate::error::{OutreachError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// One append-only ledger row. Its existence for `(record_id, contact_email)`
/// is what marks a contact as already reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub record_id: String,
    pub contact_email: String,
    pub contact_snapshot: serde_json::Value,
    pub contacted_at: DateTime<Utc>,
    pub run_id: Option<Uuid>,
}

/// Persistent record of which (record, email) pairs were already forwarded.
///
/// Lookups are exact on the key as given; callers lowercase emails first.
/// `record_contact` never checks for an existing entry, so check-then-record is
/// the caller's job and is not atomic across concurrent runs.
#[async_trait]
pub trait ContactLedger: Send + Sync {
    async fn was_contacted(&self, record_id: &str, email: &str) -> Result<bool>;

    async fn record_contact(
        &self,
        record_id: &str,
        email: &str,
        snapshot: &serde_json::Value,
        run_id: Option<Uuid>,
    ) -> Result<()>;

    /// All entries in insertion order.
    async fn entries(&self) -> Result<Vec<LedgerEntry>>;
}

/// In-memory ledger for tests and dry runs
#[derive(Default)]
pub struct InMemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<LedgerEntry>>> {
        self.entries
            .lock()
            .map_err(|_| OutreachError::Ledger("in-memory ledger lock poisoned".into()))
    }
}

#[async_trait]
impl ContactLedger for InMemoryLedger {
    async fn was_contacted(&self, record_id: &str, email: &str) -> Result<bool> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .any(|e| e.record_id == record_id && e.contact_email == email))
    }

    async fn record_contact(
        &self,
        record_id: &str,
        email: &str,
        snapshot: &serde_json::Value,
        run_id: Option<Uuid>,
    ) -> Result<()> {
        let mut entries = self.lock()?;
        entries.push(LedgerEntry {
            record_id: record_id.to_string(),
            contact_email: email.to_string(),
            contact_snapshot: snapshot.clone(),
            contacted_at: Utc::now(),
            run_id,
        });
        debug!("Recorded contact {} for {}", email, record_id);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.lock()?.clone())
    }
}
