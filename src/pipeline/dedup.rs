use crate::error::Result;
use crate::storage::ContactLedger;
use std::collections::HashSet;
use uuid::Uuid;

/// Dedup view for a single run: the persistent ledger plus the pairs already
/// forwarded during this run, so a contact is never handed off twice even
/// before the ledger reflects it.
pub struct RunDedup<'a> {
    ledger: &'a dyn ContactLedger,
    run_id: Uuid,
    seen: HashSet<(String, String)>,
}

impl<'a> RunDedup<'a> {
    pub fn new(ledger: &'a dyn ContactLedger, run_id: Uuid) -> Self {
        Self {
            ledger,
            run_id,
            seen: HashSet::new(),
        }
    }

    /// True when neither this run nor the ledger has seen the pair. Emails are
    /// expected already lowercased.
    pub async fn is_new(&self, record_id: &str, email: &str) -> Result<bool> {
        if self
            .seen
            .contains(&(record_id.to_string(), email.to_string()))
        {
            return Ok(false);
        }
        Ok(!self.ledger.was_contacted(record_id, email).await?)
    }

    /// Record a forwarded contact in the ledger, then in the run set.
    pub async fn mark(
        &mut self,
        record_id: &str,
        email: &str,
        snapshot: &serde_json::Value,
    ) -> Result<()> {
        self.ledger
            .record_contact(record_id, email, snapshot, Some(self.run_id))
            .await?;
        self.seen.insert((record_id.to_string(), email.to_string()));
        Ok(())
    }

    pub fn forwarded_this_run(&self) -> usize {
        self.seen.len()
    }
}
