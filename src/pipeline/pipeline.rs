use super::dedup::RunDedup;
use super::ingestion::{Interrupt, PaginatedFetcher};
use super::processing::{evaluate_all, extract_batch, usable_email};
use crate::app::ports::{GenerationRequest, MessageGenerator};
use crate::error::Result;
use crate::storage::ContactLedger;
use crate::types::{EvaluatedContact, OutreachMessage, RecordSummary};
use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Bodies shorter than this are treated as a failed generation.
pub const DEFAULT_MIN_BODY_CHARS: usize = 100;

/// Outcome of one pipeline run. Returned even when the fetch was interrupted.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub query: String,
    pub records_fetched: usize,
    pub records_processed: usize,
    pub records_skipped: usize,
    pub contacts_extracted: usize,
    pub contacts_qualified: usize,
    pub duplicates_skipped: usize,
    pub generated: usize,
    pub generation_failures: usize,
    pub interrupted: bool,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub messages: Vec<OutreachMessage>,
}

impl RunSummary {
    fn new(run_id: Uuid, query: &str) -> Self {
        Self {
            run_id,
            query: query.to_string(),
            records_fetched: 0,
            records_processed: 0,
            records_skipped: 0,
            contacts_extracted: 0,
            contacts_qualified: 0,
            duplicates_skipped: 0,
            generated: 0,
            generation_failures: 0,
            interrupted: false,
            errors: Vec::new(),
            messages: Vec::new(),
        }
    }
}

/// A record together with the contacts that survived scoring.
#[derive(Debug, Serialize)]
pub struct RecordPreview {
    pub record: RecordSummary,
    pub contacts: Vec<EvaluatedContact>,
}

/// Fetch → extract → evaluate → dedup → generate, strictly one step at a time.
///
/// Runs sharing a ledger must not overlap: the ledger check and the ledger
/// write are separate calls.
pub struct Pipeline {
    fetcher: PaginatedFetcher,
    ledger: Arc<dyn ContactLedger>,
    generator: Arc<dyn MessageGenerator>,
    min_body_chars: usize,
}

impl Pipeline {
    pub fn new(
        fetcher: PaginatedFetcher,
        ledger: Arc<dyn ContactLedger>,
        generator: Arc<dyn MessageGenerator>,
    ) -> Self {
        Self {
            fetcher,
            ledger,
            generator,
            min_body_chars: DEFAULT_MIN_BODY_CHARS,
        }
    }

    pub fn with_min_body_chars(mut self, min_body_chars: usize) -> Self {
        self.min_body_chars = min_body_chars;
        self
    }

    #[instrument(skip(self, requested_fields, interrupt))]
    pub async fn run(
        &self,
        query: &str,
        requested_fields: &[String],
        limit: Option<usize>,
        interrupt: &Interrupt,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let mut summary = RunSummary::new(run_id, query);
        info!(
            "🚀 Starting outreach run {} for query '{}' (generator: {})",
            run_id,
            query,
            self.generator.name()
        );
        counter!("outreach_runs_total").increment(1);
        let t_run = std::time::Instant::now();

        let fetched = self
            .fetcher
            .fetch_all(query, requested_fields, limit, interrupt)
            .await?;
        summary.records_fetched = fetched.records.len();
        summary.interrupted = fetched.interrupted;

        let (records, skipped) = extract_batch(&fetched.records);
        summary.records_processed = records.len();
        summary.records_skipped = skipped;

        let mut dedup = RunDedup::new(self.ledger.as_ref(), run_id);

        for record in &records {
            let record_id = &record.summary.nct_id;
            summary.contacts_extracted += record.contacts.len();

            let survivors = evaluate_all(&record.contacts, &record.summary);
            if survivors.is_empty() {
                debug!("No outreach-worthy contacts in {}", record_id);
                continue;
            }
            summary.contacts_qualified += survivors.len();

            for evaluated in survivors {
                let Some(email) = usable_email(evaluated.contact.email()) else {
                    continue;
                };
                let email = email.to_lowercase();

                if !dedup.is_new(record_id, &email).await? {
                    debug!("Already contacted {} for {}, skipping", email, record_id);
                    summary.duplicates_skipped += 1;
                    continue;
                }

                let request = GenerationRequest {
                    record: record.summary.clone(),
                    contact: evaluated.clone(),
                };
                let message = match self.generator.generate(&request).await.and_then(|m| {
                    m.validate(self.min_body_chars)?;
                    Ok(m)
                }) {
                    Ok(message) => message,
                    Err(e) => {
                        error!("Generation failed for {} on {}: {}", email, record_id, e);
                        counter!("outreach_generation_failures_total").increment(1);
                        summary.generation_failures += 1;
                        summary.errors.push(format!("{record_id}/{email}: {e}"));
                        continue;
                    }
                };

                // The ledger row is the durable copy of what was sent
                let snapshot = json!({
                    "identity": evaluated.contact.identity_key(),
                    "contact": &evaluated.contact,
                    "priority": evaluated.priority,
                    "rationale": &evaluated.rationale,
                    "message": {
                        "subject": &message.subject,
                        "body": &message.body,
                    },
                });
                dedup.mark(record_id, &email, &snapshot).await?;

                summary.messages.push(OutreachMessage {
                    record_id: record_id.clone(),
                    contact: evaluated,
                    subject: message.subject,
                    body: message.body,
                    generated_at: Utc::now(),
                });
                summary.generated += 1;
                counter!("outreach_messages_generated_total").increment(1);
            }
        }

        counter!("outreach_duplicates_skipped_total").increment(summary.duplicates_skipped as u64);
        histogram!("outreach_run_duration_seconds").record(t_run.elapsed().as_secs_f64());

        if summary.interrupted {
            warn!("Run {} was interrupted; summary covers partial results", run_id);
        }
        info!(
            "✅ Run {} done: {} records processed ({} skipped), {} contacts forwarded, {} duplicates, {} failures",
            run_id,
            summary.records_processed,
            summary.records_skipped,
            dedup.forwarded_this_run(),
            summary.duplicates_skipped,
            summary.generation_failures
        );
        Ok(summary)
    }

    /// Fetch and score without touching the ledger or the generator.
    pub async fn preview(
        &self,
        query: &str,
        fields: &[String],
        limit: Option<usize>,
        interrupt: &Interrupt,
    ) -> Result<Vec<RecordPreview>> {
        let fetched = self.fetcher.fetch_all(query, fields, limit, interrupt).await?;
        let (records, _) = extract_batch(&fetched.records);
        Ok(records
            .into_iter()
            .map(|r| RecordPreview {
                contacts: evaluate_all(&r.contacts, &r.summary),
                record: r.summary,
            })
            .collect())
    }
}
