#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trial_outreach::app::ports::{
    GeneratedMessage, GenerationRequest, MessageGenerator, PageRequest, RegistryClient, RegistryPage,
};
use trial_outreach::error::{OutreachError, Result};
use trial_outreach::pipeline::ingestion::{Interrupt, PaginatedFetcher, RateLimiter};

pub enum Scripted {
    Page(RegistryPage),
    Fail { status: u16, body: String },
}

/// Registry double that replays a fixed script of pages and records every request.
#[derive(Default)]
pub struct ScriptedRegistry {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<PageRequest>>,
    /// Fired right after the given call number (1-based) returns.
    interrupt_after: Mutex<Option<(usize, Interrupt)>>,
}

impl ScriptedRegistry {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    /// Endless pages of `size` studies each, always advertising a next page.
    pub fn endless(pages: usize, size: usize) -> Arc<Self> {
        let script = (0..pages)
            .map(|p| Scripted::Page(page((0..size).map(|i| study(&format!("NCT{p:04}{i:04}"))).collect(), Some("more"))))
            .collect();
        Self::new(script)
    }

    pub fn interrupt_after(&self, call: usize, interrupt: &Interrupt) {
        *self.interrupt_after.lock().unwrap() = Some((call, interrupt.clone()));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RegistryPage> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if let Some((after, interrupt)) = self.interrupt_after.lock().unwrap().as_ref() {
            if call == *after {
                interrupt.trigger();
            }
        }
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Page(page)) => Ok(page),
            Some(Scripted::Fail { status, body }) => Err(OutreachError::Registry {
                status: Some(status),
                params: request.describe(),
                body,
            }),
            None => Ok(RegistryPage::default()),
        }
    }
}

pub fn page(studies: Vec<Value>, next: Option<&str>) -> RegistryPage {
    RegistryPage {
        studies,
        next_page_token: next.map(str::to_string),
        total_count: None,
    }
}

/// Minimal well-formed study with no contacts.
pub fn study(nct_id: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": { "nctId": nct_id, "briefTitle": format!("Study {nct_id}") }
        }
    })
}

/// Study with a PI official and a PI site contact, both reachable at `email`.
pub fn study_with_contacts(nct_id: &str, email: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": {
                "nctId": nct_id,
                "briefTitle": "Microbiome modulation in ulcerative colitis"
            },
            "statusModule": { "overallStatus": "RECRUITING" },
            "conditionsModule": { "conditions": ["Ulcerative Colitis"] },
            "designModule": { "phases": ["PHASE2"] },
            "sponsorCollaboratorsModule": {
                "leadSponsor": { "name": "Acme Therapeutics", "class": "INDUSTRY" }
            },
            "contactsLocationsModule": {
                "overallOfficials": [
                    {
                        "name": "Dana Whitfield, MD",
                        "role": "PRINCIPAL_INVESTIGATOR",
                        "affiliation": "Lakeside University Hospital",
                        "email": email
                    }
                ],
                "locations": [
                    {
                        "facility": "Lakeside GI Clinic",
                        "city": "Portland",
                        "state": "Oregon",
                        "country": "United States",
                        "contacts": [
                            { "name": "Dana Whitfield, MD", "role": "PRINCIPAL_INVESTIGATOR", "email": email.to_uppercase() },
                            { "name": "Front Desk", "role": "CONTACT", "email": "desk@lakeside.example.org" }
                        ]
                    }
                ]
            }
        }
    })
}

pub fn fetcher(client: Arc<ScriptedRegistry>, page_size: usize) -> PaginatedFetcher {
    PaginatedFetcher::new(client, RateLimiter::new(0.0), page_size)
}

pub fn fields() -> Vec<String> {
    vec!["NCTId".to_string(), "ContactsLocationsModule".to_string()]
}

/// Generator that counts calls and answers with a fixed, valid message.
#[derive(Default)]
pub struct CountingGenerator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MessageGenerator for CountingGenerator {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedMessage {
            subject: format!("About {}", request.record.nct_id),
            body: format!(
                "Dear {},\n\n{}. We would like to help with recruitment for this study and its patients.",
                request.contact.contact.name(),
                request.contact.rationale.join(", ")
            ),
        })
    }
}

/// Generator that always fails, either outright or with a too-short body.
pub struct FailingGenerator {
    pub short_body: bool,
}

#[async_trait]
impl MessageGenerator for FailingGenerator {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<GeneratedMessage> {
        if self.short_body {
            Ok(GeneratedMessage {
                subject: "Hi".into(),
                body: "Too short.".into(),
            })
        } else {
            Err(OutreachError::Generation("upstream returned 503".into()))
        }
    }
}
