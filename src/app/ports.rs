use crate::error::Result;
use crate::types::{EvaluatedContact, RawRecord, RecordSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Registry-side port

/// One page request against the registry.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRequest {
    pub condition_query: String,
    pub fields: Vec<String>,
    pub page_size: usize,
    pub page_token: Option<String>,
}

impl PageRequest {
    /// Query parameters in the order the registry documents them.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query.cond", self.condition_query.clone()),
            ("fields", self.fields.join(",")),
            ("pageSize", self.page_size.to_string()),
            ("format", "json".to_string()),
        ];
        if let Some(token) = &self.page_token {
            params.push(("pageToken", token.clone()));
        }
        params
    }

    /// Human-readable form attached to errors.
    pub fn describe(&self) -> String {
        self.query_params()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPage {
    #[serde(default)]
    pub studies: Vec<RawRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch a single page. Transport failures and non-2xx answers come back as
    /// `OutreachError::Registry` carrying the request parameters.
    async fn fetch_page(&self, request: &PageRequest) -> Result<RegistryPage>;
}

// Generation-side port

#[derive(Clone, Debug, Serialize)]
pub struct GenerationRequest {
    pub record: RecordSummary,
    pub contact: EvaluatedContact,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub subject: String,
    pub body: String,
}

impl GeneratedMessage {
    /// Reject empty subjects and bodies too short to be a real message.
    pub fn validate(&self, min_body_chars: usize) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(crate::error::OutreachError::Generation(
                "generated message has an empty subject".into(),
            ));
        }
        let body_len = self.body.trim().chars().count();
        if body_len < min_body_chars {
            return Err(crate::error::OutreachError::Generation(format!(
                "generated body is {body_len} chars, need at least {min_body_chars}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
pub trait MessageGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedMessage>;
}
