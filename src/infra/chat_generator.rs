use crate::app::ports::{GeneratedMessage, GenerationRequest, MessageGenerator};
use crate::config::GeneratorConfig;
use crate::error::{OutreachError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You write short, personalized, professional outreach emails \
to clinical trial staff on behalf of a patient recruitment company.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Azure OpenAI style chat-completions collaborator.
pub struct ChatCompletionGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    sender: String,
}

impl ChatCompletionGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| OutreachError::Config("generator.endpoint is required for chat".into()))?;
        let deployment = config
            .deployment
            .as_deref()
            .ok_or_else(|| OutreachError::Config("generator.deployment is required for chat".into()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| OutreachError::Config("generator.api_key is required for chat".into()))?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            config.api_version
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            sender: config.sender_signature.clone(),
        })
    }

    fn prompt(&self, request: &GenerationRequest) -> String {
        let record = &request.record;
        let contact = &request.contact.contact;
        format!(
            "Write an outreach email about this clinical trial.\n\n\
             STUDY:\n- Title: {title}\n- NCT ID: {nct}\n- Conditions: {conditions}\n- Phase: {phases}\n- Status: {status}\n\n\
             CONTACT:\n- Name: {name}\n- Role: {role}\n- Type: {kind}\n- Affiliation: {affiliation}\n- Why them: {why}\n\n\
             SENDER:\n{sender}\n\n\
             Start with a line 'Subject: <subject>', then the body. Reference the study title and NCT ID, \
             suggest a brief call, keep it between 200 and 250 words.",
            title = record.brief_title.as_deref().unwrap_or("Untitled study"),
            nct = record.nct_id,
            conditions = record.conditions.join(", "),
            phases = record.phases.join(", "),
            status = record.status.as_deref().unwrap_or("UNKNOWN"),
            name = contact.name(),
            role = contact.role().map(|r| r.as_str()).unwrap_or("unspecified"),
            kind = contact.kind(),
            affiliation = contact.affiliation_or_site().unwrap_or(""),
            why = request.contact.rationale.join("; "),
            sender = self.sender,
        )
    }
}

/// Split a model reply into subject and body. Expects a leading
/// `Subject:` line; without one the whole reply is the body.
pub fn parse_reply(reply: &str) -> GeneratedMessage {
    let trimmed = reply.trim();
    let mut lines = trimmed.lines();
    if let Some(first) = lines.next() {
        let first = first.trim().trim_start_matches(['*', '#', ' ']);
        if let Some(subject) = first
            .strip_prefix("Subject:")
            .or_else(|| first.strip_prefix("subject:"))
        {
            let body = lines.collect::<Vec<_>>().join("\n");
            return GeneratedMessage {
                subject: subject.trim().trim_end_matches('*').trim().to_string(),
                body: body.trim().to_string(),
            };
        }
    }
    GeneratedMessage {
        subject: String::new(),
        body: trimmed.to_string(),
    }
}

#[async_trait]
impl MessageGenerator for ChatCompletionGenerator {
    fn name(&self) -> &'static str {
        "chat"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedMessage> {
        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: self.prompt(request),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Requesting generation for {}", request.record.nct_id);
        let resp = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(OutreachError::Generation(format!(
                "chat endpoint returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OutreachError::Generation("chat response had no content".into()))?;
        Ok(parse_reply(&content))
    }
}
