use crate::app::ports::{GeneratedMessage, GenerationRequest, MessageGenerator};
use crate::error::Result;
use async_trait::async_trait;

/// Offline generator rendering a fixed recruitment template. Used for dry runs
/// and whenever no chat endpoint is configured.
pub struct TemplateGenerator {
    sender: String,
}

impl TemplateGenerator {
    pub fn new(sender_signature: &str) -> Self {
        Self {
            sender: sender_signature.to_string(),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl MessageGenerator for TemplateGenerator {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedMessage> {
        let record = &request.record;
        let contact = &request.contact.contact;
        let title = record.brief_title.as_deref().unwrap_or("your study");

        let greeting = format!("Dear {},", contact.name());
        let context = match request.contact.rationale.join(", ") {
            joined if joined.is_empty() => String::new(),
            joined => format!(" {}, you are well placed to judge how enrollment is going.", capitalize(&joined)),
        };
        let conditions = if record.conditions.is_empty() {
            "this therapeutic area".to_string()
        } else {
            record.conditions.join(", ")
        };

        let body = format!(
            "{greeting}\n\n\
             I came across {title} ({nct}) on the clinical trial registry.{context}\n\n\
             We help study teams working on {conditions} reach eligible patients faster, \
             with automated pre-screening and secure handling of patient data.\n\n\
             Would you be open to a brief call next week to see whether this could help your site?\n\n\
             Best regards,\n{sender}",
            nct = record.nct_id,
            sender = self.sender,
        );

        Ok(GeneratedMessage {
            subject: format!("Patient recruitment support for {}", record.nct_id),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Contact, ContactRole, EvaluatedContact, RecordSummary};

    #[tokio::test]
    async fn renders_a_message_that_passes_validation() {
        let generator = TemplateGenerator::new("The Recruitment Team");
        let request = GenerationRequest {
            record: RecordSummary {
                nct_id: "NCT01234567".into(),
                brief_title: Some("Gut Flora in IBS".into()),
                official_title: None,
                status: None,
                phases: vec!["PHASE4".into()],
                conditions: vec!["IBS".into()],
            },
            contact: EvaluatedContact {
                contact: Contact::CentralContact {
                    name: "Jo Park".into(),
                    email: Some("jo@acme.com".into()),
                    phone: None,
                    role: Some(ContactRole::Contact),
                },
                priority: 2,
                rationale: vec!["given your involvement in this Phase 4 study".into()],
            },
        };

        let message = generator.generate(&request).await.unwrap();
        assert_eq!(message.subject, "Patient recruitment support for NCT01234567");
        assert!(message.body.starts_with("Dear Jo Park,"));
        assert!(message.body.contains("Gut Flora in IBS (NCT01234567)"));
        assert!(message
            .body
            .contains("Given your involvement in this Phase 4 study, you are well placed"));
        assert!(message.validate(100).is_ok());
    }
}
