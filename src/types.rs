use crate::constants::{NO_EMAIL, NO_PHONE};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::debug;

/// Raw study as returned by the registry, untouched
pub type RawRecord = serde_json::Value;

// Registry record shapes. Every module is optional; the registry omits whatever
// the sponsor never filled in.

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecord {
    pub protocol_section: ProtocolSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSection {
    #[serde(deserialize_with = "lenient")]
    pub identification_module: Option<IdentificationModule>,
    #[serde(deserialize_with = "lenient")]
    pub status_module: Option<StatusModule>,
    #[serde(deserialize_with = "lenient")]
    pub conditions_module: Option<ConditionsModule>,
    #[serde(deserialize_with = "lenient")]
    pub design_module: Option<DesignModule>,
    #[serde(deserialize_with = "lenient")]
    pub sponsor_collaborators_module: Option<SponsorCollaboratorsModule>,
    #[serde(deserialize_with = "lenient")]
    pub contacts_locations_module: Option<ContactsLocationsModule>,
}

/// Parse one module on its own. A module of the wrong shape reads as absent
/// instead of failing the whole record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match serde_json::from_value(value) {
        Ok(module) => Ok(Some(module)),
        Err(e) => {
            debug!("Ignoring malformed {}: {}", std::any::type_name::<T>(), e);
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentificationModule {
    pub nct_id: Option<String>,
    pub brief_title: Option<String>,
    pub official_title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusModule {
    pub overall_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionsModule {
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignModule {
    pub phases: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SponsorCollaboratorsModule {
    pub lead_sponsor: Option<RegistryParty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactsLocationsModule {
    pub central_contacts: Vec<RegistryParty>,
    pub overall_officials: Vec<RegistryParty>,
    pub locations: Vec<RegistryLocation>,
}

/// Any person or organization entry in the registry. Which fields are filled
/// depends on the module it came from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryParty {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryLocation {
    pub facility: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub contacts: Vec<RegistryParty>,
}

// Contacts

/// Where a contact was found in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    LeadSponsor,
    CentralContact,
    OverallOfficial,
    SiteContact,
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContactKind::LeadSponsor => "Lead Sponsor",
            ContactKind::CentralContact => "Central Contact",
            ContactKind::OverallOfficial => "Overall Official",
            ContactKind::SiteContact => "Site Contact",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContactRole {
    PrincipalInvestigator,
    StudyDirector,
    StudyChair,
    SubInvestigator,
    Contact,
    Other(String),
}

impl ContactRole {
    pub fn from_registry(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "PRINCIPAL_INVESTIGATOR" => ContactRole::PrincipalInvestigator,
            "STUDY_DIRECTOR" => ContactRole::StudyDirector,
            "STUDY_CHAIR" => ContactRole::StudyChair,
            "SUB_INVESTIGATOR" => ContactRole::SubInvestigator,
            "CONTACT" => ContactRole::Contact,
            _ => ContactRole::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContactRole::PrincipalInvestigator => "PRINCIPAL_INVESTIGATOR",
            ContactRole::StudyDirector => "STUDY_DIRECTOR",
            ContactRole::StudyChair => "STUDY_CHAIR",
            ContactRole::SubInvestigator => "SUB_INVESTIGATOR",
            ContactRole::Contact => "CONTACT",
            ContactRole::Other(raw) => raw,
        }
    }
}

impl From<String> for ContactRole {
    fn from(raw: String) -> Self {
        ContactRole::from_registry(&raw)
    }
}

impl From<ContactRole> for String {
    fn from(role: ContactRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for ContactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact pulled out of one of the four record sub-structures. Each variant
/// carries only what its source provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Contact {
    LeadSponsor {
        organization: String,
        email: Option<String>,
        phone: Option<String>,
    },
    CentralContact {
        name: String,
        email: Option<String>,
        phone: Option<String>,
        role: Option<ContactRole>,
    },
    OverallOfficial {
        name: String,
        email: Option<String>,
        phone: Option<String>,
        role: Option<ContactRole>,
        affiliation: Option<String>,
    },
    SiteContact {
        name: String,
        email: Option<String>,
        phone: Option<String>,
        role: Option<ContactRole>,
        site: String,
        city: Option<String>,
        state: Option<String>,
        country: Option<String>,
    },
}

impl Contact {
    pub fn kind(&self) -> ContactKind {
        match self {
            Contact::LeadSponsor { .. } => ContactKind::LeadSponsor,
            Contact::CentralContact { .. } => ContactKind::CentralContact,
            Contact::OverallOfficial { .. } => ContactKind::OverallOfficial,
            Contact::SiteContact { .. } => ContactKind::SiteContact,
        }
    }

    /// Display name. A sponsor is addressed by its organization name.
    pub fn name(&self) -> &str {
        match self {
            Contact::LeadSponsor { organization, .. } => organization,
            Contact::CentralContact { name, .. }
            | Contact::OverallOfficial { name, .. }
            | Contact::SiteContact { name, .. } => name,
        }
    }

    pub fn organization(&self) -> Option<&str> {
        match self {
            Contact::LeadSponsor { organization, .. } => Some(organization),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Contact::LeadSponsor { email, .. }
            | Contact::CentralContact { email, .. }
            | Contact::OverallOfficial { email, .. }
            | Contact::SiteContact { email, .. } => email.as_deref(),
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            Contact::LeadSponsor { phone, .. }
            | Contact::CentralContact { phone, .. }
            | Contact::OverallOfficial { phone, .. }
            | Contact::SiteContact { phone, .. } => phone.as_deref(),
        }
    }

    pub fn role(&self) -> Option<&ContactRole> {
        match self {
            Contact::LeadSponsor { .. } => None,
            Contact::CentralContact { role, .. }
            | Contact::OverallOfficial { role, .. }
            | Contact::SiteContact { role, .. } => role.as_ref(),
        }
    }

    pub fn affiliation_or_site(&self) -> Option<&str> {
        match self {
            Contact::OverallOfficial { affiliation, .. } => affiliation.as_deref(),
            Contact::SiteContact { site, .. } => Some(site),
            _ => None,
        }
    }

    /// `lowercase(email)_lowercase(name)`. Same key means same person, whichever
    /// record or role produced the contact.
    pub fn identity_key(&self) -> String {
        format!(
            "{}_{}",
            self.email().unwrap_or_default().to_lowercase(),
            self.name().to_lowercase()
        )
    }

    pub fn email_or_sentinel(&self) -> &str {
        self.email().unwrap_or(NO_EMAIL)
    }

    pub fn phone_or_sentinel(&self) -> &str {
        self.phone().unwrap_or(NO_PHONE)
    }
}

/// A contact that survived scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedContact {
    pub contact: Contact,
    pub priority: u32,
    pub rationale: Vec<String>,
}

// Per-record views handed downstream

/// The parts of a record the generator and the ledger care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub nct_id: String,
    pub brief_title: Option<String>,
    pub official_title: Option<String>,
    pub status: Option<String>,
    pub phases: Vec<String>,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedRecord {
    pub summary: RecordSummary,
    pub contacts: Vec<Contact>,
}

/// One generated message, ready for the export sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachMessage {
    pub record_id: String,
    pub contact: EvaluatedContact,
    pub subject: String,
    pub body: String,
    pub generated_at: DateTime<Utc>,
}
