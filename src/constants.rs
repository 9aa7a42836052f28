//! Registry and scoring constants shared across the pipeline.

pub const REGISTRY_BASE_URL: &str = "https://clinicaltrials.gov/api/v2/studies";

/// The registry refuses page sizes above this.
pub const MAX_PAGE_SIZE: usize = 50;

pub const DEFAULT_CALLS_PER_SECOND: f64 = 3.0;
pub const DEFAULT_QUERY: &str = "Gastrointestinal";

// Explicit "no value" markers used when rendering absent contact fields
pub const NO_NAME: &str = "No name";
pub const NO_EMAIL: &str = "No email";
pub const NO_PHONE: &str = "No phone";
pub const NO_ROLE: &str = "No role";
pub const UNKNOWN_SITE: &str = "Unknown Site";

/// Highest late-stage phase label the registry reports.
pub const LATE_STAGE_PHASE: &str = "PHASE4";

/// Contacts scoring at or below this are not worth reaching out to.
pub const MIN_OUTREACH_PRIORITY: u32 = 1;

/// Fields requested from the registry when none are configured.
pub const DEFAULT_FIELDS: &[&str] = &[
    "protocolSection.identificationModule",
    "protocolSection.statusModule",
    "protocolSection.conditionsModule",
    "protocolSection.designModule",
    "protocolSection.contactsLocationsModule",
    "protocolSection.sponsorCollaboratorsModule",
];

pub fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}
