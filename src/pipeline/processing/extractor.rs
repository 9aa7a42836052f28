use crate::constants::{NO_NAME, UNKNOWN_SITE};
use crate::error::{OutreachError, Result};
use crate::types::{
    Contact, ContactRole, ExtractedRecord, RawRecord, RecordSummary, RegistryParty, StudyRecord,
};
use metrics::counter;
use tracing::{debug, warn};

/// Turn empty or whitespace-only registry strings into an explicit absence.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn name_of(party: &RegistryParty) -> String {
    present(&party.name).unwrap_or_else(|| NO_NAME.to_string())
}

fn role_of(party: &RegistryParty) -> Option<ContactRole> {
    present(&party.role).map(|r| ContactRole::from_registry(&r))
}

/// Parse one raw study and flatten its contact sub-structures.
///
/// Fails only when the record is unusable as a whole (no `protocolSection` or no
/// NCT id). Any missing module just contributes no contacts.
pub fn extract(raw: &RawRecord) -> Result<ExtractedRecord> {
    if !raw.is_object() {
        return Err(OutreachError::MissingField("record is not a JSON object".into()));
    }
    if raw.get("protocolSection").is_none() {
        return Err(OutreachError::MissingField("protocolSection".into()));
    }
    let study: StudyRecord = serde_json::from_value(raw.clone())?;
    let protocol = study.protocol_section;

    let identification = protocol.identification_module.unwrap_or_default();
    let nct_id = present(&identification.nct_id)
        .ok_or_else(|| OutreachError::MissingField("identificationModule.nctId".into()))?;

    let summary = RecordSummary {
        nct_id,
        brief_title: present(&identification.brief_title),
        official_title: present(&identification.official_title),
        status: protocol.status_module.and_then(|s| present(&s.overall_status)),
        phases: protocol
            .design_module
            .map(|d| d.phases)
            .unwrap_or_default(),
        conditions: protocol
            .conditions_module
            .map(|c| c.conditions)
            .unwrap_or_default(),
    };

    let mut contacts = Vec::new();

    if let Some(sponsor) = protocol
        .sponsor_collaborators_module
        .and_then(|m| m.lead_sponsor)
    {
        contacts.push(Contact::LeadSponsor {
            organization: name_of(&sponsor),
            email: present(&sponsor.email),
            phone: present(&sponsor.phone),
        });
    }

    if let Some(module) = protocol.contacts_locations_module {
        for party in &module.central_contacts {
            contacts.push(Contact::CentralContact {
                name: name_of(party),
                email: present(&party.email),
                phone: present(&party.phone),
                role: role_of(party),
            });
        }

        for official in &module.overall_officials {
            contacts.push(Contact::OverallOfficial {
                name: name_of(official),
                email: present(&official.email),
                phone: present(&official.phone),
                role: role_of(official),
                affiliation: present(&official.affiliation),
            });
        }

        for location in &module.locations {
            let site = present(&location.facility).unwrap_or_else(|| UNKNOWN_SITE.to_string());
            for party in &location.contacts {
                contacts.push(Contact::SiteContact {
                    name: name_of(party),
                    email: present(&party.email),
                    phone: present(&party.phone),
                    role: role_of(party),
                    site: site.clone(),
                    city: present(&location.city),
                    state: present(&location.state),
                    country: present(&location.country),
                });
            }
        }
    }

    debug!(
        "Extracted {} contacts from {}",
        contacts.len(),
        summary.nct_id
    );
    Ok(ExtractedRecord { summary, contacts })
}

/// Extract every record, logging and skipping the malformed ones.
///
/// Returns the usable records and how many were skipped.
pub fn extract_batch(records: &[RawRecord]) -> (Vec<ExtractedRecord>, usize) {
    let mut extracted = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for (i, raw) in records.iter().enumerate() {
        match extract(raw) {
            Ok(record) => extracted.push(record),
            Err(e) => {
                skipped += 1;
                counter!("outreach_records_malformed_total").increment(1);
                warn!("Skipping malformed study at position {}: {}", i, e);
            }
        }
    }
    (extracted, skipped)
}
