use crate::constants::{LATE_STAGE_PHASE, MIN_OUTREACH_PRIORITY, NO_EMAIL, NO_NAME};
use crate::types::{Contact, ContactRole, EvaluatedContact, RecordSummary};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// An email the ledger can key on: present, not a placeholder, `local@domain.tld`.
pub fn usable_email(email: Option<&str>) -> Option<&str> {
    let email = email?.trim();
    if email.is_empty() || email.eq_ignore_ascii_case(NO_EMAIL) {
        return None;
    }
    EMAIL_SHAPE.is_match(email).then_some(email)
}

fn role_priority(role: Option<&ContactRole>) -> u32 {
    match role {
        Some(ContactRole::PrincipalInvestigator)
        | Some(ContactRole::StudyDirector)
        | Some(ContactRole::StudyChair) => 3,
        Some(ContactRole::SubInvestigator) => 2,
        _ => 1,
    }
}

/// Score a contact in the context of its record. `None` means not worth
/// reaching out to.
pub fn evaluate(contact: &Contact, record: &RecordSummary) -> Option<EvaluatedContact> {
    // Organizations listed under their own name are not people
    if let Some(org) = contact.organization() {
        if contact.name().trim().eq_ignore_ascii_case(org.trim()) {
            return None;
        }
    }
    // Nobody to address the message to
    if contact.name() == NO_NAME {
        return None;
    }

    usable_email(contact.email())?;

    let mut priority = role_priority(contact.role());
    let mut rationale = Vec::new();

    match contact {
        Contact::OverallOfficial {
            role, affiliation, ..
        } => {
            rationale.push(format!(
                "As the {} at {}",
                role.as_ref().map(ContactRole::as_str).unwrap_or("official"),
                affiliation.as_deref().unwrap_or("your institution")
            ));
            priority += 1;
        }
        Contact::SiteContact { role, site, .. } => {
            rationale.push(format!("As the site contact at {site}"));
            if role.as_ref() == Some(&ContactRole::PrincipalInvestigator) {
                priority += 2;
            }
        }
        _ => {}
    }

    if record.phases.iter().any(|p| p == LATE_STAGE_PHASE) {
        priority += 1;
        rationale.push("given your involvement in this Phase 4 study".to_string());
    }

    (priority > MIN_OUTREACH_PRIORITY).then(|| EvaluatedContact {
        contact: contact.clone(),
        priority,
        rationale,
    })
}

/// Evaluate every contact of a record, highest priority first. The sort is
/// stable so equal scores keep registry order.
pub fn evaluate_all(contacts: &[Contact], record: &RecordSummary) -> Vec<EvaluatedContact> {
    let mut kept: Vec<EvaluatedContact> = contacts
        .iter()
        .filter_map(|c| evaluate(c, record))
        .collect();
    kept.sort_by(|a, b| b.priority.cmp(&a.priority));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(phases: &[&str]) -> RecordSummary {
        RecordSummary {
            nct_id: "NCT09999999".into(),
            brief_title: Some("Late stage colitis".into()),
            official_title: None,
            status: Some("RECRUITING".into()),
            phases: phases.iter().map(|p| p.to_string()).collect(),
            conditions: vec!["Colitis".into()],
        }
    }

    fn official(role: &str, email: Option<&str>) -> Contact {
        Contact::OverallOfficial {
            name: "A".into(),
            email: email.map(str::to_string),
            phone: None,
            role: Some(ContactRole::from_registry(role)),
            affiliation: Some("General Hospital".into()),
        }
    }

    #[test]
    fn official_principal_investigator_in_phase_four_scores_five() {
        let evaluated = evaluate(
            &official("PRINCIPAL_INVESTIGATOR", Some("a@x.com")),
            &record(&["PHASE3", "PHASE4"]),
        )
        .unwrap();
        assert_eq!(evaluated.priority, 5);
        assert_eq!(
            evaluated.rationale,
            vec![
                "As the PRINCIPAL_INVESTIGATOR at General Hospital".to_string(),
                "given your involvement in this Phase 4 study".to_string(),
            ]
        );
    }

    #[test]
    fn organization_alias_is_always_discarded() {
        let sponsor = Contact::LeadSponsor {
            organization: "Acme Corp".into(),
            email: Some("bd@acme.com".into()),
            phone: None,
        };
        assert!(evaluate(&sponsor, &record(&["PHASE4"])).is_none());
    }

    #[test]
    fn unnamed_contact_is_discarded() {
        let unnamed = Contact::OverallOfficial {
            name: NO_NAME.into(),
            email: Some("pi@x.com".into()),
            phone: None,
            role: Some(ContactRole::PrincipalInvestigator),
            affiliation: Some("General Hospital".into()),
        };
        assert!(evaluate(&unnamed, &record(&["PHASE4"])).is_none());
    }

    #[test]
    fn contact_without_usable_email_is_discarded() {
        let r = record(&["PHASE4"]);
        assert!(evaluate(&official("STUDY_CHAIR", None), &r).is_none());
        assert!(evaluate(&official("STUDY_CHAIR", Some("No email")), &r).is_none());
        assert!(evaluate(&official("STUDY_CHAIR", Some("not-an-address")), &r).is_none());
    }

    #[test]
    fn site_principal_investigator_gets_site_bonus() {
        let site_pi = Contact::SiteContact {
            name: "Sam Lee".into(),
            email: Some("sam@mercy.org".into()),
            phone: None,
            role: Some(ContactRole::PrincipalInvestigator),
            site: "Mercy Clinic".into(),
            city: None,
            state: None,
            country: None,
        };
        let evaluated = evaluate(&site_pi, &record(&["PHASE2"])).unwrap();
        assert_eq!(evaluated.priority, 5);
        assert_eq!(evaluated.rationale, vec!["As the site contact at Mercy Clinic"]);
    }

    #[test]
    fn baseline_contact_is_not_outreach_worthy() {
        let central = Contact::CentralContact {
            name: "Jo Park".into(),
            email: Some("jo@acme.com".into()),
            phone: None,
            role: Some(ContactRole::Contact),
        };
        assert!(evaluate(&central, &record(&["PHASE2"])).is_none());
        // the late-stage bump lifts it over the bar
        assert_eq!(evaluate(&central, &record(&["PHASE4"])).unwrap().priority, 2);
    }

    #[test]
    fn evaluate_all_orders_by_priority() {
        let contacts = vec![
            Contact::CentralContact {
                name: "Sub".into(),
                email: Some("sub@x.com".into()),
                phone: None,
                role: Some(ContactRole::SubInvestigator),
            },
            official("STUDY_DIRECTOR", Some("dir@x.com")),
        ];
        let kept = evaluate_all(&contacts, &record(&[]));
        let priorities: Vec<u32> = kept.iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![4, 2]);
    }
}
