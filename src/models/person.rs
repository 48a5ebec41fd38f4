//! Identity resolution.
//!
//! Maps the (name, address) pairs found on submissions to durable person
//! and address records, deduplicating by verified address first and display
//! name second. Resolution never merges two existing persons, and never
//! rebinds an address that already belongs to someone.

use chrono::Utc;
use deunicode::deunicode;

use crate::store::State;
use crate::store::models::{EmailAddress, PersonId};
use crate::validate::is_valid_email;

/// Find the person a (name, address) pair refers to.
///
/// A case-insensitive address match wins when it is unambiguous (exactly
/// one owner). Otherwise the display name is matched exactly against known
/// names, over the address candidates if there were any and over all
/// persons if not. Returns `None` when nothing matches.
pub fn get_person_from_name_email(
    state: &State,
    name: &str,
    email: &str,
) -> Option<PersonId> {
    let candidates = if !email.is_empty()
        && (email.starts_with("unknown-email-") || is_valid_email(email))
    {
        let matched = state.persons_with_address(email);
        if matched.len() == 1 {
            return Some(matched[0]);
        }
        matched
    } else {
        Vec::new()
    };

    let pool: Vec<PersonId> = if candidates.is_empty() {
        state.persons.keys().cloned().collect()
    } else {
        candidates
    };

    pool.into_iter().find(|&id| {
        state.person(id).map_or(false, |p| {
            p.name == name
                || p.name_from_draft.as_ref().map(String::as_str) == Some(name)
        })
    })
}

/// Resolve a (name, address) pair, creating records as needed.
///
/// Ensures a person exists (creating one with an ASCII-transliterated name
/// when resolution fails) and that the address is bound to them, annotated
/// with the document it was seen on. An address owned by a different person
/// is never claimed; only an ownerless record may be bound.
pub fn ensure_person_email_info_exists(
    state: &mut State,
    name: &str,
    email: &str,
    docname: &str,
) -> (PersonId, String) {
    let addr = email.to_lowercase();

    let person = match get_person_from_name_email(state, name, email) {
        Some(id) => {
            if let Some(p) = state.person_mut(id) {
                p.name_from_draft = Some(name.to_string());
            }
            id
        }
        None => {
            let ascii = deunicode(name);
            let id = state.create_person(name, &ascii);
            if let Some(p) = state.person_mut(id) {
                p.name_from_draft = Some(name.to_string());
            }
            id
        }
    };

    let origin = format!("author: {}", docname);

    enum Binding {
        Owned,
        Ownerless,
        Foreign,
        Missing,
    }

    let binding = match state.email(&addr) {
        Some(record) if record.person == Some(person) => Binding::Owned,
        Some(record) if record.person.is_none() => Binding::Ownerless,
        Some(_) => Binding::Foreign,
        None => Binding::Missing,
    };

    match binding {
        Binding::Owned => {
            // Already bound to this person; refresh the origin annotation.
            if let Some(record) = state.email_mut(&addr) {
                record.origin = origin;
            }
        }
        Binding::Ownerless => {
            // An ownerless record may be claimed.
            if let Some(record) = state.email_mut(&addr) {
                record.person = Some(person);
                record.origin = origin;
                if record.time.is_none() {
                    record.time = Some(Utc::now());
                }
            }
        }
        Binding::Foreign => {
            // Owned by someone else. Resolution above would have returned
            // that person for an unambiguous address, so this pair matched
            // by name; leave the foreign binding untouched.
        }
        Binding::Missing => {
            state.insert_email(EmailAddress {
                address: addr.clone(),
                person: Some(person),
                origin,
                time: Some(Utc::now()),
                active: true,
            });
        }
    }

    (person, addr)
}
