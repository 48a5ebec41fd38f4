//! Append-only audit helpers.
//!
//! Every pipeline transition records who did what, as immutable description
//! strings attached to the submission and, where one exists, the document.
//! Entries are only ever appended, never rewritten.

use crate::models::person::ensure_person_email_info_exists;
use crate::store::State;
use crate::store::models::{DocEventKind, PersonId, Submission, SubmissionId};

/// Entity responsible for an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    /// Used for actions carried out automatically by the system.
    System,
    Person(PersonId),
}

impl Actor {
    pub fn person_id(&self) -> Option<PersonId> {
        match *self {
            Actor::System => None,
            Actor::Person(id) => Some(id),
        }
    }
}

impl From<PersonId> for Actor {
    fn from(id: PersonId) -> Self {
        Actor::Person(id)
    }
}

/// Record an event on a submission's history.
pub fn create_submission_event(
    state: &mut State,
    by: Option<PersonId>,
    submission: SubmissionId,
    desc: &str,
) {
    state.add_submission_event(submission, by, desc);
}

/// Record an event on the history of the document a submission targets.
///
/// Returns `None` when no document exists yet for the submission's name
/// (a first revision; its history is backfilled at posting time). When
/// `who` is not given, the event is attributed to the submitter, falling
/// back to the system identity when the submitter line cannot be resolved.
pub fn docevent_from_submission(
    state: &mut State,
    system: PersonId,
    submission: &Submission,
    desc: &str,
    who: Option<PersonId>,
) -> Option<i32> {
    if state.document(&submission.name).is_none() {
        return None;
    }

    let by = match who {
        Some(person) => person,
        None => {
            let (name, email) = crate::utils::parse_mailbox(&submission.submitter);
            match (name, email) {
                (Some(name), Some(email)) => {
                    let (person, _) = ensure_person_email_info_exists(
                        state, &name, &email, &submission.name);
                    person
                }
                _ => system,
            }
        }
    };

    Some(state.add_doc_event(
        &submission.name,
        DocEventKind::NewSubmission,
        &submission.rev,
        by,
        desc,
    ))
}
