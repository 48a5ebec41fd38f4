//! Submission-side helpers and lifecycle operations.

use chrono::{Duration, Utc};

use crate::audit::{Actor, create_submission_event};
use crate::config::Config;
use crate::files::remove_submission_files;
use crate::models::document::resolve_doc_name;
use crate::store::{State, Store};
use crate::store::models::{
    Document,
    ExtResource,
    GroupKind,
    Submission,
    SubmissionId,
    SubmissionState,
};

impl Submission {
    /// Split the submitter mailbox line into name and address parts.
    pub fn submitter_parsed(&self) -> (Option<String>, Option<String>) {
        crate::utils::parse_mailbox(&self.submitter)
    }

    /// Claimed replaces target names, split out of the comma-joined field.
    pub fn replaces_names(&self) -> Vec<String> {
        self.replaces
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The canonical document this submission revises, if one exists.
    pub fn existing_document<'a>(&self, state: &'a State) -> Option<&'a Document> {
        state.document(&self.name)
    }

    /// Whether this is an individual submission (no group, or the generic
    /// individual-submission group).
    pub fn is_individual(&self, state: &State) -> bool {
        match self.group {
            None => true,
            Some(id) => state
                .group(id)
                .map_or(true, |g| g.kind == GroupKind::Individual),
        }
    }

    /// Whether this submission is a new revision of an existing
    /// working-group document.
    pub fn revises_wg_draft(&self, state: &State) -> bool {
        self.existing_document(state).map_or(false, |doc| {
            doc.group
                .and_then(|id| state.group(id))
                .map_or(false, |g| g.kind == GroupKind::WorkingGroup)
        })
    }

    /// Claimed replaces targets owned by a working group in the given
    /// state of activity.
    fn wg_drafts_replaced(&self, state: &State, active: bool) -> Vec<String> {
        self.replaces_names()
            .into_iter()
            .filter_map(|name| resolve_doc_name(state, &name))
            .filter(|name| {
                state.document(name)
                    .and_then(|doc| doc.group)
                    .and_then(|id| state.group(id))
                    .map_or(false, |g| {
                        g.kind == GroupKind::WorkingGroup
                            && g.is_active() == active
                    })
            })
            .collect()
    }

    pub fn active_wg_drafts_replaced(&self, state: &State) -> Vec<String> {
        self.wg_drafts_replaced(state, true)
    }

    pub fn closed_wg_drafts_replaced(&self, state: &State) -> Vec<String> {
        self.wg_drafts_replaced(state, false)
    }
}

/// Cancel a submission and clean up its staged files. Terminal; the corpus
/// is left exactly as before the submission existed.
pub fn cancel_submission(
    store: &Store,
    config: &Config,
    id: SubmissionId,
) -> crate::Result<()> {
    let (name, rev, file_types) = store.transaction(|state| {
        let submission = state.submission_mut(id)
            .ok_or_else(|| format_err!("No such submission: {}", id))?;
        if submission.state == SubmissionState::Posted {
            return Err(format_err!(
                "Submission {}-{} is already posted and can no longer be \
                 cancelled", submission.name, submission.rev));
        }
        submission.state = SubmissionState::Cancel;
        Ok((
            submission.name.clone(),
            submission.rev.clone(),
            submission.file_types.clone(),
        ))
    })?;

    remove_submission_files(config, &name, &rev, &file_types)?;
    Ok(())
}

/// Submissions older than the cutoff which are still in a non-terminal
/// state, and are therefore subject to administrative expiry.
pub fn expirable_submissions(state: &State, older_than_days: i64) -> Vec<SubmissionId> {
    let cutoff = Utc::now().naive_utc().date() - Duration::days(older_than_days);
    state.submissions
        .values()
        .filter(|s| !s.state.is_terminal() && s.submission_date < cutoff)
        .map(|s| s.id)
        .collect()
}

/// Administratively expire a stale submission.
pub fn expire_submission(
    store: &Store,
    config: &Config,
    id: SubmissionId,
    by: Actor,
) -> crate::Result<()> {
    cancel_submission(store, config, id)?;
    store.transaction(|state| {
        create_submission_event(
            state, by.person_id(), id, "Cancelled expired submission");
        Ok(())
    })
}

/// Carry the previous revision's external resources over to a submission.
///
/// Leaves the submission untouched when no previous revision exists.
pub fn set_extresources_from_existing_draft(state: &mut State, id: SubmissionId) {
    let resources: Option<Vec<ExtResource>> = state
        .submission(id)
        .and_then(|s| state.document(&s.name))
        .map(|doc| doc.external_resources.clone());

    if let (Some(resources), Some(submission)) =
        (resources, state.submission_mut(id))
    {
        submission.external_resources = resources;
    }
}
