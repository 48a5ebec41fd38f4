//! Supersession ("replaces") graph resolution.
//!
//! A submission's claimed replaces targets are classified into approved
//! and merely-suggested relationships based on the requester's authority.
//! Approved edges merge into the existing set, which only ever grows;
//! suggestions become `possibly-replaces` edges awaiting human review.

use itertools::Itertools;

use crate::authz::Authority;
use crate::models::document::resolve_doc_name;
use crate::store::State;
use crate::store::models::{
    DocEventKind,
    GroupKind,
    PersonId,
    RelationshipKind,
    Submission,
};

#[derive(Debug, Default)]
pub struct ReplacesOutcome {
    /// Targets committed as confirmed supersessions.
    pub approved: Vec<String>,
    /// Targets recorded as suggestions awaiting review.
    pub suggested: Vec<String>,
}

/// Resolve the claimed replaces targets of a submission against the
/// document it was posted as.
///
/// Must run inside the posting transaction; the document's group is
/// expected to reflect the submission already.
pub fn update_replaces_from_submission(
    state: &mut State,
    authority: &dyn Authority,
    system: PersonId,
    requester: Option<PersonId>,
    submission: &Submission,
    doc_name: &str,
) -> ReplacesOutcome {
    let mut outcome = ReplacesOutcome::default();

    if submission.replaces.is_empty() {
        return outcome;
    }

    let is_secretariat = requester
        .map_or(false, |p| authority.holds_approval_role(p));
    let draft_group = state.document(doc_name).and_then(|doc| doc.group);

    let existing_replaces =
        state.related_that_doc(RelationshipKind::Replaces, doc_name);
    let existing_suggested =
        state.related_that_doc(RelationshipKind::PossiblyReplaces, doc_name);

    let submitter_email = submission.submitter_parsed().1;

    for claimed in submission.replaces_names() {
        let target = match resolve_doc_name(state, &claimed) {
            Some(target) => target,
            None => continue,
        };

        if target == doc_name
            || existing_replaces.contains(&target)
            || outcome.approved.contains(&target)
            || outcome.suggested.contains(&target)
        {
            continue;
        }

        let target_group = state.document(&target).and_then(|doc| doc.group);
        let target_is_individual = match target_group {
            None => true,
            Some(id) => state.group(id)
                .map_or(true, |g| g.kind == GroupKind::Individual),
        };

        let chair_reach = requester.map_or(false, |p| {
            draft_group.map_or(false, |g| authority.is_chair(p, g))
                && (target_is_individual
                    || target_group.map_or(false, |g| authority.is_chair(p, g)))
        });

        let author_of_target = submitter_email.as_ref().map_or(false, |email| {
            state.authors_of(&target)
                .iter()
                .any(|a| a.email.eq_ignore_ascii_case(email))
        });

        if is_secretariat || chair_reach || author_of_target {
            outcome.approved.push(target);
        } else if !existing_suggested.contains(&target) {
            outcome.suggested.push(target);
        }
    }

    let by = requester.unwrap_or(system);
    let rev = submission.rev.clone();

    if !outcome.approved.is_empty() {
        for target in &outcome.approved {
            state.add_related(doc_name, target, RelationshipKind::Replaces);
        }

        let full_set = state
            .related_that_doc(RelationshipKind::Replaces, doc_name)
            .into_iter()
            .sorted()
            .join(", ");
        state.add_doc_event(
            doc_name,
            DocEventKind::ChangedDocument,
            &rev,
            by,
            &format!("This document now replaces {}", full_set),
        );
    }

    if !outcome.suggested.is_empty() {
        for target in &outcome.suggested {
            state.add_related(
                doc_name, target, RelationshipKind::PossiblyReplaces);
        }

        state.add_doc_event(
            doc_name,
            DocEventKind::AddedSuggestedReplaces,
            &rev,
            by,
            &format!(
                "Added suggested replacement relationships: {}",
                outcome.suggested.iter().join(", "),
            ),
        );
    }

    outcome
}
