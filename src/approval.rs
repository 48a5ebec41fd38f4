//! Approval routing.
//!
//! Decides, from a validated submission and the document's history, which
//! approval path applies, issues the corresponding request, and records the
//! decision. The precedence is fixed: area-director approval wins over
//! group approval, which wins over direct posting, which wins over
//! confirmation by (previous) authors.

use itertools::Itertools;
use std::collections::BTreeSet;

use crate::audit::{create_submission_event, docevent_from_submission};
use crate::env::Env;
use crate::models::document::resolve_doc_name;
use crate::models::person::get_person_from_name_email;
use crate::notify::Approver;
use crate::posting::post_submission;
use crate::store::models::{
    PersonId,
    Submission,
    SubmissionId,
    SubmissionState,
};
use crate::utils::generate_random_key;

/// Does acceptance require approval of the previous revision's authors?
pub fn requires_prev_auth_approval(env: &Env, submission: &Submission) -> bool {
    env.store.with(|state| state.document(&submission.name).is_some())
}

/// Does acceptance require group approval?
///
/// Only first revisions submitted to a group that demands approval need
/// it, and a standing preapproval waives the requirement.
pub fn requires_group_approval(env: &Env, submission: &Submission) -> bool {
    submission.rev == "00"
        && env.store.with(|state| {
            submission.group
                .and_then(|id| state.group(id))
                .map_or(false, |g| g.requires_approval)
                && !state.preapproved(&submission.name)
        })
}

/// Accept a submission: post it directly or park it in the correct state
/// to await approval.
///
/// `requester` is the authenticated person driving the request, if any.
/// With `autopost`, a requester who is an author of the prior revision (or
/// of this submission, for a first revision) skips all approval states.
/// Returns the recipients of whatever notification was sent.
pub fn accept_submission(
    env: &Env,
    submission_id: SubmissionId,
    requester: Option<PersonId>,
    autopost: bool,
) -> crate::Result<Vec<String>> {
    let submission = env.store
        .with(|state| state.submission(submission_id).cloned())
        .ok_or_else(|| format_err!("No such submission: {}", submission_id))?;

    let requester_is_author = env.store.with(|state| {
        let authors: BTreeSet<Option<PersonId>> = if submission.rev != "00" {
            state.authors_of(&submission.name)
                .iter()
                .map(|a| Some(a.person))
                .collect()
        } else {
            submission.authors
                .iter()
                .map(|a| get_person_from_name_email(state, &a.name, &a.email))
                .collect()
        };
        requester.map_or(false, |r| authors.contains(&Some(r)))
    });

    // The upload itself goes on the document's history; attributed to the
    // requester only when they are a known author.
    env.store.transaction(|state| {
        docevent_from_submission(
            state,
            env.system(),
            &submission,
            "Uploaded new revision",
            if requester_is_author { requester } else { None },
        );
        Ok(())
    })?;

    let pretty_replaces = env.store.with(|state| {
        let resolved = submission.replaces_names()
            .into_iter()
            .filter_map(|name| resolve_doc_name(state, &name))
            .collect::<Vec<_>>();
        if resolved.is_empty() {
            "(none)".to_string()
        } else {
            resolved.iter().join(", ")
        }
    });

    let requires_prev_authors_approval =
        requires_prev_auth_approval(env, &submission);
    let needs_group_approval = requires_group_approval(env, &submission);

    let (revises_wg, group_inactive, is_individual, active_replaced,
        closed_replaced) = env.store.with(|state| (
            submission.revises_wg_draft(state),
            submission.group
                .and_then(|id| state.group(id))
                .map_or(false, |g| !g.is_active()),
            submission.is_individual(state),
            submission.active_wg_drafts_replaced(state),
            submission.closed_wg_drafts_replaced(state),
        ));

    let requires_ad_approval = revises_wg && group_inactive;
    let requires_prev_group_approval =
        is_individual && !active_replaced.is_empty();
    let requires_prev_ad_approval =
        is_individual && !closed_replaced.is_empty();

    let mut sub_event_desc = format!(
        "Set submitter to \"{}\", replaces to {}",
        submission.submitter, pretty_replaces);
    let mut create_event = true;
    let mut docevent_desc = None;
    let mut address_list = Vec::new();

    if requires_ad_approval || requires_prev_ad_approval {
        set_state(env, submission_id, SubmissionState::AdAppr)?;

        address_list = notify_approval_request(
            env, &submission, Approver::AreaDirectors,
            closed_replaced.first().map(String::as_str));
        let sent_to = address_list.iter().join(", ");
        sub_event_desc.push_str(
            &format!(" and sent approval email to AD: {}", sent_to));
        docevent_desc = Some(format!(
            "Request for posting approval emailed to AD: {}", sent_to));
    } else if needs_group_approval || requires_prev_group_approval {
        set_state(env, submission_id, SubmissionState::GrpAppr)?;

        address_list = notify_approval_request(
            env, &submission, Approver::GroupChairs,
            active_replaced.first().map(String::as_str));
        let sent_to = address_list.iter().join(", ");
        sub_event_desc.push_str(
            &format!(" and sent approval email to group chairs: {}", sent_to));
        docevent_desc = Some(format!(
            "Request for posting approval emailed to group chairs: {}",
            sent_to));
    } else if requester_is_author && autopost {
        // Go directly to posting.
        let requester_name = env.store.with(|state| {
            requester
                .and_then(|id| state.person(id).map(|p| p.name.clone()))
                .unwrap_or_default()
        });
        sub_event_desc = format!(
            "New version accepted (logged-in submitter: {})", requester_name);
        post_submission(
            env, submission_id, &sub_event_desc, &sub_event_desc, requester)?;
        create_event = false;
    } else {
        let auth_key = generate_random_key();
        let next_state = if requires_prev_authors_approval {
            SubmissionState::AutAppr
        } else {
            SubmissionState::Auth
        };
        env.store.transaction(|state| {
            let record = state.submission_mut(submission_id)
                .ok_or_else(|| format_err!(
                    "No such submission: {}", submission_id))?;
            record.auth_key = Some(auth_key.clone());
            record.state = next_state;
            Ok(())
        })?;

        let group_authors_changed = env.store.with(|state| {
            match state.document(&submission.name) {
                Some(doc) if doc.group.is_some() => {
                    let old: BTreeSet<Option<PersonId>> =
                        state.authors_of(&submission.name)
                            .iter()
                            .map(|a| Some(a.person))
                            .collect();
                    let new: BTreeSet<Option<PersonId>> = submission.authors
                        .iter()
                        .map(|a| get_person_from_name_email(
                            state, &a.name, &a.email))
                        .collect();
                    old != new
                }
                _ => false,
            }
        });

        address_list = match env.notifier
            .send_submission_confirmation(&submission, group_authors_changed)
        {
            Ok(list) => list,
            Err(err) => {
                error!("Could not send submission confirmation for {}: {}",
                    submission.name, err);
                Vec::new()
            }
        };
        let sent_to = address_list.iter().join(", ");
        if next_state == SubmissionState::AutAppr {
            sub_event_desc.push_str(&format!(
                " and sent confirmation email to previous authors: {}",
                sent_to));
            docevent_desc = Some(format!(
                "Request for posting confirmation emailed to previous \
                 authors: {}", sent_to));
        } else {
            sub_event_desc.push_str(&format!(
                " and sent confirmation email to submitter and authors: {}",
                sent_to));
            docevent_desc = Some(format!(
                "Request for posting confirmation emailed to submitter \
                 and authors: {}", sent_to));
        }
    }

    env.store.transaction(|state| {
        if create_event {
            create_submission_event(
                state, requester, submission_id, &sub_event_desc);
        }
        if let Some(desc) = docevent_desc.as_ref() {
            docevent_from_submission(
                state, env.system(), &submission, desc, Some(env.system()));
        }
        Ok(())
    })?;

    Ok(address_list)
}

fn set_state(
    env: &Env,
    submission_id: SubmissionId,
    next: SubmissionState,
) -> crate::Result<()> {
    env.store.transaction(|state| {
        let record = state.submission_mut(submission_id)
            .ok_or_else(|| format_err!(
                "No such submission: {}", submission_id))?;
        record.state = next;
        Ok(())
    })
}

fn notify_approval_request(
    env: &Env,
    submission: &Submission,
    approver: Approver,
    replaced_document: Option<&str>,
) -> Vec<String> {
    match env.notifier
        .send_approval_request(submission, approver, replaced_document)
    {
        Ok(list) => list,
        Err(err) => {
            error!("Could not send approval request for {}: {}",
                submission.name, err);
            Vec::new()
        }
    }
}
