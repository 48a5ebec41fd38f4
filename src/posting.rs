//! The posting transaction.
//!
//! Promotes a validated, approved submission into the document corpus:
//! creates or updates the canonical document record, its author list,
//! state, relationship graph and history as one all-or-nothing unit, then
//! promotes files and fires notifications. Failures before the commit
//! point abort everything; failures after it (resources, notifications,
//! the bibliographic artifact) are logged and never roll the corpus back.

use chrono::{Duration, Utc};
use itertools::Itertools;
use std::fs;
use std::path::PathBuf;

use crate::audit::create_submission_event;
use crate::env::Env;
use crate::files;
use crate::models::document::{infer_stream, resolve_doc_name, update_authors};
use crate::models::person::ensure_person_email_info_exists;
use crate::replaces::update_replaces_from_submission;
use crate::store;
use crate::store::models::{
    DocEventKind,
    DocState,
    Document,
    GroupKind,
    IanaReviewState,
    IesgState,
    PersonId,
    RelationshipKind,
    Stream,
    StreamState,
    Submission,
    SubmissionId,
    SubmissionState,
    DocTag,
};
use crate::validate::{ConsistencyError, check_submission_revision_consistency};

/// Everything the post-commit phase needs, captured while the transaction
/// ran.
struct PostOutcome {
    name: String,
    rev: String,
    prev_rev: String,
    submitter_info: String,
    state_change_msg: String,
    replaces_approved: Vec<String>,
    replaces_suggested: Vec<String>,
    resources_differ: bool,
    announce_wg_00: bool,
}

/// Commit a submission as the new canonical revision of its document.
///
/// Preconditions: the submission passed validation and checks, and any
/// required approval has been granted. Holds the document lock for the
/// whole operation; the record side runs as one transaction, file
/// promotion follows it and is safely re-runnable.
pub fn post_submission(
    env: &Env,
    submission_id: SubmissionId,
    approved_doc_desc: &str,
    approved_subm_desc: &str,
    requester: Option<PersonId>,
) -> crate::Result<()> {
    let name = env.store
        .with(|state| state.submission(submission_id).map(|s| s.name.clone()))
        .ok_or_else(|| format_err!("No such submission: {}", submission_id))?;

    let lock = env.store.document_lock(&name);
    let _held = store::hold(&lock);

    let outcome = env.store.transaction(|state| {
        run_posting(env, state, submission_id, approved_doc_desc,
            approved_subm_desc, requester)
    })?;

    // The corpus mutation is durable from here on. File promotion is not
    // part of the transaction; it is idempotent and re-runnable after a
    // crash.
    if outcome.prev_rev != outcome.rev && !outcome.prev_rev.is_empty() {
        files::move_files_to_archive(
            env.config, &outcome.name, &outcome.prev_rev)?;
    }
    let declared = env.store.with(|state| {
        state.submission(submission_id)
            .map(|s| s.file_types.clone())
            .unwrap_or_default()
    });
    files::move_files_to_repository(
        env.config, &outcome.name, &outcome.rev, &declared)?;
    info!("{}: moved files", outcome.name);

    finish_posting(env, submission_id, requester, &outcome);

    info!("{}: done", outcome.name);
    Ok(())
}

fn run_posting(
    env: &Env,
    state: &mut store::State,
    submission_id: SubmissionId,
    approved_doc_desc: &str,
    approved_subm_desc: &str,
    requester: Option<PersonId>,
) -> crate::Result<PostOutcome> {
    let submission = state.submission(submission_id)
        .cloned()
        .ok_or_else(|| format_err!("No such submission: {}", submission_id))?;

    if submission.state == SubmissionState::Posted {
        return Err(ConsistencyError(format!(
            "Submission {}-{} has already been posted",
            submission.name, submission.rev)).into());
    }

    if let Some(msg) = check_submission_revision_consistency(state, &submission) {
        return Err(ConsistencyError(msg).into());
    }

    let name = submission.name.clone();
    let rev = submission.rev.clone();
    info!("{}: start", name);

    // Resolve the submitter, falling back to the system identity.
    let (submitter, submitter_info) = match submission.submitter_parsed() {
        (Some(sname), Some(semail)) => {
            let (person, _) = ensure_person_email_info_exists(
                state, &sname, &semail, &name);
            (person, format!("{} <{}>", sname, semail))
        }
        _ => (env.system(), crate::env::SYSTEM_NAME.to_string()),
    };
    info!("{}: got submitter: {}", name, submitter_info);

    let created = state.document(&name).is_none();
    state.fetch_or_create_document(&name);
    let mut doc = state.document(&name)
        .cloned()
        .ok_or_else(|| format_err!("No document record for {}", name))?;
    info!("{}: {} document record", name,
        if created { "created" } else { "retrieved" });

    let prev_rev = doc.rev.clone();
    let was_rfc = doc.state == DocState::Rfc;

    // Update mutable document fields. An assigned area group is kept when
    // the incoming submission is an individual one.
    doc.title = submission.title.clone();
    let incoming_individual = submission.is_individual(state);
    let doc_group_is_area = doc.group
        .and_then(|id| state.group(id))
        .map_or(false, |g| g.kind == GroupKind::Area);
    if !(incoming_individual && doc_group_is_area) {
        doc.group = submission.group;
    }
    doc.rev = rev.clone();
    doc.pages = submission.pages;
    doc.abstract_text = submission.abstract_text.clone();

    if doc.stream.is_none() {
        let group_kind = doc.group
            .and_then(|id| state.group(id))
            .map(|g| g.kind);
        doc.stream = infer_stream(&name, group_kind, was_rfc);
    }

    doc.expires = Some(Utc::now()
        + Duration::days(env.config.submission.expire_days));
    info!("{}: got document details", name);

    // A first revision retroactively converts the submission's own audit
    // trail into document history.
    if rev == "00" {
        post_rev00_submission_events(state, &submission, submitter);
    }

    let doer = requester.unwrap_or_else(|| env.system());
    state.add_doc_event(
        &name, DocEventKind::NewSubmission, &rev, doer, approved_doc_desc);

    state.add_doc_event(
        &name, DocEventKind::NewRevision, &rev, submitter,
        &format!("New version available: <b>{}-{}.txt</b>", name, rev));
    info!("{}: created doc events", name);

    doc.state = DocState::Active;
    doc.formal_languages = submission.formal_languages.clone();

    // Automatic state transitions.
    let mut state_change_msg = String::new();

    let doc_group_kind = doc.group
        .and_then(|id| state.group(id))
        .map(|g| g.kind);

    if doc.stream == Some(Stream::Ietf)
        && doc_group_kind == Some(GroupKind::WorkingGroup)
        && rev == "00"
    {
        doc.stream_state = Some(StreamState::WgDoc);
    }

    if doc.iana_review_state.map_or(false, |s| s.is_terminal())
        && !doc.iesg_state.map_or(false, |s| s.is_post_approval())
    {
        let prev = doc.iana_review_state
            .map(|s| s.slug())
            .unwrap_or("none");
        doc.iana_review_state = Some(IanaReviewState::Changed);
        state.add_doc_event(
            &name, DocEventKind::StateChanged, &rev, env.system(),
            &format!("IANA review state changed to <b>Changed</b> from \
                <b>{}</b>", prev));
    }

    if !was_rfc && doc.tags.contains(&DocTag::NeedRev) {
        doc.tags.remove(&DocTag::NeedRev);
        let desc = if doc.stream == Some(Stream::Ietf) {
            doc.tags.insert(DocTag::AdFollowup);
            "Sub state has been changed to <b>AD Followup</b> from \
             <b>Revised ID Needed</b>"
        } else {
            "<b>Revised ID Needed</b> tag cleared"
        };
        state.add_doc_event(
            &name, DocEventKind::ChangedDocument, &rev, env.system(), desc);
        state_change_msg = desc.to_string();

        // The cleared tag invalidates the current action holders.
        if !doc.action_holders.is_empty() {
            doc.action_holders.clear();
            state.add_doc_event(
                &name, DocEventKind::ChangedDocument, &rev, env.system(),
                "Removed all action holders");
        }
    }

    if doc.iesg_state.is_none() {
        doc.iesg_state = Some(IesgState::Idexists);
    }
    info!("{}: handled state changes", name);

    state.documents.insert(name.clone(), doc);
    state.ensure_alias(&name, &name);

    update_authors(state, &name, &submission);
    info!("{}: updated state and info", name);

    rebuild_reference_relations(env, state, &name, &rev);

    let replaces = update_replaces_from_submission(
        state, env.authority, env.system(), requester, &submission, &name);
    info!("{}: updated replaces", name);

    let resources_differ = {
        let doc_resources = state.document(&name)
            .map(|d| d.external_resources
                .iter()
                .map(ToString::to_string)
                .sorted()
                .join("\n"))
            .unwrap_or_default();
        let submission_resources = submission.external_resources
            .iter()
            .map(ToString::to_string)
            .sorted()
            .join("\n");
        doc_resources != submission_resources
    };

    let announce_wg_00 = rev == "00"
        && submission.group
            .and_then(|id| state.group(id))
            .map_or(false, |g| g.kind == GroupKind::WorkingGroup);

    {
        let record = state.submission_mut(submission_id)
            .ok_or_else(|| format_err!(
                "No such submission: {}", submission_id))?;
        record.state = SubmissionState::Posted;
        record.draft = Some(name.clone());
    }

    create_submission_event(state, requester, submission_id, approved_subm_desc);
    info!("{}: saved history", name);

    Ok(PostOutcome {
        name,
        rev,
        prev_rev,
        submitter_info,
        state_change_msg,
        replaces_approved: replaces.approved,
        replaces_suggested: replaces.suggested,
        resources_differ,
        announce_wg_00,
    })
}

/// Convert the audit trail of a first-revision submission into document
/// history events, re-labeling the known message patterns for readability.
fn post_rev00_submission_events(
    state: &mut store::State,
    submission: &Submission,
    submitter: PersonId,
) {
    const CONFIRMATION: &str = "sent confirmation email";
    const APPROVAL: &str = "sent approval email";

    let events: Vec<_> = state.submission_events_for(submission.id)
        .into_iter()
        .map(|e| (e.time, e.desc.clone()))
        .collect();

    for (time, desc) in events {
        let desc = if desc.starts_with("Uploaded submission") {
            "Uploaded new revision".to_string()
        } else if desc.starts_with("Submission created") {
            desc
        } else if desc.starts_with("Set submitter to") {
            if let Some(pos) = desc.find(CONFIRMATION) {
                format!("Request for posting confirmation emailed{}",
                    &desc[pos + CONFIRMATION.len()..])
            } else if let Some(pos) = desc.find(APPROVAL) {
                format!("Request for posting approval emailed{}",
                    &desc[pos + APPROVAL.len()..])
            } else {
                desc
            }
        } else {
            continue;
        };

        state.add_doc_event_at(
            &submission.name,
            DocEventKind::NewSubmission,
            &submission.rev,
            submitter,
            &desc,
            time,
        );
    }
}

/// Rebuild the bibliographic reference edges of a document from its
/// rendered artifacts. Trouble here is logged, never fatal.
fn rebuild_reference_relations(
    env: &Env,
    state: &mut store::State,
    name: &str,
    rev: &str,
) {
    let files = files::find_submission_filenames(env.config, name, rev);

    match env.renderer.extract_references(&files) {
        Ok(references) => {
            state.remove_related_of_kind(name, RelationshipKind::References);
            for reference in references {
                if let Some(target) = resolve_doc_name(state, &reference) {
                    state.add_related(
                        name, &target, RelationshipKind::References);
                }
            }
            info!("{}: rebuilt reference relations", name);
        }
        Err(trouble) => {
            warn!("Rebuild of reference relations trouble: {}", trouble);
        }
    }
}

/// Post-commit phase: external resources, announcements and the
/// bibliographic artifact. Everything here is logged on failure.
fn finish_posting(
    env: &Env,
    submission_id: SubmissionId,
    requester: Option<PersonId>,
    outcome: &PostOutcome,
) {
    let (submission, document) = env.store.with(|state| (
        state.submission(submission_id).cloned(),
        state.document(&outcome.name).cloned(),
    ));
    let (submission, document) = match (submission, document) {
        (Some(s), Some(d)) => (s, d),
        _ => {
            error!("{}: posted records disappeared before notification",
                outcome.name);
            return;
        }
    };

    if outcome.resources_differ {
        if env.authority.can_edit_resources(requester, &document) {
            let result = env.store.transaction(|state| {
                let resources = submission.external_resources.clone();
                if let Some(doc) = state.document_mut(&outcome.name) {
                    doc.external_resources = resources;
                }
                state.add_doc_event(
                    &outcome.name, DocEventKind::ChangedDocument,
                    &outcome.rev,
                    requester.unwrap_or_else(|| env.system()),
                    "Changed document external resources from submission");
                Ok(())
            });
            match result {
                Ok(()) => info!("{}: updated external resources", outcome.name),
                Err(err) => error!("{}: could not update external \
                    resources: {}", outcome.name, err),
            }
        } else {
            // No edit authority; degrade to a change-request notification.
            if let Err(err) = env.notifier.send_external_resource_change_request(
                &document, &outcome.submitter_info,
                &submission.external_resources)
            {
                error!("{}: could not send external resource change \
                    request: {}", outcome.name, err);
            } else {
                info!("{}: sent email suggesting external resources",
                    outcome.name);
            }
        }
    }

    if let Err(err) = env.notifier.announce_to_lists(&submission) {
        error!("{}: could not announce to lists: {}", outcome.name, err);
    }
    if outcome.announce_wg_00 {
        if let Err(err) = env.notifier.announce_new_wg_00(&submission) {
            error!("{}: could not announce new wg document: {}",
                outcome.name, err);
        }
    }
    if let Err(err) = env.notifier.announce_new_version(
        &submission, &document, &outcome.state_change_msg)
    {
        error!("{}: could not announce new version: {}", outcome.name, err);
    }
    if let Err(err) = env.notifier.announce_to_authors(&submission) {
        error!("{}: could not announce to authors: {}", outcome.name, err);
    }
    info!("{}: sent announcements", outcome.name);

    if !outcome.replaces_approved.is_empty() {
        if let Err(err) = env.notifier.send_replaces_status_update(
            &document, &outcome.replaces_approved, &outcome.submitter_info)
        {
            error!("{}: could not send replaces status update: {}",
                outcome.name, err);
        }
    }
    if !outcome.replaces_suggested.is_empty() {
        if let Err(err) = env.notifier.send_review_possibly_replaces_request(
            &document, &outcome.submitter_info)
        {
            error!("{}: could not send possibly-replaces review request: {}",
                outcome.name, err);
        }
    }

    if let Err(err) = write_bibxml_artifact(env, &document) {
        error!("{}: could not write bibliographic artifact: {}",
            outcome.name, err);
    }
}

/// Write the permanent bibliographic reference artifact for a revision.
fn write_bibxml_artifact(env: &Env, document: &Document) -> crate::Result<()> {
    let authors = env.store.with(|state| {
        state.authors_of(&document.name)
            .iter()
            .filter_map(|a| state.person(a.person).map(|p| p.name.clone()))
            .collect::<Vec<_>>()
    });

    let path = bibxml_path(env, &document.name, &document.rev);
    fs::write(&path, bibxml_for_draft(document, &authors))?;
    Ok(())
}

pub fn bibxml_path(env: &Env, name: &str, rev: &str) -> PathBuf {
    env.config.paths.bibxml
        .join(format!("reference.I-D.{}-{}.xml", name, rev))
}

fn bibxml_for_draft(document: &Document, authors: &[String]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version='1.0' encoding='UTF-8'?>\n");
    xml.push_str(&format!("<reference anchor='I-D.{}'>\n", document.name));
    xml.push_str("<front>\n");
    xml.push_str(&format!("<title>{}</title>\n",
        xml_escape(&document.title)));
    for author in authors {
        xml.push_str(&format!("<author fullname='{}'/>\n",
            xml_escape(author)));
    }
    if !document.abstract_text.is_empty() {
        xml.push_str(&format!("<abstract><t>{}</t></abstract>\n",
            xml_escape(&document.abstract_text)));
    }
    xml.push_str("</front>\n");
    xml.push_str(&format!(
        "<seriesInfo name='Internet-Draft' value='{}-{}'/>\n",
        document.name, document.rev));
    xml.push_str("</reference>\n");
    xml
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bibxml_escapes_markup() {
        let mut doc = Document::new("draft-example-foo");
        doc.rev = "00".to_string();
        doc.title = "A <B> & C".to_string();
        let xml = bibxml_for_draft(&doc, &["Jane Doe".to_string()]);
        assert!(xml.contains("A &lt;B&gt; &amp; C"));
        assert!(xml.contains("value='draft-example-foo-00'"));
    }
}
