//! Submission validation.
//!
//! Pure checks (aside from reading corpus state and the archive directory)
//! returning a field → error message mapping; an empty mapping means the
//! submission is valid. Author email problems are accumulated per author
//! rather than short-circuited.

use chrono::NaiveDate;
use itertools::Itertools;
use regex::Regex;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::files;
use crate::store::State;
use crate::store::models::{RelationshipKind, Submission, SubmissionState};

lazy_static! {
    static ref NAME_RE: Regex =
        Regex::new(r"^draft-[a-z][-a-z0-9]{0,43}(-\d\d)?$").unwrap();
    static ref TRAILING_REV_RE: Regex = Regex::new(r"-\d\d$").unwrap();
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// A corpus invariant has been violated. Always fatal to the submission and
/// flagged for operator attention; never silently retried.
#[derive(Debug, Fail)]
#[fail(display = "{}", _0)]
pub struct ConsistencyError(pub String);

pub fn is_valid_email(addr: &str) -> bool {
    EMAIL_RE.is_match(addr)
}

/// Run the full validation pipeline over a submission.
pub fn validate_submission(
    state: &State,
    config: &Config,
    submission: &Submission,
) -> BTreeMap<&'static str, String> {
    let mut errors = BTreeMap::new();

    if submission.state != SubmissionState::Cancel
        && submission.state != SubmissionState::Posted
    {
        for ext in &submission.file_types {
            let source = files::staging_path(
                config, &submission.name, &submission.rev, ext);
            if !source.exists() {
                let basename = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                errors.insert("files", format!(
                    "\"{}\" was not found in the staging area. We recommend \
                     you that you cancel this submission and upload your \
                     files again.", basename));
                break;
            }
        }
    }

    if let Some(error) = validate_submission_name(&submission.name) {
        errors.insert("name", error);
    }

    if submission.title.is_empty() {
        errors.insert("title", "Title is empty or was not found".to_string());
    }

    if let Some(group) = submission.group.and_then(|id| state.group(id)) {
        if !group.is_active() {
            errors.insert("group",
                "Group exists but is not an active group".to_string());
        }
    }

    if submission.abstract_text.is_empty() {
        errors.insert("abstract",
            "Abstract is empty or was not found".to_string());
    }

    if submission.authors.is_empty() {
        errors.insert("authors", "No authors found".to_string());
    }

    if submission.state != SubmissionState::Posted {
        if let Some(error) = validate_submission_rev(
            state, config, &submission.name, &submission.rev)
        {
            errors.insert("rev", error);
        }
    }

    if let Some(error) = validate_submission_document_date(
        submission.submission_date, submission.document_date)
    {
        errors.insert("document_date", error);
    }

    let (author_errors, error_count) = validate_author_emails(submission);
    if error_count > 0 {
        errors.insert("authors", if error_count == 1 {
            "Author email error (see below)".to_string()
        } else {
            "Author email errors (see below)".to_string()
        });
        debug!("author email errors for {}: {:?}",
            submission.name, author_errors);
    }

    errors
}

/// Check name syntax: `draft-` prefix, lowercase ASCII letters, digits and
/// hyphens, at least three components, at most 50 characters.
pub fn validate_submission_name(name: &str) -> Option<String> {
    if !NAME_RE.is_match(name) {
        let stripped = if TRAILING_REV_RE.is_match(name) {
            &name[..name.len() - 3]
        } else {
            name
        };

        if stripped.len() > 50 {
            return Some(format!(
                "Expected the draft name to be at most 50 ascii characters \
                 long; found {}.", stripped.len()));
        }

        let mut msg = format!(
            "Expected name 'draft-...' using lowercase ascii letters, \
             digits, and hyphen; found '{}'.", stripped);
        if stripped.contains('.') {
            msg.push_str("  Did you include a filename extension in the \
                name by mistake?");
        }
        return Some(msg);
    }

    let components: Vec<&str> = name.split('-').collect();
    if components.iter().any(|c| c.is_empty()) {
        return Some("Name contains adjacent dashes or the name ends with \
            a dash.".to_string());
    }
    if components.len() < 3 {
        return Some("Name has less than three dash-delimited components \
            in the name.".to_string());
    }

    None
}

/// Check revision syntax and sequencing: exactly two digits, one more than
/// the highest posted revision (or `00` for a new name), no collision with
/// files already in the repository or archive, and the document must not
/// have been superseded.
pub fn validate_submission_rev(
    state: &State,
    config: &Config,
    name: &str,
    rev: &str,
) -> Option<String> {
    if rev.is_empty() {
        return Some("Revision not found".to_string());
    }

    if rev.len() != 2 {
        return Some("Revision must be exactly two digits".to_string());
    }

    let rev_num: u32 = match rev.parse() {
        Ok(n) => n,
        Err(_) => return Some("Revision must be a number".to_string()),
    };

    if rev_num > 99 {
        return Some("Revision must be between 00 and 99".to_string());
    }

    let expected = state.document(name)
        .and_then(|doc| doc.rev.parse::<u32>().ok())
        .map(|highest| highest + 1)
        .unwrap_or(0);

    if rev_num != expected {
        return Some(format!(
            "Invalid revision (revision {:02} is expected)", expected));
    }

    let existing = files::existing_archived_files(config, name, rev);
    if !existing.is_empty() {
        let plural = if existing.len() == 1 { "" } else { "s" };
        return Some(format!(
            "Unexpected file{} already in the archive: {}",
            plural, existing.iter().join(", ")));
    }

    if let Some(replaced_by) = has_been_replaced_by(state, name) {
        return Some(format!(
            "This document has been replaced by {}", replaced_by.join(",")));
    }

    None
}

/// Names of documents that replace `name`, if any.
pub fn has_been_replaced_by(state: &State, name: &str) -> Option<Vec<String>> {
    if state.document(name).is_none() {
        return None;
    }

    let sources = state.related_that(RelationshipKind::Replaces, name);
    if sources.is_empty() {
        None
    } else {
        Some(sources)
    }
}

/// The date written inside the document must be present and within three
/// days of the submission timestamp.
pub fn validate_submission_document_date(
    submission_date: NaiveDate,
    document_date: Option<NaiveDate>,
) -> Option<String> {
    match document_date {
        None => Some("Document date is empty or not in a proper \
            format".to_string()),
        Some(date) => {
            let days = (submission_date - date).num_days().abs();
            if days > 3 {
                Some("Document date must be within 3 days of submission \
                    date".to_string())
            } else {
                None
            }
        }
    }
}

/// Accumulate email errors per author. Returns one error list per author in
/// submission order, plus the total error count. Every author sharing a
/// duplicated address is flagged, not just later occurrences.
pub fn validate_author_emails(submission: &Submission)
-> (Vec<Vec<String>>, usize) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for author in &submission.authors {
        if !author.email.is_empty() {
            *counts.entry(author.email.as_str()).or_insert(0) += 1;
        }
    }

    let mut all = Vec::with_capacity(submission.authors.len());
    let mut count = 0;

    for author in &submission.authors {
        let mut errors = Vec::new();
        let email = author.email.as_str();

        if email.is_empty() {
            errors.push("Found no email address.  A valid email address \
                is required.".to_string());
        } else {
            if !is_valid_email(email) {
                errors.push("Invalid email address. A valid email address \
                    is required.".to_string());
            }
            if counts.get(email).cloned().unwrap_or(0) > 1 {
                errors.push("Duplicate email address.  A unique email \
                    address is required.".to_string());
            }
        }

        count += errors.len();
        all.push(errors);
    }

    (all, count)
}

/// Detect a posted submission for the same name with a revision greater
/// than or equal to this one. Never expected under correct operation; the
/// caller must abort loudly rather than proceed.
pub fn check_submission_revision_consistency(
    state: &State,
    submission: &Submission,
) -> Option<String> {
    let conflicts = state.posted_conflicts(
        &submission.name, &submission.rev, submission.id);
    if conflicts.is_empty() {
        return None;
    }

    Some(format!(
        "Rev {} conflicts with existing {} ({}). This indicates a database \
         inconsistency that requires investigation.",
        submission.rev,
        if conflicts.len() == 1 { "submission" } else { "submissions" },
        conflicts.iter().join(", "),
    ))
}
