//! Top-level submission processing.
//!
//! Runs a freshly uploaded submission through validation, rendering and the
//! content checkers, then hands it over in the `Uploaded` state. Any
//! failure cancels the submission and cleans up its staged files; an
//! unexpected error is caught at this boundary only, logged with full
//! detail, and surfaced as a generic cancellation message.

use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;

use crate::audit::create_submission_event;
use crate::checks::{apply_checkers, failed_check_messages};
use crate::env::Env;
use crate::files::find_submission_filenames;
use crate::models::submission::{
    cancel_submission,
    set_extresources_from_existing_draft,
};
use crate::render::RenderError;
use crate::store::models::{Submission, SubmissionId, SubmissionState};
use crate::validate::{
    ConsistencyError,
    check_submission_revision_consistency,
    validate_submission,
};

#[derive(Debug)]
pub enum ProcessError {
    /// User-fixable problems, surfaced per field.
    Validation(BTreeMap<&'static str, String>),
    /// The uploaded format cannot be processed.
    Unsupported,
    /// One or more content checkers rejected the submission.
    Checks(Vec<String>),
}

impl failure::Fail for ProcessError {
}

impl fmt::Display for ProcessError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessError::Validation(errors) => {
                let detail = errors
                    .iter()
                    .map(|(field, message)| format!("{}: {}", field, message))
                    .join("; ");
                write!(fmt, "Validation failed: {}", detail)
            }
            ProcessError::Unsupported => {
                write!(fmt, "Only XML draft submissions can be processed.")
            }
            ProcessError::Checks(messages) => {
                write!(fmt, "Checks failed: {}", messages.iter().join(" / "))
            }
        }
    }
}

/// Process a submission sitting in the `Validating` state.
///
/// On success the submission moves to `Uploaded`; on any failure it is
/// cancelled with a message describing why. Errors never propagate past
/// this function.
pub fn process_uploaded_submission(env: &Env, submission_id: SubmissionId) {
    let submission = match env.store
        .with(|state| state.submission(submission_id).cloned())
    {
        Some(submission) => submission,
        None => {
            error!("Submission {} does not exist, skipping.", submission_id);
            return;
        }
    };

    if submission.state != SubmissionState::Validating {
        info!("Submission {} is not in \"validating\" state, skipping.",
            submission_id);
        return;
    }

    match run_pipeline(env, &submission) {
        Ok(()) => {
            let result = env.store.transaction(|state| {
                let record = state.submission_mut(submission_id)
                    .ok_or_else(|| format_err!(
                        "No such submission: {}", submission_id))?;
                record.state = SubmissionState::Uploaded;
                create_submission_event(
                    state, None, submission_id,
                    "Completed submission validation checks");
                Ok(())
            });
            if let Err(err) = result {
                error!("Could not record validation success for {}: {}",
                    submission.name, err);
            }
        }
        Err(err) => {
            let message = cancellation_message(&submission, &err);
            abort_submission(env, submission_id, &message);
        }
    }
}

fn run_pipeline(env: &Env, submission: &Submission) -> crate::Result<()> {
    if submission.file_types != ["xml"] {
        return Err(ProcessError::Unsupported.into());
    }

    let errors = env.store.with(|state| {
        validate_submission(state, env.config, submission)
    });
    if !errors.is_empty() {
        return Err(ProcessError::Validation(errors).into());
    }

    if let Some(detail) = env.store.with(|state| {
        check_submission_revision_consistency(state, submission)
    }) {
        return Err(ConsistencyError(detail).into());
    }

    env.renderer.render_missing_formats(submission, env.config)?;

    env.store.transaction(|state| {
        set_extresources_from_existing_draft(state, submission.id);
        Ok(())
    })?;

    let files = find_submission_filenames(
        env.config, &submission.name, &submission.rev);
    apply_checkers(env.store, env.checkers, submission, &files)?;

    let failed = failed_check_messages(env.store, submission.id);
    if !failed.is_empty() {
        return Err(ProcessError::Checks(failed).into());
    }

    Ok(())
}

/// Map an error to the message attached to the cancellation. Anything
/// outside the known taxonomy is logged in full and replaced by a generic
/// message.
fn cancellation_message(submission: &Submission, err: &failure::Error) -> String {
    if let Some(process) = err.downcast_ref::<ProcessError>() {
        return process.to_string();
    }
    if let Some(render) = err.downcast_ref::<RenderError>() {
        return render.to_string();
    }
    if let Some(inconsistency) = err.downcast_ref::<ConsistencyError>() {
        error!("Revision inconsistency for {}: {}", submission.name,
            inconsistency);
        return "Document revision inconsistency error in the database. \
            Please contact the secretariat for assistance.".to_string();
    }

    error!("Unexpected error while processing submission {}: {}\n{}",
        submission.id, err, err.backtrace());
    "A system error occurred while processing the submission.".to_string()
}

fn abort_submission(env: &Env, submission_id: SubmissionId, message: &str) {
    if let Err(err) = cancel_submission(env.store, env.config, submission_id) {
        error!("Could not cancel submission {}: {}", submission_id, err);
        return;
    }

    let result = env.store.transaction(|state| {
        create_submission_event(
            state, None, submission_id,
            &format!("Submission rejected: {}", message));
        Ok(())
    });
    if let Err(err) = result {
        error!("Could not record rejection of submission {}: {}",
            submission_id, err);
    }
}
