//! The outbound notification collaborator.
//!
//! Delivery is external to this crate. Every call returns the concrete
//! list of addresses the notification was sent to, which the pipeline
//! records in its audit messages. Failures are reported to the caller and
//! never roll back corpus state.

use crate::store::models::{Document, ExtResource, Submission};

/// Which approver a posting-approval request is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Approver {
    AreaDirectors,
    GroupChairs,
}

pub trait Notifier {
    /// Announce a newly posted submission to the relevant mailing lists.
    fn announce_to_lists(&self, submission: &Submission)
    -> crate::Result<Vec<String>>;

    /// Announce the first revision of a newly adopted working-group
    /// document.
    fn announce_new_wg_00(&self, submission: &Submission)
    -> crate::Result<Vec<String>>;

    /// Announce a new revision of a document, with any state change that
    /// accompanied it.
    fn announce_new_version(
        &self,
        submission: &Submission,
        document: &Document,
        state_change_msg: &str,
    ) -> crate::Result<Vec<String>>;

    /// Announce the posting to the document's authors.
    fn announce_to_authors(&self, submission: &Submission)
    -> crate::Result<Vec<String>>;

    /// Request posting approval from the given approver, naming the
    /// replaced document when the request was triggered by a supersession
    /// claim.
    fn send_approval_request(
        &self,
        submission: &Submission,
        approver: Approver,
        replaced_document: Option<&str>,
    ) -> crate::Result<Vec<String>>;

    /// Request posting confirmation from the submitter or the previous
    /// authors. `chair_notice` flags that the author set of a group
    /// document changed, so the chairs are copied.
    fn send_submission_confirmation(
        &self,
        submission: &Submission,
        chair_notice: bool,
    ) -> crate::Result<Vec<String>>;

    /// Ask the document's authors to review suggested replacement
    /// relationships.
    fn send_review_possibly_replaces_request(
        &self,
        document: &Document,
        submitter_info: &str,
    ) -> crate::Result<Vec<String>>;

    /// Notify that the approved replacement relationships of a document
    /// changed during posting.
    fn send_replaces_status_update(
        &self,
        document: &Document,
        approved: &[String],
        by: &str,
    ) -> crate::Result<Vec<String>>;

    /// Ask the maintainers to apply an external resource change the
    /// requester was not allowed to make directly.
    fn send_external_resource_change_request(
        &self,
        document: &Document,
        submitter_info: &str,
        resources: &[ExtResource],
    ) -> crate::Result<Vec<String>>;
}
