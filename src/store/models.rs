//! Plain data records held by the corpus store.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::fmt;

pub type PersonId = i32;
pub type GroupId = i32;
pub type SubmissionId = i32;

/// Lifecycle state of an in-flight submission.
///
/// A submission is created in `Validating`, moves to `Uploaded` once all
/// automated checks pass, then either waits in one of the approval states or
/// goes straight to `Posted`. `Cancel` is reachable from every non-terminal
/// state and is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Validating,
    Uploaded,
    /// Waiting for confirmation from the submitter or current authors.
    Auth,
    /// Waiting for approval from the previous revision's authors.
    AutAppr,
    /// Waiting for approval from the group chairs.
    GrpAppr,
    /// Waiting for approval from the area directors.
    AdAppr,
    Posted,
    Cancel,
}

impl SubmissionState {
    pub fn slug(self) -> &'static str {
        match self {
            SubmissionState::Validating => "validating",
            SubmissionState::Uploaded => "uploaded",
            SubmissionState::Auth => "auth",
            SubmissionState::AutAppr => "aut-appr",
            SubmissionState::GrpAppr => "grp-appr",
            SubmissionState::AdAppr => "ad-appr",
            SubmissionState::Posted => "posted",
            SubmissionState::Cancel => "cancel",
        }
    }

    pub fn is_terminal(self) -> bool {
        match self {
            SubmissionState::Posted | SubmissionState::Cancel => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.slug())
    }
}

/// Organizational stream a document belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Ietf,
    Irtf,
    Iab,
}

impl Stream {
    pub fn slug(self) -> &'static str {
        match self {
            Stream::Ietf => "ietf",
            Stream::Irtf => "irtf",
            Stream::Iab => "iab",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocState {
    Active,
    Expired,
    Rfc,
}

/// Position of a document in the steering-group approval track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IesgState {
    Idexists,
    Approved,
    Ann,
    RfcQueue,
    Pub,
    NopubAdw,
    NopubAnw,
    Dead,
}

impl IesgState {
    /// Has the approval track advanced past the point where registry review
    /// updates still matter?
    pub fn is_post_approval(self) -> bool {
        match self {
            IesgState::Approved
            | IesgState::Ann
            | IesgState::RfcQueue
            | IesgState::Pub
            | IesgState::NopubAdw
            | IesgState::NopubAnw
            | IesgState::Dead => true,
            IesgState::Idexists => false,
        }
    }
}

/// Registry review sub-state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IanaReviewState {
    NeedRev,
    OkAct,
    OkNoact,
    NotOk,
    Changed,
}

impl IanaReviewState {
    pub fn slug(self) -> &'static str {
        match self {
            IanaReviewState::NeedRev => "need-rev",
            IanaReviewState::OkAct => "ok-act",
            IanaReviewState::OkNoact => "ok-noact",
            IanaReviewState::NotOk => "not-ok",
            IanaReviewState::Changed => "changed",
        }
    }

    pub fn is_terminal(self) -> bool {
        match self {
            IanaReviewState::OkAct
            | IanaReviewState::OkNoact
            | IanaReviewState::NotOk => true,
            IanaReviewState::NeedRev | IanaReviewState::Changed => false,
        }
    }
}

/// Stream-specific document sub-state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Adopted as a working-group document.
    WgDoc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocTag {
    NeedRev,
    AdFollowup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    WorkingGroup,
    Area,
    Individual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupState {
    Active,
    Concluded,
}

#[derive(Clone, Debug)]
pub struct Group {
    pub id: GroupId,
    pub acronym: String,
    pub kind: GroupKind,
    pub state: GroupState,
    /// Whether a first (`00`) submission to this group needs chair approval.
    pub requires_approval: bool,
}

impl Group {
    pub fn is_active(&self) -> bool {
        self.state == GroupState::Active
    }
}

/// A durable identity record.
#[derive(Clone, Debug)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    /// ASCII transliteration of the display name, for sorting and search.
    pub ascii: String,
    /// Name as it last appeared on a submitted document.
    pub name_from_draft: Option<String>,
}

/// An email address record. Belongs to at most one person at a time; an
/// address with no owner is a valid transient state.
#[derive(Clone, Debug)]
pub struct EmailAddress {
    /// Lowercased address, unique.
    pub address: String,
    pub person: Option<PersonId>,
    /// Annotation describing where this address was last seen.
    pub origin: String,
    /// When this address was first seen.
    pub time: Option<DateTime<Utc>>,
    pub active: bool,
}

/// One author entry as carried by a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub name: String,
    /// May be empty when no address could be extracted from the document.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub country: String,
}

/// A typed external resource attached to a document or submission.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtResource {
    pub tag: String,
    #[serde(default)]
    pub display_name: String,
    pub value: String,
}

impl fmt::Display for ExtResource {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} {} {}", self.tag, self.display_name, self.value)
    }
}

/// An in-flight candidate revision.
#[derive(Clone, Debug)]
pub struct Submission {
    pub id: SubmissionId,
    pub name: String,
    /// Two-digit, zero-padded revision string.
    pub rev: String,
    pub group: Option<GroupId>,
    pub title: String,
    pub abstract_text: String,
    /// Submitter as a `Name <address>` mailbox line.
    pub submitter: String,
    pub authors: Vec<AuthorInfo>,
    pub pages: Option<i32>,
    pub words: Option<i32>,
    pub file_size: Option<u64>,
    /// Extensions (without dots) of the files uploaded for this submission.
    pub file_types: Vec<String>,
    /// Comma-joined names of documents this submission claims to replace.
    pub replaces: String,
    pub submission_date: NaiveDate,
    /// Date written inside the document itself.
    pub document_date: Option<NaiveDate>,
    pub state: SubmissionState,
    /// Single-use access token for posting confirmation.
    pub auth_key: Option<String>,
    /// Name of the document this submission became, once posted.
    pub draft: Option<String>,
    pub external_resources: Vec<ExtResource>,
    pub formal_languages: Vec<String>,
}

/// A canonical corpus entry, identified by name and mutated in place on
/// every posting. Never deleted.
#[derive(Clone, Debug)]
pub struct Document {
    pub name: String,
    /// Current revision; empty until the first posting completes.
    pub rev: String,
    pub title: String,
    pub abstract_text: String,
    pub group: Option<GroupId>,
    pub stream: Option<Stream>,
    pub state: DocState,
    pub iesg_state: Option<IesgState>,
    pub iana_review_state: Option<IanaReviewState>,
    pub stream_state: Option<StreamState>,
    pub tags: BTreeSet<DocTag>,
    pub pages: Option<i32>,
    pub expires: Option<DateTime<Utc>>,
    pub formal_languages: Vec<String>,
    pub action_holders: Vec<PersonId>,
    pub external_resources: Vec<ExtResource>,
}

impl Document {
    pub fn new(name: &str) -> Document {
        Document {
            name: name.to_string(),
            rev: String::new(),
            title: String::new(),
            abstract_text: String::new(),
            group: None,
            stream: None,
            state: DocState::Active,
            iesg_state: None,
            iana_review_state: None,
            stream_state: None,
            tags: BTreeSet::new(),
            pages: None,
            expires: None,
            formal_languages: Vec::new(),
            action_holders: Vec::new(),
            external_resources: Vec::new(),
        }
    }
}

/// Join record between a document and a (person, address) pair. The full set
/// for a document is replaced wholesale on each posting.
#[derive(Clone, Debug)]
pub struct DocumentAuthor {
    pub document: String,
    pub person: PersonId,
    pub email: String,
    pub affiliation: String,
    pub country: String,
    pub order: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationshipKind {
    /// Confirmed supersession; the target is replaced by the source.
    Replaces,
    /// Suggested supersession awaiting human resolution.
    PossiblyReplaces,
    /// Bibliographic reference derived from rendered artifacts.
    References,
}

impl RelationshipKind {
    pub fn slug(self) -> &'static str {
        match self {
            RelationshipKind::Replaces => "replaces",
            RelationshipKind::PossiblyReplaces => "possibly-replaces",
            RelationshipKind::References => "refs",
        }
    }
}

/// A typed edge between two documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedDocument {
    pub source: String,
    pub target: String,
    pub relationship: RelationshipKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocEventKind {
    NewSubmission,
    NewRevision,
    StateChanged,
    ChangedDocument,
    AddedSuggestedReplaces,
}

impl DocEventKind {
    pub fn slug(self) -> &'static str {
        match self {
            DocEventKind::NewSubmission => "new_submission",
            DocEventKind::NewRevision => "new_revision",
            DocEventKind::StateChanged => "changed_state",
            DocEventKind::ChangedDocument => "changed_document",
            DocEventKind::AddedSuggestedReplaces => "added_suggested_replaces",
        }
    }
}

/// One entry in a document's append-only history.
#[derive(Clone, Debug)]
pub struct DocEvent {
    pub id: i32,
    pub doc: String,
    pub kind: DocEventKind,
    pub rev: String,
    pub by: PersonId,
    pub time: DateTime<Utc>,
    pub desc: String,
}

/// One entry in a submission's append-only history.
#[derive(Clone, Debug)]
pub struct SubmissionEvent {
    pub id: i32,
    pub submission: SubmissionId,
    pub by: Option<PersonId>,
    pub time: DateTime<Utc>,
    pub desc: String,
}

/// Recorded outcome of one checker run against one submission.
#[derive(Clone, Debug)]
pub struct SubmissionCheck {
    pub submission: SubmissionId,
    pub checker: String,
    pub symbol: String,
    /// `None` means the checker could not reach a verdict; only an explicit
    /// `Some(false)` fails the submission.
    pub passed: Option<bool>,
    pub message: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub items: serde_json::Value,
}

/// Standing approval for a first revision under a given name, recorded ahead
/// of the submission itself.
#[derive(Clone, Debug)]
pub struct Preapproval {
    pub name: String,
    pub by: PersonId,
    pub time: DateTime<Utc>,
}
