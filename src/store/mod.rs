//! The corpus store.
//!
//! The pipeline consumes persistent storage as transactional CRUD. This
//! module provides the reference implementation: an in-memory [`State`]
//! guarded by a process-wide lock, with snapshot transactions (commit swaps
//! the snapshot in, an error discards it) and a per-document mutex used to
//! serialize posting. A database-backed store can replace it behind the
//! same API.

pub mod models;

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use self::models::*;

/// All corpus tables.
#[derive(Clone, Debug, Default)]
pub struct State {
    next_person: PersonId,
    next_group: GroupId,
    next_submission: SubmissionId,
    next_event: i32,
    pub persons: BTreeMap<PersonId, Person>,
    /// Keyed by lowercased address.
    pub emails: BTreeMap<String, EmailAddress>,
    pub groups: BTreeMap<GroupId, Group>,
    pub documents: BTreeMap<String, Document>,
    /// Name aliases, each pointing at a canonical document name.
    pub aliases: BTreeMap<String, String>,
    pub document_authors: Vec<DocumentAuthor>,
    pub related: Vec<RelatedDocument>,
    pub doc_events: Vec<DocEvent>,
    pub submissions: BTreeMap<SubmissionId, Submission>,
    pub submission_events: Vec<SubmissionEvent>,
    pub checks: Vec<SubmissionCheck>,
    pub preapprovals: Vec<Preapproval>,
}

impl State {
    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons.get(&id)
    }

    pub fn person_mut(&mut self, id: PersonId) -> Option<&mut Person> {
        self.persons.get_mut(&id)
    }

    pub fn create_person(&mut self, name: &str, ascii: &str) -> PersonId {
        self.next_person += 1;
        let id = self.next_person;
        self.persons.insert(id, Person {
            id,
            name: name.to_string(),
            ascii: ascii.to_string(),
            name_from_draft: None,
        });
        id
    }

    /// All persons owning an address equal (case-insensitively) to `addr`.
    pub fn persons_with_address(&self, addr: &str) -> Vec<PersonId> {
        let addr = addr.to_lowercase();
        self.emails
            .get(&addr)
            .and_then(|email| email.person)
            .into_iter()
            .collect()
    }

    pub fn email(&self, addr: &str) -> Option<&EmailAddress> {
        self.emails.get(&addr.to_lowercase())
    }

    pub fn email_mut(&mut self, addr: &str) -> Option<&mut EmailAddress> {
        self.emails.get_mut(&addr.to_lowercase())
    }

    pub fn insert_email(&mut self, email: EmailAddress) {
        self.emails.insert(email.address.to_lowercase(), email);
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn create_group(
        &mut self,
        acronym: &str,
        kind: GroupKind,
        state: GroupState,
        requires_approval: bool,
    ) -> GroupId {
        self.next_group += 1;
        let id = self.next_group;
        self.groups.insert(id, Group {
            id,
            acronym: acronym.to_string(),
            kind,
            state,
            requires_approval,
        });
        id
    }

    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.get(name)
    }

    pub fn document_mut(&mut self, name: &str) -> Option<&mut Document> {
        self.documents.get_mut(name)
    }

    pub fn fetch_or_create_document(&mut self, name: &str) -> &mut Document {
        self.documents
            .entry(name.to_string())
            .or_insert_with(|| Document::new(name))
    }

    /// Resolve an alias to the canonical document it names.
    pub fn alias_target(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn ensure_alias(&mut self, name: &str, doc: &str) {
        self.aliases
            .entry(name.to_string())
            .or_insert_with(|| doc.to_string());
    }

    pub fn submission(&self, id: SubmissionId) -> Option<&Submission> {
        self.submissions.get(&id)
    }

    pub fn submission_mut(&mut self, id: SubmissionId)
    -> Option<&mut Submission> {
        self.submissions.get_mut(&id)
    }

    pub fn insert_submission(&mut self, mut submission: Submission)
    -> SubmissionId {
        self.next_submission += 1;
        submission.id = self.next_submission;
        let id = submission.id;
        self.submissions.insert(id, submission);
        id
    }

    /// Revisions of *other* posted submissions for `name` with a revision
    /// greater than or equal to `rev`, in ascending order.
    pub fn posted_conflicts(
        &self,
        name: &str,
        rev: &str,
        exclude: SubmissionId,
    ) -> Vec<String> {
        let mut revs = self.submissions
            .values()
            .filter(|s| {
                s.id != exclude
                    && s.name == name
                    && s.state == SubmissionState::Posted
                    && s.rev.as_str() >= rev
            })
            .map(|s| s.rev.clone())
            .collect::<Vec<_>>();
        revs.sort();
        revs
    }

    /// Sources of edges of `kind` pointing at `target`.
    pub fn related_that(&self, kind: RelationshipKind, target: &str)
    -> Vec<String> {
        self.related
            .iter()
            .filter(|r| r.relationship == kind && r.target == target)
            .map(|r| r.source.clone())
            .collect()
    }

    /// Targets of edges of `kind` leaving `source`.
    pub fn related_that_doc(&self, kind: RelationshipKind, source: &str)
    -> Vec<String> {
        self.related
            .iter()
            .filter(|r| r.relationship == kind && r.source == source)
            .map(|r| r.target.clone())
            .collect()
    }

    pub fn has_related(
        &self,
        source: &str,
        target: &str,
        kind: RelationshipKind,
    ) -> bool {
        self.related.iter().any(|r| {
            r.relationship == kind && r.source == source && r.target == target
        })
    }

    /// Insert an edge unless it already exists. Self-loops are never
    /// recorded. Returns whether an edge was added.
    pub fn add_related(
        &mut self,
        source: &str,
        target: &str,
        kind: RelationshipKind,
    ) -> bool {
        if source == target || self.has_related(source, target, kind) {
            return false;
        }
        self.related.push(RelatedDocument {
            source: source.to_string(),
            target: target.to_string(),
            relationship: kind,
        });
        true
    }

    /// Drop all edges of `kind` leaving `source`.
    pub fn remove_related_of_kind(
        &mut self,
        source: &str,
        kind: RelationshipKind,
    ) {
        self.related
            .retain(|r| !(r.relationship == kind && r.source == source));
    }

    /// Authors of a document, in position order.
    pub fn authors_of(&self, doc: &str) -> Vec<&DocumentAuthor> {
        let mut authors = self.document_authors
            .iter()
            .filter(|a| a.document == doc)
            .collect::<Vec<_>>();
        authors.sort_by_key(|a| a.order);
        authors
    }

    /// Replace a document's author set wholesale.
    pub fn set_document_authors(
        &mut self,
        doc: &str,
        authors: Vec<DocumentAuthor>,
    ) {
        self.document_authors.retain(|a| a.document != doc);
        self.document_authors.extend(authors);
    }

    pub fn add_doc_event(
        &mut self,
        doc: &str,
        kind: DocEventKind,
        rev: &str,
        by: PersonId,
        desc: &str,
    ) -> i32 {
        self.add_doc_event_at(doc, kind, rev, by, desc, Utc::now())
    }

    pub fn add_doc_event_at(
        &mut self,
        doc: &str,
        kind: DocEventKind,
        rev: &str,
        by: PersonId,
        desc: &str,
        time: chrono::DateTime<Utc>,
    ) -> i32 {
        self.next_event += 1;
        let id = self.next_event;
        self.doc_events.push(DocEvent {
            id,
            doc: doc.to_string(),
            kind,
            rev: rev.to_string(),
            by,
            time,
            desc: desc.to_string(),
        });
        id
    }

    pub fn add_submission_event(
        &mut self,
        submission: SubmissionId,
        by: Option<PersonId>,
        desc: &str,
    ) -> i32 {
        self.next_event += 1;
        let id = self.next_event;
        self.submission_events.push(SubmissionEvent {
            id,
            submission,
            by,
            time: Utc::now(),
            desc: desc.to_string(),
        });
        id
    }

    /// Events of one submission, oldest first.
    pub fn submission_events_for(&self, submission: SubmissionId)
    -> Vec<&SubmissionEvent> {
        let mut events = self.submission_events
            .iter()
            .filter(|e| e.submission == submission)
            .collect::<Vec<_>>();
        events.sort_by_key(|e| e.id);
        events
    }

    pub fn record_check(&mut self, check: SubmissionCheck) {
        self.checks.push(check);
    }

    pub fn checks_for(&self, submission: SubmissionId)
    -> Vec<&SubmissionCheck> {
        self.checks
            .iter()
            .filter(|c| c.submission == submission)
            .collect()
    }

    pub fn preapproved(&self, name: &str) -> bool {
        self.preapprovals.iter().any(|p| p.name == name)
    }

    pub fn add_preapproval(&mut self, name: &str, by: PersonId) {
        self.preapprovals.push(Preapproval {
            name: name.to_string(),
            by,
            time: Utc::now(),
        });
    }
}

/// Handle to the corpus, shareable between threads.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<State>,
    doc_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    /// Run a read-only closure against the current state.
    pub fn with<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&State) -> T,
    {
        let guard = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&guard)
    }

    /// Run a closure against a snapshot of the state. If it succeeds the
    /// snapshot replaces the state; otherwise every change it made is
    /// discarded. Holding the write lock for the whole closure makes
    /// transactions serializable.
    pub fn transaction<T, F>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&mut State) -> crate::Result<T>,
    {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut work = guard.clone();
        match f(&mut work) {
            Ok(value) => {
                *guard = work;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// Mutual-exclusion lock for one document name. Callers lock the
    /// returned mutex for the duration of a posting.
    pub fn document_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = match self.doc_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(name.to_string())
            .or_insert_with(Default::default)
            .clone()
    }
}

/// Lock a document mutex, recovering from poisoning.
pub fn hold(lock: &Mutex<()>) -> MutexGuard<()> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
