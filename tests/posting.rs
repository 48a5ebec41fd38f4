//! Posting transaction properties: sequencing, idempotence, atomicity.

mod common;

use idsubmit::files;
use idsubmit::posting::post_submission;
use idsubmit::store::models::{
    AuthorInfo,
    DocTag,
    ExtResource,
    RelationshipKind,
    SubmissionState,
};
use idsubmit::validate::ConsistencyError;

use common::Fixture;

/// Insert an already-validated submission and stage its files.
fn uploaded(fx: &Fixture, name: &str, rev: &str) -> i32 {
    let mut submission = fx.submission(name, rev);
    submission.state = SubmissionState::Uploaded;
    let id = fx.insert(submission);
    fx.stage(name, rev, &["xml", "txt", "html"]);
    id
}

#[test]
fn posting_creates_the_document_and_promotes_files() {
    let fx = Fixture::new();
    let env = fx.env();
    let id = uploaded(&fx, "draft-example-foo", "00");

    post_submission(&env, id, "New version accepted", "New version accepted",
        None).unwrap();

    let doc = fx.document("draft-example-foo").unwrap();
    assert_eq!(doc.rev, "00");
    assert_eq!(doc.title, "The Foo Protocol");
    assert!(doc.expires.is_some());

    let record = fx.submission_record(id);
    assert_eq!(record.state, SubmissionState::Posted);
    assert_eq!(record.draft.as_deref(), Some("draft-example-foo"));

    // Authors were resolved and attached.
    let authors = fx.store.with(|state| {
        state.authors_of("draft-example-foo")
            .iter()
            .map(|a| a.email.clone())
            .collect::<Vec<_>>()
    });
    assert_eq!(authors, vec!["jane@example.com".to_string()]);

    // Files moved from staging to the repository.
    for ext in &["xml", "txt", "html"] {
        assert!(fx.repository_path("draft-example-foo", "00", ext).exists());
        assert!(!fx.staged_path("draft-example-foo", "00", ext).exists());
    }

    // History and announcements happened.
    let history = fx.store.with(|state| state.doc_events
        .iter()
        .filter(|e| e.doc == "draft-example-foo")
        .map(|e| e.desc.clone())
        .collect::<Vec<_>>());
    assert!(history.iter().any(|d| d.contains("New version available")));
    assert!(fx.notifier.called("announce_to_lists"));
    assert!(fx.notifier.called("announce_to_authors"));

    // The bibliographic artifact was written.
    assert!(fx.config.paths.bibxml
        .join("reference.I-D.draft-example-foo-00.xml")
        .exists());
}

#[test]
fn revisions_are_sequential_and_old_files_archived() {
    let fx = Fixture::new();
    let env = fx.env();

    let first = uploaded(&fx, "draft-example-foo", "00");
    post_submission(&env, first, "accepted", "accepted", None).unwrap();

    let second = uploaded(&fx, "draft-example-foo", "01");
    post_submission(&env, second, "accepted", "accepted", None).unwrap();

    let doc = fx.document("draft-example-foo").unwrap();
    assert_eq!(doc.rev, "01");

    // Revision 00 moved to cold storage; 01 sits in the repository.
    assert!(fx.archive_path("draft-example-foo", "00", "xml").exists());
    assert!(!fx.repository_path("draft-example-foo", "00", "xml").exists());
    assert!(fx.repository_path("draft-example-foo", "01", "xml").exists());
}

#[test]
fn a_submission_cannot_be_posted_twice() {
    let fx = Fixture::new();
    let env = fx.env();
    let id = uploaded(&fx, "draft-example-foo", "00");

    post_submission(&env, id, "accepted", "accepted", None).unwrap();
    let err = post_submission(&env, id, "accepted", "accepted", None)
        .unwrap_err();

    assert!(err.downcast_ref::<ConsistencyError>().is_some(),
        "expected a consistency error, got: {}", err);
    assert_eq!(fx.document("draft-example-foo").unwrap().rev, "00");
}

#[test]
fn same_revision_racers_fail_the_consistency_check() {
    let fx = Fixture::new();
    let env = fx.env();

    // Two submissions both targeting draft-example-foo-00.
    let winner = uploaded(&fx, "draft-example-foo", "00");
    let loser = uploaded(&fx, "draft-example-foo", "00");

    post_submission(&env, winner, "accepted", "accepted", None).unwrap();
    let err = post_submission(&env, loser, "accepted", "accepted", None)
        .unwrap_err();

    let consistency = err.downcast_ref::<ConsistencyError>()
        .expect("expected a consistency error");
    assert!(consistency.0.contains("conflicts with existing submission"),
        "{}", consistency);
    assert_eq!(fx.submission_state(loser), SubmissionState::Uploaded);
}

#[test]
fn promotion_is_idempotent() {
    let fx = Fixture::new();
    let env = fx.env();
    let id = uploaded(&fx, "draft-example-foo", "00");

    post_submission(&env, id, "accepted", "accepted", None).unwrap();

    // Re-running promotion after the files have already moved is a no-op.
    let declared = fx.submission_record(id).file_types;
    files::move_files_to_repository(
        &fx.config, "draft-example-foo", "00", &declared).unwrap();

    assert!(fx.repository_path("draft-example-foo", "00", "xml").exists());
    assert_eq!(
        std::fs::read_to_string(
            fx.repository_path("draft-example-foo", "00", "xml")).unwrap(),
        "draft-example-foo 00 xml",
    );
}

#[test]
fn promotion_raises_when_a_declared_file_vanished() {
    let fx = Fixture::new();
    let declared = vec!["xml".to_string()];

    let err = files::move_files_to_repository(
        &fx.config, "draft-example-foo", "00", &declared).unwrap_err();
    assert!(err.to_string().contains("source and destination missing"));
}

#[test]
fn approved_replaces_edges_accumulate_across_postings() {
    let mut fx = Fixture::new();
    let jane = fx.person("Jane Doe", "jane@example.com");
    fx.authority.grant_approval_role(jane);
    let env = fx.env();

    // Two standing documents that will be superseded.
    for target in &["draft-other-one", "draft-other-two"] {
        let id = uploaded(&fx, target, "00");
        post_submission(&env, id, "accepted", "accepted", None).unwrap();
    }

    let first = {
        let mut s = fx.submission("draft-example-foo", "00");
        s.state = SubmissionState::Uploaded;
        s.replaces = "draft-other-one".to_string();
        fx.insert(s)
    };
    fx.stage("draft-example-foo", "00", &["xml"]);
    post_submission(&env, first, "accepted", "accepted", Some(jane)).unwrap();

    let replaces = fx.store.with(|state| state.related_that_doc(
        RelationshipKind::Replaces, "draft-example-foo"));
    assert_eq!(replaces, vec!["draft-other-one".to_string()]);

    // The next revision claims a different target; the set grows, it never
    // shrinks.
    let second = {
        let mut s = fx.submission("draft-example-foo", "01");
        s.state = SubmissionState::Uploaded;
        s.replaces = "draft-other-two".to_string();
        fx.insert(s)
    };
    fx.stage("draft-example-foo", "01", &["xml"]);
    post_submission(&env, second, "accepted", "accepted", Some(jane)).unwrap();

    let mut replaces = fx.store.with(|state| state.related_that_doc(
        RelationshipKind::Replaces, "draft-example-foo"));
    replaces.sort();
    assert_eq!(replaces, vec![
        "draft-other-one".to_string(),
        "draft-other-two".to_string(),
    ]);
    assert!(fx.notifier.called("replaces_status_update"));
}

#[test]
fn unauthorized_replaces_claims_become_suggestions() {
    let fx = Fixture::new();
    let env = fx.env();

    let target = uploaded(&fx, "draft-other-one", "00");
    post_submission(&env, target, "accepted", "accepted", None).unwrap();

    // The submitter has no authority over draft-other-one and is not among
    // its authors.
    let mut s = fx.submission("draft-example-foo", "00");
    s.state = SubmissionState::Uploaded;
    s.submitter = "Mallory Mal <mallory@example.com>".to_string();
    s.authors = vec![AuthorInfo {
        name: "Mallory Mal".to_string(),
        email: "mallory@example.com".to_string(),
        affiliation: String::new(),
        country: String::new(),
    }];
    s.replaces = "draft-other-one".to_string();
    let id = fx.insert(s);
    fx.stage("draft-example-foo", "00", &["xml"]);
    post_submission(&env, id, "accepted", "accepted", None).unwrap();

    let approved = fx.store.with(|state| state.related_that_doc(
        RelationshipKind::Replaces, "draft-example-foo"));
    let suggested = fx.store.with(|state| state.related_that_doc(
        RelationshipKind::PossiblyReplaces, "draft-example-foo"));
    assert!(approved.is_empty());
    assert_eq!(suggested, vec!["draft-other-one".to_string()]);
    assert!(fx.notifier.called("possibly_replaces_review"));
}

#[test]
fn author_of_the_replaced_document_gets_approval() {
    let fx = Fixture::new();
    let env = fx.env();

    // Jane authored the target document.
    let target = uploaded(&fx, "draft-other-one", "00");
    post_submission(&env, target, "accepted", "accepted", None).unwrap();

    // She now submits a replacement under a new name.
    let mut s = fx.submission("draft-example-foo", "00");
    s.state = SubmissionState::Uploaded;
    s.replaces = "draft-other-one".to_string();
    let id = fx.insert(s);
    fx.stage("draft-example-foo", "00", &["xml"]);
    post_submission(&env, id, "accepted", "accepted", None).unwrap();

    let approved = fx.store.with(|state| state.related_that_doc(
        RelationshipKind::Replaces, "draft-example-foo"));
    assert_eq!(approved, vec!["draft-other-one".to_string()]);
}

#[test]
fn author_list_is_replaced_wholesale() {
    let fx = Fixture::new();
    let env = fx.env();

    let first = uploaded(&fx, "draft-example-foo", "00");
    post_submission(&env, first, "accepted", "accepted", None).unwrap();

    let mut s = fx.submission("draft-example-foo", "01");
    s.state = SubmissionState::Uploaded;
    s.authors = vec![AuthorInfo {
        name: "John Roe".to_string(),
        email: "john@example.com".to_string(),
        affiliation: String::new(),
        country: String::new(),
    }];
    let second = fx.insert(s);
    fx.stage("draft-example-foo", "01", &["xml"]);
    post_submission(&env, second, "accepted", "accepted", None).unwrap();

    let authors = fx.store.with(|state| {
        state.authors_of("draft-example-foo")
            .iter()
            .map(|a| a.email.clone())
            .collect::<Vec<_>>()
    });
    assert_eq!(authors, vec!["john@example.com".to_string()]);
}

#[test]
fn needs_revision_marker_is_cleared_on_posting() {
    let fx = Fixture::new();
    let env = fx.env();

    let first = uploaded(&fx, "draft-example-foo", "00");
    post_submission(&env, first, "accepted", "accepted", None).unwrap();

    fx.store.transaction(|state| {
        state.document_mut("draft-example-foo")
            .unwrap()
            .tags
            .insert(DocTag::NeedRev);
        Ok(())
    }).unwrap();

    let second = uploaded(&fx, "draft-example-foo", "01");
    post_submission(&env, second, "accepted", "accepted", None).unwrap();

    let doc = fx.document("draft-example-foo").unwrap();
    assert!(!doc.tags.contains(&DocTag::NeedRev));
    let history = fx.store.with(|state| state.doc_events
        .iter()
        .filter(|e| e.doc == "draft-example-foo")
        .map(|e| e.desc.clone())
        .collect::<Vec<_>>());
    assert!(history.iter().any(|d| d.contains("Revised ID Needed")),
        "history: {:?}", history);
}

#[test]
fn resource_changes_without_authority_become_requests() {
    let fx = Fixture::new();
    let env = fx.env();

    let first = uploaded(&fx, "draft-example-foo", "00");
    post_submission(&env, first, "accepted", "accepted", None).unwrap();

    let mut s = fx.submission("draft-example-foo", "01");
    s.state = SubmissionState::Uploaded;
    s.external_resources = vec![ExtResource {
        tag: "repository".to_string(),
        display_name: String::new(),
        value: "https://example.com/foo.git".to_string(),
    }];
    let second = fx.insert(s);
    fx.stage("draft-example-foo", "01", &["xml"]);
    post_submission(&env, second, "accepted", "accepted", None).unwrap();

    // Nobody held edit rights, so the corpus is unchanged and a change
    // request went out instead.
    let doc = fx.document("draft-example-foo").unwrap();
    assert!(doc.external_resources.is_empty());
    assert!(fx.notifier.called("external_resource_change_request"));
}

#[test]
fn resource_changes_with_authority_are_applied() {
    let mut fx = Fixture::new();
    let jane = fx.person("Jane Doe", "jane@example.com");
    fx.authority.grant_resource_edit(jane);
    let env = fx.env();

    let mut s = fx.submission("draft-example-foo", "00");
    s.state = SubmissionState::Uploaded;
    s.external_resources = vec![ExtResource {
        tag: "repository".to_string(),
        display_name: String::new(),
        value: "https://example.com/foo.git".to_string(),
    }];
    let id = fx.insert(s);
    fx.stage("draft-example-foo", "00", &["xml"]);
    post_submission(&env, id, "accepted", "accepted", Some(jane)).unwrap();

    let doc = fx.document("draft-example-foo").unwrap();
    assert_eq!(doc.external_resources.len(), 1);
    assert_eq!(doc.external_resources[0].value, "https://example.com/foo.git");
}

#[test]
fn first_revision_backfills_document_history() {
    let fx = Fixture::new();
    let env = fx.env();

    let id = uploaded(&fx, "draft-example-foo", "00");
    fx.store.transaction(|state| {
        state.add_submission_event(id, None,
            "Uploaded submission for draft-example-foo");
        state.add_submission_event(id, None,
            "Set submitter to \"Jane Doe\", replaces to (none) and sent \
             confirmation email to submitter and authors: jane@example.com");
        Ok(())
    }).unwrap();

    post_submission(&env, id, "accepted", "accepted", None).unwrap();

    let history = fx.store.with(|state| state.doc_events
        .iter()
        .filter(|e| e.doc == "draft-example-foo")
        .map(|e| e.desc.clone())
        .collect::<Vec<_>>());
    assert!(history.iter().any(|d| d == "Uploaded new revision"),
        "history: {:?}", history);
    assert!(history.iter().any(|d| d.starts_with(
        "Request for posting confirmation emailed")), "history: {:?}", history);
}
