#![allow(dead_code)]

use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use idsubmit::authz::StaticAuthority;
use idsubmit::checks::{CheckResult, Checker, Probe};
use idsubmit::config::Config;
use idsubmit::notify::{Approver, Notifier};
use idsubmit::render::{RenderError, Renderer};
use idsubmit::store::Store;
use idsubmit::store::models::{
    AuthorInfo,
    Document,
    ExtResource,
    Submission,
    SubmissionId,
    SubmissionState,
};
use idsubmit::Env;

/// Everything a pipeline test needs: a corpus store, a filesystem sandbox
/// and fake collaborators.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
    pub store: Store,
    pub renderer: FakeRenderer,
    pub notifier: RecordingNotifier,
    pub authority: StaticAuthority,
    pub checkers: Vec<Box<dyn Checker>>,
}

impl Fixture {
    pub fn new() -> Fixture {
        let _ = env_logger::Builder::from_default_env()
            .is_test(true)
            .try_init();

        let dir = TempDir::new().expect("create sandbox");
        for sub in &["staging", "repository", "archive", "bibxml"] {
            fs::create_dir(dir.path().join(sub)).expect("create sandbox dir");
        }

        let toml = format!(
            r#"
            [paths]
            staging = {staging:?}
            repository = {repository:?}
            archive = {archive:?}
            bibxml = {bibxml:?}

            [submission]
            file_types = ["xml", "txt", "html", "pdf"]
            "#,
            staging = dir.path().join("staging"),
            repository = dir.path().join("repository"),
            archive = dir.path().join("archive"),
            bibxml = dir.path().join("bibxml"),
        );
        let config: Config = toml::from_str(&toml).expect("parse test config");

        Fixture {
            dir,
            config,
            store: Store::new(),
            renderer: FakeRenderer::default(),
            notifier: RecordingNotifier::default(),
            authority: StaticAuthority::new(),
            checkers: vec![Box::new(PassChecker)],
        }
    }

    pub fn env(&self) -> Env {
        Env::new(
            &self.store,
            &self.config,
            &self.renderer,
            &self.notifier,
            &self.authority,
            &self.checkers,
        ).expect("create environment")
    }

    /// A valid single-author submission in the `Validating` state.
    pub fn submission(&self, name: &str, rev: &str) -> Submission {
        let today = Utc::now().naive_utc().date();
        Submission {
            id: 0,
            name: name.to_string(),
            rev: rev.to_string(),
            group: None,
            title: "The Foo Protocol".to_string(),
            abstract_text: "This document describes foo.".to_string(),
            submitter: "Jane Doe <jane@example.com>".to_string(),
            authors: vec![AuthorInfo {
                name: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                affiliation: "Example Corp".to_string(),
                country: "NO".to_string(),
            }],
            pages: Some(12),
            words: Some(3400),
            file_size: Some(20_000),
            file_types: vec!["xml".to_string()],
            replaces: String::new(),
            submission_date: today,
            document_date: Some(today),
            state: SubmissionState::Validating,
            auth_key: None,
            draft: None,
            external_resources: Vec::new(),
            formal_languages: Vec::new(),
        }
    }

    pub fn insert(&self, submission: Submission) -> SubmissionId {
        self.store
            .transaction(|state| Ok(state.insert_submission(submission)))
            .expect("insert submission")
    }

    /// Write placeholder staged files for the given extensions.
    pub fn stage(&self, name: &str, rev: &str, exts: &[&str]) {
        for ext in exts {
            let path = self.config.paths.staging
                .join(format!("{}-{}.{}", name, rev, ext));
            fs::write(path, format!("{} {} {}", name, rev, ext))
                .expect("stage file");
        }
    }

    pub fn submission_state(&self, id: SubmissionId) -> SubmissionState {
        self.store
            .with(|state| state.submission(id).map(|s| s.state))
            .expect("submission exists")
    }

    pub fn submission_record(&self, id: SubmissionId) -> Submission {
        self.store
            .with(|state| state.submission(id).cloned())
            .expect("submission exists")
    }

    pub fn submission_events(&self, id: SubmissionId) -> Vec<String> {
        self.store.with(|state| {
            state.submission_events_for(id)
                .into_iter()
                .map(|e| e.desc.clone())
                .collect()
        })
    }

    pub fn document(&self, name: &str) -> Option<Document> {
        self.store.with(|state| state.document(name).cloned())
    }

    /// Seed a person owning the given address, as identity resolution
    /// would create it.
    pub fn person(&self, name: &str, email: &str) -> i32 {
        self.store.transaction(|state| {
            let (id, _) = idsubmit::models::person::ensure_person_email_info_exists(
                state, name, email, "seed");
            Ok(id)
        }).expect("seed person")
    }

    pub fn staged_path(&self, name: &str, rev: &str, ext: &str) -> PathBuf {
        self.config.paths.staging.join(format!("{}-{}.{}", name, rev, ext))
    }

    pub fn repository_path(&self, name: &str, rev: &str, ext: &str) -> PathBuf {
        self.config.paths.repository.join(format!("{}-{}.{}", name, rev, ext))
    }

    pub fn archive_path(&self, name: &str, rev: &str, ext: &str) -> PathBuf {
        self.config.paths.archive.join(format!("{}-{}.{}", name, rev, ext))
    }
}

/// Renderer stand-in: produces text and HTML siblings for a staged XML
/// file, or fails with a fixed message.
#[derive(Default)]
pub struct FakeRenderer {
    pub fail_with: Option<String>,
    pub references: Vec<String>,
}

impl Renderer for FakeRenderer {
    fn render_missing_formats(
        &self,
        submission: &Submission,
        config: &Config,
    ) -> Result<(), RenderError> {
        if let Some(message) = &self.fail_with {
            return Err(RenderError::new(message.clone()));
        }

        let stem = format!("{}-{}", submission.name, submission.rev);
        let staging = &config.paths.staging;
        if !staging.join(format!("{}.xml", stem)).exists() {
            return Err(RenderError::new("no source file to render"));
        }

        let txt = staging.join(format!("{}.txt", stem));
        if !txt.exists() {
            fs::write(&txt, "rendered text").map_err(|e|
                RenderError::new(e.to_string()))?;
        }
        fs::write(staging.join(format!("{}.html", stem)), "<html/>")
            .map_err(|e| RenderError::new(e.to_string()))?;
        Ok(())
    }

    fn extract_references(
        &self,
        _files: &BTreeMap<String, PathBuf>,
    ) -> idsubmit::Result<Vec<String>> {
        Ok(self.references.clone())
    }
}

/// Notifier stand-in: records every call and returns fixed recipients.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn record(&self, what: &str) {
        self.calls.lock().unwrap().push(what.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, what: &str) -> bool {
        self.calls().iter().any(|c| c == what)
    }
}

impl Notifier for RecordingNotifier {
    fn announce_to_lists(&self, _: &Submission)
    -> idsubmit::Result<Vec<String>> {
        self.record("announce_to_lists");
        Ok(vec!["announce@example.com".to_string()])
    }

    fn announce_new_wg_00(&self, _: &Submission)
    -> idsubmit::Result<Vec<String>> {
        self.record("announce_new_wg_00");
        Ok(vec!["wg@example.com".to_string()])
    }

    fn announce_new_version(&self, _: &Submission, _: &Document, _: &str)
    -> idsubmit::Result<Vec<String>> {
        self.record("announce_new_version");
        Ok(vec!["announce@example.com".to_string()])
    }

    fn announce_to_authors(&self, _: &Submission)
    -> idsubmit::Result<Vec<String>> {
        self.record("announce_to_authors");
        Ok(vec!["jane@example.com".to_string()])
    }

    fn send_approval_request(
        &self,
        _: &Submission,
        approver: Approver,
        _: Option<&str>,
    ) -> idsubmit::Result<Vec<String>> {
        match approver {
            Approver::AreaDirectors => {
                self.record("approval_request_ad");
                Ok(vec!["ad@example.com".to_string()])
            }
            Approver::GroupChairs => {
                self.record("approval_request_chairs");
                Ok(vec!["chairs@example.com".to_string()])
            }
        }
    }

    fn send_submission_confirmation(&self, _: &Submission, _: bool)
    -> idsubmit::Result<Vec<String>> {
        self.record("submission_confirmation");
        Ok(vec!["jane@example.com".to_string()])
    }

    fn send_review_possibly_replaces_request(&self, _: &Document, _: &str)
    -> idsubmit::Result<Vec<String>> {
        self.record("possibly_replaces_review");
        Ok(vec!["authors@example.com".to_string()])
    }

    fn send_replaces_status_update(&self, _: &Document, _: &[String], _: &str)
    -> idsubmit::Result<Vec<String>> {
        self.record("replaces_status_update");
        Ok(vec!["announce@example.com".to_string()])
    }

    fn send_external_resource_change_request(
        &self,
        _: &Document,
        _: &str,
        _: &[ExtResource],
    ) -> idsubmit::Result<Vec<String>> {
        self.record("external_resource_change_request");
        Ok(vec!["maintainers@example.com".to_string()])
    }
}

/// Checker that passes on any XML artifact.
pub struct PassChecker;

impl Checker for PassChecker {
    fn name(&self) -> &str { "pass" }
    fn symbol(&self) -> &str { "P" }
    fn supports(&self, probe: Probe) -> bool {
        probe == Probe::XmlFile
    }
    fn check(&self, _: Probe, _: &Path) -> CheckResult {
        CheckResult::passed("looks good")
    }
}

/// Checker that fails on any text artifact.
pub struct FailChecker;

impl Checker for FailChecker {
    fn name(&self) -> &str { "fail" }
    fn symbol(&self) -> &str { "F" }
    fn supports(&self, probe: Probe) -> bool {
        probe == Probe::TxtFile
    }
    fn check(&self, _: Probe, _: &Path) -> CheckResult {
        CheckResult::failed(
            "Document is too broken",
            vec!["line 1: broken".to_string()],
        )
    }
}
