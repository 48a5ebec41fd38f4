//! File lifecycle management.
//!
//! Submission artifacts are keyed by (name, revision, extension) and move
//! between three same-filesystem locations: the transient staging area, the
//! permanent repository, and the archive for superseded revisions. Each
//! move is a single rename; there is no cross-file atomicity, so promotion
//! is written to be safely re-runnable.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;

#[derive(Debug, Fail)]
pub enum PromoteError {
    /// A file type the submission declared as present exists neither in
    /// staging nor in the repository. This is a fatal inconsistency.
    #[fail(display = "Intended to move {:?} to {:?}, but found source and \
        destination missing", source, dest)]
    MissingFile { source: PathBuf, dest: PathBuf },
    #[fail(display = "System error: {}", _0)]
    Io(#[cause] io::Error),
}

impl_from! { for PromoteError ;
    io::Error => |e| PromoteError::Io(e),
}

pub fn staging_path(config: &Config, name: &str, rev: &str, ext: &str) -> PathBuf {
    artifact_path(&config.paths.staging, name, rev, ext)
}

pub fn repository_path(config: &Config, name: &str, rev: &str, ext: &str) -> PathBuf {
    artifact_path(&config.paths.repository, name, rev, ext)
}

pub fn archive_path(config: &Config, name: &str, rev: &str, ext: &str) -> PathBuf {
    artifact_path(&config.paths.archive, name, rev, ext)
}

fn artifact_path(root: &Path, name: &str, rev: &str, ext: &str) -> PathBuf {
    let ext = ext.trim_start_matches('.');
    root.join(format!("{}-{}.{}", name, rev, ext))
}

/// Map of staged artifacts by extension, restricted to files that exist.
pub fn find_submission_filenames(
    config: &Config,
    name: &str,
    rev: &str,
) -> BTreeMap<String, PathBuf> {
    config.submission.file_types
        .iter()
        .map(|ext| (ext.clone(), staging_path(config, name, rev, ext)))
        .filter(|(_, path)| path.exists())
        .collect()
}

/// Move a submission's staged files into the permanent repository.
///
/// Idempotent: a file already promoted is logged and skipped. A declared
/// file type with neither a staged nor a repository copy raises, as the
/// corpus would otherwise silently lose an artifact.
pub fn move_files_to_repository(
    config: &Config,
    name: &str,
    rev: &str,
    declared: &[String],
) -> Result<(), PromoteError> {
    for ext in &config.submission.file_types {
        let source = staging_path(config, name, rev, ext);
        let dest = repository_path(config, name, rev, ext);

        if source.exists() {
            fs::rename(&source, &dest)?;
        } else if dest.exists() {
            info!("Intended to move {:?} to {:?}, but found source missing \
                while destination exists", source, dest);
        } else if declared.iter().any(|d| d == ext) {
            return Err(PromoteError::MissingFile { source, dest });
        }
    }

    Ok(())
}

/// Relocate all repository files of a superseded revision into the archive.
pub fn move_files_to_archive(
    config: &Config,
    name: &str,
    prev_rev: &str,
) -> io::Result<()> {
    for ext in &config.submission.file_types {
        let source = repository_path(config, name, prev_rev, ext);
        if source.exists() {
            fs::rename(&source, archive_path(config, name, prev_rev, ext))?;
        }
    }

    Ok(())
}

/// Delete staged files for a submission. Missing files are not an error.
pub fn remove_staging_files(
    config: &Config,
    name: &str,
    rev: &str,
    exts: Option<&[String]>,
) -> io::Result<()> {
    let exts = match exts {
        Some(exts) => exts.to_vec(),
        None => config.submission.file_types.clone(),
    };

    for ext in &exts {
        let path = staging_path(config, name, rev, ext);
        match fs::remove_file(&path) {
            Ok(()) => (),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Cleanup path for a cancelled submission.
pub fn remove_submission_files(
    config: &Config,
    name: &str,
    rev: &str,
    declared: &[String],
) -> io::Result<()> {
    remove_staging_files(config, name, rev, Some(declared))
}

/// Any files already present for (name, rev) in the repository or archive,
/// as file names. Used to reject a revision that would collide with
/// history.
pub fn existing_archived_files(
    config: &Config,
    name: &str,
    rev: &str,
) -> Vec<String> {
    let prefix = format!("{}-{}.", name, rev);
    let mut found = Vec::new();

    for dir in &[&config.paths.repository, &config.paths.archive] {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&prefix) {
                found.push(file_name.into_owned());
            }
        }
    }

    found.sort();
    found
}
