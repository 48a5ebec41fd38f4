//! The external renderer collaborator.
//!
//! Rendering converts a staged structured-markup draft into plain-text and
//! HTML siblings in the same staging location, and knows how to read
//! bibliographic references back out of the rendered artifacts. The
//! implementation is external to this crate; it is expected to upgrade
//! legacy schema versions before rendering and to raise a structured error
//! on unrecoverable malformed input.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::Config;
use crate::store::models::Submission;

/// The renderer rejected the content. The submission is cancelled with
/// this message attached.
#[derive(Debug, Fail)]
#[fail(display = "Error from the renderer: {}", message)]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new<S: Into<String>>(message: S) -> RenderError {
        RenderError { message: message.into() }
    }
}

pub trait Renderer {
    /// Generate text and HTML formats from the staged structured-markup
    /// file. An existing text file is left in place; an existing HTML file
    /// is overwritten.
    fn render_missing_formats(
        &self,
        submission: &Submission,
        config: &Config,
    ) -> Result<(), RenderError>;

    /// Names of documents referenced by the rendered artifacts.
    fn extract_references(
        &self,
        files: &BTreeMap<String, PathBuf>,
    ) -> crate::Result<Vec<String>>;
}
