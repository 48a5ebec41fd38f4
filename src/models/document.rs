//! Document-side helpers: stream inference and author maintenance.

use crate::models::person::ensure_person_email_info_exists;
use crate::store::State;
use crate::store::models::{
    DocumentAuthor,
    GroupKind,
    Stream,
    Submission,
};

/// One stream inference rule. Rules are evaluated in order; the first whose
/// prefix matches (and whose group requirement, if any, is satisfied) wins.
pub struct StreamRule {
    pub prefix: &'static str,
    pub stream: Stream,
    /// The rule only applies when the document belongs to a real (non
    /// individual) group, or used to be a published document.
    pub requires_group: bool,
}

pub static STREAM_RULES: &[StreamRule] = &[
    StreamRule { prefix: "draft-iab-", stream: Stream::Iab, requires_group: false },
    StreamRule { prefix: "draft-irtf-", stream: Stream::Irtf, requires_group: false },
    StreamRule { prefix: "draft-ietf-", stream: Stream::Ietf, requires_group: true },
];

/// Infer the organizational stream from a document name prefix.
pub fn infer_stream(
    name: &str,
    group_kind: Option<GroupKind>,
    was_rfc: bool,
) -> Option<Stream> {
    STREAM_RULES
        .iter()
        .find(|rule| {
            name.starts_with(rule.prefix)
                && (!rule.requires_group
                    || group_kind.map_or(false, |k| k != GroupKind::Individual)
                    || was_rfc)
        })
        .map(|rule| rule.stream)
}

/// Resolve a claimed target name to a canonical document name, following
/// the alias table when needed.
pub fn resolve_doc_name(state: &State, name: &str) -> Option<String> {
    if state.document(name).is_some() {
        Some(name.to_string())
    } else {
        state.alias_target(name).map(|s| s.to_string())
    }
}

/// Replace a document's author list wholesale from a submission's authors.
///
/// Each author is run through identity resolution; the resulting join
/// records are inserted as one delete-and-reinsert, never patched
/// incrementally.
pub fn update_authors(state: &mut State, doc_name: &str, submission: &Submission) {
    let mut docauthors = Vec::with_capacity(submission.authors.len());

    for (order, author) in submission.authors.iter().enumerate() {
        let (person, email) = ensure_person_email_info_exists(
            state, &author.name, &author.email, &submission.name);
        docauthors.push(DocumentAuthor {
            document: doc_name.to_string(),
            person,
            email,
            affiliation: author.affiliation.clone(),
            country: author.country.clone(),
            order: order as i32,
        });
    }

    state.set_document_authors(doc_name, docauthors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_rules_match_in_order() {
        assert_eq!(infer_stream("draft-iab-foo-bar", None, false), Some(Stream::Iab));
        assert_eq!(infer_stream("draft-irtf-foo-bar", None, false), Some(Stream::Irtf));
        assert_eq!(infer_stream("draft-doe-foo-bar", None, false), None);
    }

    #[test]
    fn ietf_stream_requires_a_group() {
        assert_eq!(infer_stream("draft-ietf-foo-bar", None, false), None);
        assert_eq!(
            infer_stream("draft-ietf-foo-bar", Some(GroupKind::Individual), false),
            None,
        );
        assert_eq!(
            infer_stream("draft-ietf-foo-bar", Some(GroupKind::WorkingGroup), false),
            Some(Stream::Ietf),
        );
        // A formerly published document keeps the stream even without one.
        assert_eq!(
            infer_stream("draft-ietf-foo-bar", Some(GroupKind::Individual), true),
            Some(Stream::Ietf),
        );
    }
}
