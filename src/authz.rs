//! The authorization collaborator.
//!
//! Authentication and role management live outside this crate; the
//! pipeline only asks capability questions about an already-authenticated
//! person.

use std::collections::BTreeSet;

use crate::store::models::{Document, GroupId, PersonId};

pub trait Authority {
    /// Does this person hold the global approval role?
    fn holds_approval_role(&self, person: PersonId) -> bool;

    /// Does this person chair the given group?
    fn is_chair(&self, person: PersonId, group: GroupId) -> bool;

    /// May this person edit the document's external resource list
    /// directly? `None` is an unauthenticated requester.
    fn can_edit_resources(
        &self,
        person: Option<PersonId>,
        document: &Document,
    ) -> bool;
}

/// Table-backed [`Authority`] for tests and simple deployments.
#[derive(Debug, Default)]
pub struct StaticAuthority {
    approvers: BTreeSet<PersonId>,
    chairs: BTreeSet<(PersonId, GroupId)>,
    resource_editors: BTreeSet<PersonId>,
}

impl StaticAuthority {
    pub fn new() -> StaticAuthority {
        StaticAuthority::default()
    }

    pub fn grant_approval_role(&mut self, person: PersonId) {
        self.approvers.insert(person);
    }

    pub fn grant_chair(&mut self, person: PersonId, group: GroupId) {
        self.chairs.insert((person, group));
    }

    pub fn grant_resource_edit(&mut self, person: PersonId) {
        self.resource_editors.insert(person);
    }
}

impl Authority for StaticAuthority {
    fn holds_approval_role(&self, person: PersonId) -> bool {
        self.approvers.contains(&person)
    }

    fn is_chair(&self, person: PersonId, group: GroupId) -> bool {
        self.chairs.contains(&(person, group))
    }

    fn can_edit_resources(
        &self,
        person: Option<PersonId>,
        _document: &Document,
    ) -> bool {
        match person {
            Some(id) => {
                self.resource_editors.contains(&id)
                    || self.approvers.contains(&id)
            }
            None => false,
        }
    }
}
