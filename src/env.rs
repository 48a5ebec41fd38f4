//! Pipeline environment.
//!
//! Bundles the corpus store, configuration and the external collaborators,
//! so pipeline functions take one handle instead of a parameter list. The
//! well-known system identity is resolved once, at construction time, and
//! injected everywhere an unauthenticated action needs an actor.

use crate::authz::Authority;
use crate::checks::Checker;
use crate::config::Config;
use crate::notify::Notifier;
use crate::render::Renderer;
use crate::store::Store;
use crate::store::models::PersonId;

pub const SYSTEM_NAME: &str = "(System)";

pub struct Env<'a> {
    pub store: &'a Store,
    pub config: &'a Config,
    pub renderer: &'a dyn Renderer,
    pub notifier: &'a dyn Notifier,
    pub authority: &'a dyn Authority,
    pub checkers: &'a [Box<dyn Checker>],
    system: PersonId,
}

impl<'a> Env<'a> {
    pub fn new(
        store: &'a Store,
        config: &'a Config,
        renderer: &'a dyn Renderer,
        notifier: &'a dyn Notifier,
        authority: &'a dyn Authority,
        checkers: &'a [Box<dyn Checker>],
    ) -> crate::Result<Env<'a>> {
        let system = store.transaction(|state| {
            let existing = state.persons
                .values()
                .find(|p| p.name == SYSTEM_NAME)
                .map(|p| p.id);
            Ok(match existing {
                Some(id) => id,
                None => state.create_person(SYSTEM_NAME, SYSTEM_NAME),
            })
        })?;

        Ok(Env {
            store,
            config,
            renderer,
            notifier,
            authority,
            checkers,
            system,
        })
    }

    /// The sentinel identity actions are attributed to when no
    /// authenticated person exists.
    pub fn system(&self) -> PersonId {
        self.system
    }
}
