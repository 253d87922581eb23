//! Seam for external collaborators
//!
//! Demographics, vital-sign models and similar data sources live outside the
//! interpreter. They write into the person through the same attribute store
//! and vital-sign contract the module states use.

use crate::core::types::Timestamp;
use crate::entity::person::Person;

/// Writes externally computed facts into a person
///
/// Shared by every worker, hence `Sync`. Implementations that need randomness
/// must draw from `person.rng` to keep the run reproducible.
pub trait Collaborator: Sync {
    /// Called once before the first tick; may also move `person.birth`
    fn on_birth(&self, _person: &mut Person) {}

    /// Called at the start of every tick, before any module is stepped
    fn before_tick(&self, _person: &mut Person, _time: Timestamp) {}
}

/// Collaborator that writes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollaborators;

impl Collaborator for NoCollaborators {}

impl<T: Collaborator + ?Sized> Collaborator for &T {
    fn on_birth(&self, person: &mut Person) {
        (**self).on_birth(person)
    }

    fn before_tick(&self, person: &mut Person, time: Timestamp) {
        (**self).before_tick(person, time)
    }
}
