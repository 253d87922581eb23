//! Module graph - one immutable state machine

use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

use crate::modules::state::{State, StateKind};
use crate::rules::transition::{LookupTransition, Transition};

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    /// Submodules are only entered through CallSubmodule, never attached directly
    pub submodule: bool,
    states: AHashMap<String, State>,
    /// State names in declaration order
    order: Vec<String>,
    initial: String,
}

impl Module {
    /// Assemble a graph from already-converted states
    ///
    /// Only the Initial state is located here; the loader runs the remaining
    /// structural checks.
    pub(crate) fn from_parts(
        name: String,
        submodule: bool,
        states: AHashMap<String, State>,
        order: Vec<String>,
        initial: String,
    ) -> Self {
        Self {
            name,
            submodule,
            states,
            order,
            initial,
        }
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// States in declaration order
    pub fn states(&self) -> impl Iterator<Item = &State> + '_ {
        self.order.iter().filter_map(move |name| self.states.get(name))
    }

    /// (state, submodule) for every CallSubmodule state
    pub fn submodule_calls(&self) -> Vec<(&str, &str)> {
        self.states()
            .filter_map(|state| match &state.kind {
                StateKind::CallSubmodule(target) => Some((state.name.as_str(), target.as_str())),
                _ => None,
            })
            .collect()
    }

    /// (state, transition) for every LookupTable transition
    pub fn lookup_tables(&self) -> Vec<(&str, &LookupTransition)> {
        self.states()
            .filter_map(|state| match &state.transition {
                Some(Transition::LookupTable(lookup)) => Some((state.name.as_str(), lookup)),
                _ => None,
            })
            .collect()
    }

    /// Names of every state reachable from the Initial state
    pub fn reachable(&self) -> AHashSet<&str> {
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.initial.as_str());

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name) {
                continue;
            }
            let Some(state) = self.states.get(name) else {
                continue;
            };
            if let Some(transition) = &state.transition {
                for target in transition.targets() {
                    if !seen.contains(target) {
                        queue.push_back(target);
                    }
                }
            }
        }
        seen
    }
}
