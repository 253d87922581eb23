use thiserror::Error;

/// Structural problems found while loading module descriptions or lookup tables.
///
/// These are fatal for the offending module: it never reaches the registry.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Module '{module}': state '{state}' is defined more than once")]
    DuplicateState { module: String, state: String },

    #[error("Module '{module}' is already registered")]
    DuplicateModule { module: String },

    #[error("Lookup table '{table}' is already registered")]
    DuplicateTable { table: String },

    #[error("Module '{module}' has no Initial state")]
    MissingInitial { module: String },

    #[error("Module '{module}' has more than one Initial state: {states:?}")]
    MultipleInitial { module: String, states: Vec<String> },

    #[error("Module '{module}': no Terminal state is reachable from the Initial state")]
    NoReachableTerminal { module: String },

    #[error("Module '{module}': state '{state}' is invalid: {reason}")]
    InvalidState {
        module: String,
        state: String,
        reason: String,
    },

    #[error("Module '{module}': state '{state}' must declare exactly one transition")]
    MissingTransition { module: String, state: String },

    #[error("Module '{module}': state '{state}' declares more than one transition")]
    MultipleTransitions { module: String, state: String },

    #[error("Module '{module}': Terminal state '{state}' must not declare a transition")]
    UnexpectedTransition { module: String, state: String },

    #[error("Module '{module}': state '{state}' transitions to unknown state '{target}'")]
    MissingTarget {
        module: String,
        state: String,
        target: String,
    },

    #[error("Module '{module}': state '{state}' has weights summing to {sum}, expected 1.0")]
    WeightsDoNotSumToOne {
        module: String,
        state: String,
        sum: f64,
    },

    #[error("Module '{module}': state '{state}' has a default clause that is not last")]
    DefaultClauseNotLast { module: String, state: String },

    #[error("Module '{module}': state '{state}' has more than one default clause")]
    MultipleDefaultClauses { module: String, state: String },

    #[error("Module '{module}': state '{state}' uses a compound condition in a conditional transition")]
    CompoundConditionInConditional { module: String, state: String },

    #[error("Module '{module}': state '{state}' calls unknown submodule '{submodule}'")]
    UnknownSubmodule {
        module: String,
        state: String,
        submodule: String,
    },

    #[error("Cyclic submodule references: {}", .cycle.join(" -> "))]
    CyclicSubmodule { cycle: Vec<String> },

    #[error("Module '{module}': state '{state}' references unknown lookup table '{table}'")]
    UnknownLookupTable {
        module: String,
        state: String,
        table: String,
    },

    #[error("Module '{module}': state '{state}' keys lookup table '{table}' with {attributes} attributes, but it has {columns} columns")]
    LookupKeyMismatch {
        module: String,
        state: String,
        table: String,
        attributes: usize,
        columns: usize,
    },

    #[error("Lookup table '{table}' is invalid: {reason}")]
    InvalidLookupTable { table: String, reason: String },
}

impl LoadError {
    /// Name of the module this error rejects, if it is module-specific
    pub fn module(&self) -> Option<&str> {
        match self {
            LoadError::DuplicateState { module, .. }
            | LoadError::DuplicateModule { module }
            | LoadError::MissingInitial { module }
            | LoadError::MultipleInitial { module, .. }
            | LoadError::NoReachableTerminal { module }
            | LoadError::InvalidState { module, .. }
            | LoadError::MissingTransition { module, .. }
            | LoadError::MultipleTransitions { module, .. }
            | LoadError::UnexpectedTransition { module, .. }
            | LoadError::MissingTarget { module, .. }
            | LoadError::WeightsDoNotSumToOne { module, .. }
            | LoadError::DefaultClauseNotLast { module, .. }
            | LoadError::MultipleDefaultClauses { module, .. }
            | LoadError::CompoundConditionInConditional { module, .. }
            | LoadError::UnknownSubmodule { module, .. }
            | LoadError::UnknownLookupTable { module, .. }
            | LoadError::LookupKeyMismatch { module, .. } => Some(module.as_str()),
            LoadError::CyclicSubmodule { cycle } => cycle.first().map(String::as_str),
            _ => None,
        }
    }
}

/// Runtime failure while stepping one entity.
///
/// Terminates that entity's simulation only; the population run continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    #[error("Module '{module}' has no state '{state}'")]
    UnknownState { module: String, state: String },

    #[error("Module '{module}' state '{state}' has no transition to follow")]
    MissingTransition { module: String, state: String },

    #[error("Module '{module}' state '{state}': no transition clause matched")]
    NoTransitionMatched { module: String, state: String },

    #[error("Lookup table '{0}' is not registered")]
    UnknownLookupTable(String),

    #[error("Submodule call depth {depth} exceeded in module '{module}'")]
    CallDepthExceeded { module: String, depth: usize },

    #[error("More than {limit} state transitions in one tick in module '{module}' (at '{state}')")]
    TransitionLimit {
        module: String,
        state: String,
        limit: usize,
    },
}

/// Run-level failures of a population simulation
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
