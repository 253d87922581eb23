//! Per-person execution state of one top-level module

use serde::Serialize;

use crate::core::types::Timestamp;
use crate::modules::graph::Module;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstanceStatus {
    Running,
    /// Reached the Terminal state of its root module
    Completed,
    /// Stopped by death or by a runtime failure
    Halted,
}

/// Where to resume once a called submodule terminates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallFrame {
    /// Caller module
    pub module: String,
    /// CallSubmodule state of the caller
    pub state: String,
    /// Caller state to enter on return
    pub return_to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleInstance {
    /// Top-level module this instance was started for
    pub root: String,
    /// Module currently executing (the root or a called submodule)
    pub module: String,
    pub state: String,
    /// When the current state was entered
    pub entered: Timestamp,
    /// Release time of the current Delay, once sampled
    pub release: Option<Timestamp>,
    pub stack: Vec<CallFrame>,
    pub status: InstanceStatus,
}

impl ModuleInstance {
    /// New instance sitting in the module's Initial state
    pub fn new(module: &Module, time: Timestamp) -> Self {
        Self {
            root: module.name.clone(),
            module: module.name.clone(),
            state: module.initial().to_string(),
            entered: time,
            release: None,
            stack: Vec::new(),
            status: InstanceStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }

    /// Current submodule nesting depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn halt(&mut self) {
        if self.is_running() {
            self.status = InstanceStatus::Halted;
        }
    }

    /// Move to `state` in the active module
    pub(crate) fn enter(&mut self, state: &str, time: Timestamp) {
        self.state = state.to_string();
        self.entered = time;
        self.release = None;
    }
}
