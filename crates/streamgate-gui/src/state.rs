use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ── Gate ──────────────────────────────────────────────────────────────────────

/// Session gate: one in-memory boolean, set once on login and never reset.
///
/// There is deliberately no credential check here; real authentication is an
/// external collaborator this client does not implement.
#[derive(Debug, Default)]
pub struct Gate {
    authenticated: bool,
}

impl Gate {
    /// Flip the flag. Idempotent once true.
    pub fn login(&mut self) {
        self.authenticated = true;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

// ── GuiState ──────────────────────────────────────────────────────────────────

pub struct GuiState {
    pub gate: Gate,
    pub logs: VecDeque<String>,
}

impl Default for GuiState {
    fn default() -> Self {
        Self {
            gate: Gate::default(),
            logs: VecDeque::new(),
        }
    }
}

impl GuiState {
    /// Append a line to the circular log buffer (max 300 entries).
    pub fn push_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!("[GUI log] {}", line);
        if self.logs.len() >= 300 {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }
}

/// Shared handle passed between the GUI thread and the async viewer task.
pub type SharedState = Arc<Mutex<GuiState>>;
