use std::fmt;

/// Lifecycle phase of an [`crate::Engine`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    /// Informers are listing; no worker exists yet
    Syncing,
    Running,
    /// Queue shut down, waiting for in-flight reconciles
    ShuttingDown,
    Stopped,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::NotStarted => "not_started",
            EngineState::Syncing => "syncing",
            EngineState::Running => "running",
            EngineState::ShuttingDown => "shutting_down",
            EngineState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
