use crate::device::traits::RouteId;
use crate::error::ToolkitError;

/// Per-route result of a batch submission.
#[derive(Debug, Default)]
pub struct OperationSummary {
    pub completed: Vec<RouteId>,
    /// Routes dropped because an operation with the same key was already running.
    pub skipped: Vec<RouteId>,
    pub failed: Vec<(RouteId, ToolkitError)>,
}

impl OperationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn first_error(&self) -> Option<&ToolkitError> {
        self.failed.first().map(|(_, e)| e)
    }

    pub(crate) fn sort(&mut self) {
        self.completed.sort();
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
    }
}
