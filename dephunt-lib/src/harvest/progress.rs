//! Operator feedback for discovery and dispatch.

/// How far a counted batch has come.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: u64,
    pub done: u64,
    pub message: String,
}

/// Polled by the reporter while a counted batch runs.
pub type TallyFn = Box<dyn Fn() -> Tally + Send + Sync + 'static>;

/// Polled by the reporter while work of unknown size runs.
pub type StatusFn = Box<dyn Fn() -> String + Send + Sync + 'static>;

/// Receives progress from an ecosystem run.
///
/// Work is pull-based: the harvest code registers a callback and the
/// implementation polls it at whatever rate suits its display.
pub trait Progress: Send + Sync {
    /// Label the current stage, such as "Fetching npm".
    fn set_phase(&self, phase: &str);

    /// Switch to a counted display driven by `tally`.
    fn set_determinate(&self, tally: TallyFn);

    /// Switch to an open-ended display driven by `status`.
    fn set_indeterminate(&self, status: StatusFn);

    /// Tear down the display.
    fn done(&self);
}

/// Progress sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn set_phase(&self, _phase: &str) {}
    fn set_determinate(&self, _tally: TallyFn) {}
    fn set_indeterminate(&self, _status: StatusFn) {}
    fn done(&self) {}
}
