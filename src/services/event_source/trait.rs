use crate::error::Result;
use crate::events::RawWinEvent;
use std::fmt;
use std::sync::Arc;

use super::hook::HookOptions;

/// Receiver of raw WinEvent callbacks.
///
/// Called on the thread where the OS delivers events. Implementations may block
/// (the relay does, until the event is acknowledged downstream), which also
/// blocks delivery of the next event.
pub trait WinEventSink: Send + Sync {
    fn on_event(&self, event: RawWinEvent);
}

/// Identifier of one registration returned by [`EventSource::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Capability-scoped access to the OS event hook.
///
/// Exactly two operations: install a hook that feeds `sink`, and remove it.
/// Message pumping required by the platform is the implementation's concern.
pub trait EventSource: Send + Sync {
    /// Install the hook. Failure is reported synchronously and never retried.
    fn register(&self, options: &HookOptions, sink: Arc<dyn WinEventSink>) -> Result<HookId>;

    /// Remove the hook. Returns `false` if it was unknown or could not be removed.
    fn unregister(&self, hook: HookId) -> bool;
}
