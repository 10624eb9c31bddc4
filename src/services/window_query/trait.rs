use crate::error::Result;
use crate::events::{BoundingRect, WindowHandle};

/// Synchronous, stateless queries against a window handle.
///
/// Every call is independent. `title` and `bounding_rect` never fail: a stale
/// or inaccessible handle yields an empty string / zeroed rectangle and the
/// failure is logged. Only `process_name` reports errors to the caller.
pub trait WindowQuery: Send + Sync {
    fn title(&self, handle: WindowHandle) -> String;

    fn bounding_rect(&self, handle: WindowHandle) -> BoundingRect;

    /// Executable basename of the process owning the window, e.g. `app.exe`.
    fn process_name(&self, handle: WindowHandle) -> Result<String>;
}
