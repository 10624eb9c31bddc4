//! WindowQuery service: direct synchronous OS queries (title, rectangle,
//! owning process) for a window handle. No state, no caching, no retries.

pub mod dry_run;
mod r#trait;
#[cfg(windows)]
pub mod win32;

pub use self::r#trait::WindowQuery;

use std::sync::Arc;

/// Factory function to create the window query matching the event source
pub fn create_window_query(dry_run: bool) -> Arc<dyn WindowQuery> {
    if dry_run {
        return Arc::new(dry_run::DryRunWindowQuery::new());
    }

    #[cfg(windows)]
    {
        Arc::new(win32::Win32WindowQuery::new())
    }

    #[cfg(not(windows))]
    {
        Arc::new(dry_run::DryRunWindowQuery::new())
    }
}
