//! EventSource service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for installing and
//! removing the OS WinEvent hook and handing raw callbacks to a
//! [`WinEventSink`]. Classifying events, querying window details and relaying
//! notifications to consumers belong to the relay.

pub mod dry_run;
pub mod hook;
mod r#trait;
#[cfg(windows)]
pub mod win32;

pub use self::hook::{EventRange, HookFlags, HookOptions};
pub use self::r#trait::{EventSource, HookId, WinEventSink};

use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Интервал эмуляции событий в dry-run режиме
pub const DRY_RUN_INTERVAL: Duration = Duration::from_secs(3);

/// Factory function to create an appropriate event source based on the dry_run flag
pub fn create_event_source(dry_run: bool) -> Result<Arc<dyn EventSource>> {
    if dry_run {
        return Ok(Arc::new(dry_run::DryRunEventSource::new(DRY_RUN_INTERVAL)));
    }

    #[cfg(windows)]
    {
        Ok(Arc::new(win32::Win32EventSource::new()))
    }

    #[cfg(not(windows))]
    {
        Err(crate::ncw_error!(
            service_unavailable,
            "WinEvent hook доступен только в Windows, используйте --dry-run"
        ))
    }
}
