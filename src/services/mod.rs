pub mod event_source;
pub mod relay;
pub mod window_query;

pub use event_source::{create_event_source, EventSource, HookFlags, HookId, HookOptions, WinEventSink};
pub use relay::{Relay, RelayConfig, Subscription, TitlePolicy};
pub use window_query::{create_window_query, WindowQuery};
