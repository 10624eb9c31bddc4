//! notify-change-window: уведомления о смене активного окна Windows и его заголовка.
//!
//! Точка входа - [`subscribe`] (или [`Relay::subscribe`] с собственным
//! источником событий и настройками). Уведомления приходят в переданный
//! `tokio::sync::mpsc` канал в том порядке, в каком их сгенерировала ОС.

pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{NcwError, Result};
pub use events::{BoundingRect, RawWinEvent, WindowChangeNotification, WindowEventKind, WindowHandle};
pub use services::{
    create_event_source, create_window_query, EventSource, HookFlags, HookId, HookOptions, Relay,
    RelayConfig, Subscription, TitlePolicy, WinEventSink, WindowQuery,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Подписаться на смену активного окна с настройками по умолчанию.
///
/// Устанавливает hook на foreground и смену заголовка, запускает пересылку в
/// `output` и сразу возвращается. Пересылка останавливается, а hook снимается
/// после отмены `cancel`.
pub fn subscribe(
    cancel: CancellationToken,
    output: mpsc::Sender<WindowChangeNotification>,
) -> Result<Subscription> {
    let relay = Relay::new(
        create_event_source(false)?,
        create_window_query(false),
        RelayConfig::default(),
    );
    relay.subscribe(cancel, output)
}
