use crate::debug_if_enabled;
use crate::events::{
    RawWinEvent, WindowChangeNotification, WindowEventKind, WindowHandle, EVENT_OBJECT_NAMECHANGE,
    EVENT_SYSTEM_FOREGROUND, OBJID_WINDOW,
};
use crate::services::event_source::WinEventSink;
use crate::services::window_query::WindowQuery;
use crate::trace_if_enabled;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::TitlePolicy;

/// Уведомление вместе с одноразовым подтверждением приёма
pub(crate) struct Relayed {
    pub notification: WindowChangeNotification,
    pub ack: oneshot::Sender<()>,
}

/// Чем закончилась передача одного события
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Событие не отслеживается
    Ignored,
    /// Пересылающая задача передала уведомление потребителю
    Delivered,
    /// Подписка отменена, пока callback ждал
    Cancelled,
    /// Пересылающая задача завершилась без подтверждения
    Closed,
}

/// Сторона callback ОС: классифицирует событие, собирает уведомление и
/// блокируется до подтверждения пересылающей задачей или отмены.
pub(crate) struct RelayProducer {
    relay_tx: mpsc::Sender<Relayed>,
    cancel: CancellationToken,
    runtime: Handle,
    query: Arc<dyn WindowQuery>,
    title_policy: TitlePolicy,
    prefetch: bool,
    resolve_process_name: bool,
    // Последнее активное окно. Пишется и читается только в потоке callback.
    last_active: AtomicIsize,
}

impl RelayProducer {
    pub fn new(
        relay_tx: mpsc::Sender<Relayed>,
        cancel: CancellationToken,
        runtime: Handle,
        query: Arc<dyn WindowQuery>,
        config: &super::RelayConfig,
    ) -> Self {
        Self {
            relay_tx,
            cancel,
            runtime,
            query,
            title_policy: config.title_policy,
            prefetch: config.prefetch,
            resolve_process_name: config.resolve_process_name,
            last_active: AtomicIsize::new(WindowHandle::NULL.as_raw()),
        }
    }

    pub fn classify(&self, event: &RawWinEvent) -> Option<WindowEventKind> {
        match event.event {
            EVENT_SYSTEM_FOREGROUND => {
                self.last_active
                    .store(event.handle.as_raw(), Ordering::Relaxed);
                Some(WindowEventKind::ForegroundChanged)
            }
            EVENT_OBJECT_NAMECHANGE if event.object_id == OBJID_WINDOW => match self.title_policy {
                TitlePolicy::AllWindows => Some(WindowEventKind::TitleChanged),
                TitlePolicy::ForegroundOnly
                    if self.last_active.load(Ordering::Relaxed) == event.handle.as_raw() =>
                {
                    Some(WindowEventKind::TitleChanged)
                }
                TitlePolicy::ForegroundOnly => None,
            },
            _ => None,
        }
    }

    fn build(&self, handle: WindowHandle, kind: WindowEventKind) -> WindowChangeNotification {
        let mut notification = WindowChangeNotification::new(handle, kind);

        if self.prefetch {
            notification = notification
                .with_title(self.query.title(handle))
                .with_rect(self.query.bounding_rect(handle));
        }

        if self.resolve_process_name {
            match self.query.process_name(handle) {
                Ok(name) => notification = notification.with_process_name(name),
                Err(e) => debug!("Имя процесса для окна {} не определено: {}", handle, e),
            }
        }

        notification
    }

    pub fn handle_event(&self, event: RawWinEvent) -> RelayOutcome {
        let Some(kind) = self.classify(&event) else {
            trace_if_enabled!("Пропуск события 0x{:X} для окна {}", event.event, event.handle);
            return RelayOutcome::Ignored;
        };

        let notification = self.build(event.handle, kind);
        debug_if_enabled!("Событие окна: {}", notification);
        self.relay(notification)
    }

    /// Передать уведомление и дождаться подтверждения.
    ///
    /// Блокирует текущий поток. Нельзя вызывать из async контекста tokio.
    pub fn relay(&self, notification: WindowChangeNotification) -> RelayOutcome {
        if self.cancel.is_cancelled() {
            return RelayOutcome::Cancelled;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let relayed = Relayed {
            notification,
            ack: ack_tx,
        };

        let pending = match self.relay_tx.try_send(relayed) {
            Ok(()) => None,
            Err(TrySendError::Full(relayed)) => {
                warn!(
                    "Буфер relay заполнен ({}), callback ждёт пересылающую задачу",
                    self.relay_tx.max_capacity()
                );
                Some(relayed)
            }
            Err(TrySendError::Closed(_)) => return RelayOutcome::Closed,
        };

        self.runtime.block_on(async {
            if let Some(relayed) = pending {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return RelayOutcome::Cancelled,
                    sent = self.relay_tx.send(relayed) => {
                        if sent.is_err() {
                            return RelayOutcome::Closed;
                        }
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => RelayOutcome::Cancelled,
                ack = ack_rx => match ack {
                    Ok(()) => RelayOutcome::Delivered,
                    Err(_) => RelayOutcome::Closed,
                },
            }
        })
    }
}

impl WinEventSink for RelayProducer {
    fn on_event(&self, event: RawWinEvent) {
        let outcome = self.handle_event(event);
        if outcome == RelayOutcome::Closed {
            debug!("Событие 0x{:X} не подтверждено: relay закрыт", event.event);
        }
    }
}
