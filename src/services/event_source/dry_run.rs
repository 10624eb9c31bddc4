use crate::error::Result;
use crate::events::{RawWinEvent, WindowHandle};
use crate::services::window_query::dry_run::FAKE_WINDOWS;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::hook::HookOptions;
use super::r#trait::{EventSource, HookId, WinEventSink};

/// Эмуляция WinEvent: по кругу переключает фейковые окна и меняет им заголовок.
pub struct DryRunEventSource {
    interval: Duration,
    next_id: AtomicU64,
    stops: Mutex<HashMap<HookId, std_mpsc::Sender<()>>>,
}

impl DryRunEventSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_id: AtomicU64::new(1),
            stops: Mutex::new(HashMap::new()),
        }
    }
}

impl EventSource for DryRunEventSource {
    fn register(&self, options: &HookOptions, sink: Arc<dyn WinEventSink>) -> Result<HookId> {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let interval = self.interval;
        let options = options.clone();

        thread::Builder::new()
            .name(format!("ncw-dry-run-{}", id.0))
            .spawn(move || {
                info!("Dry-run режим - события окон эмулируются ({})", id);
                let mut window_index = 0;

                // recv_timeout служит и таймером, и сигналом остановки
                while let Err(std_mpsc::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                    let handle = WindowHandle::from_raw(FAKE_WINDOWS[window_index].0);

                    for event in [RawWinEvent::foreground(handle), RawWinEvent::name_change(handle)] {
                        if options.covers(event.event) {
                            debug!("Dry-run: событие 0x{:X} для окна {}", event.event, handle);
                            sink.on_event(event);
                        }
                    }

                    window_index = (window_index + 1) % FAKE_WINDOWS.len();
                }

                info!("Dry-run эмуляция остановлена ({})", id);
            })?;

        self.stops.lock().insert(id, stop_tx);
        Ok(id)
    }

    fn unregister(&self, hook: HookId) -> bool {
        match self.stops.lock().remove(&hook) {
            Some(stop) => {
                // Поток мог уже выйти сам, это не ошибка
                let _ = stop.send(());
                true
            }
            None => {
                warn!("Попытка снять неизвестный hook {}", hook);
                false
            }
        }
    }
}
