use crate::error::{NcwError, Result};
use crate::events::{RawWinEvent, WindowHandle};
use crate::ncw_error;
use crate::services::window_query::win32::module_handle;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use tracing::{debug, error, info, warn};
use windows::Win32::Foundation::{HMODULE, HWND, LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW, TranslateMessage, MSG,
    PM_NOREMOVE, WM_QUIT,
};

use super::hook::HookOptions;
use super::r#trait::{EventSource, HookId, WinEventSink};

thread_local! {
    // Sink подписки, чей hook установлен в этом потоке. У каждой подписки свой поток.
    static SINK: RefCell<Option<Arc<dyn WinEventSink>>> = const { RefCell::new(None) };
}

/// Поток, в котором установлены hook'и и крутится цикл сообщений
struct PumpThread {
    thread_id: u32,
    // Поток завершается сам после WM_QUIT, join не нужен
    _join: thread::JoinHandle<()>,
}

/// Источник событий на `SetWinEventHook`.
///
/// Out-of-context callback доставляется через очередь сообщений потока,
/// который установил hook, поэтому каждая регистрация получает отдельный
/// поток с постоянным циклом `GetMessageW`. Этот же поток снимает hook после
/// `WM_QUIT`, как того требует `UnhookWinEvent`.
pub struct Win32EventSource {
    next_id: AtomicU64,
    pumps: Mutex<HashMap<HookId, PumpThread>>,
}

impl Default for Win32EventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Win32EventSource {
    pub fn new() -> Self {
        info!("Инициализация Win32EventSource");
        Self {
            next_id: AtomicU64::new(1),
            pumps: Mutex::new(HashMap::new()),
        }
    }
}

impl EventSource for Win32EventSource {
    fn register(&self, options: &HookOptions, sink: Arc<dyn WinEventSink>) -> Result<HookId> {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let options = options.clone();

        let join = thread::Builder::new()
            .name(format!("ncw-winevent-{}", id.0))
            .spawn(move || run_pump(id, options, sink, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                info!("WinEvent hook {} установлен, поток сообщений {}", id, thread_id);
                self.pumps.lock().insert(
                    id,
                    PumpThread {
                        thread_id,
                        _join: join,
                    },
                );
                Ok(id)
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(ncw_error!(
                    internal,
                    "Поток сообщений {} завершился до установки hook",
                    id
                ))
            }
        }
    }

    fn unregister(&self, hook: HookId) -> bool {
        let Some(pump) = self.pumps.lock().remove(&hook) else {
            warn!("Попытка снять неизвестный hook {}", hook);
            return false;
        };

        match unsafe { PostThreadMessageW(pump.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            Ok(()) => {
                debug!("WM_QUIT отправлен в поток {} ({})", pump.thread_id, hook);
                true
            }
            Err(e) => {
                error!("Не удалось остановить поток сообщений {}: {}", pump.thread_id, e);
                false
            }
        }
    }
}

fn run_pump(
    id: HookId,
    options: HookOptions,
    sink: Arc<dyn WinEventSink>,
    ready: std_mpsc::Sender<Result<u32>>,
) {
    SINK.with(|slot| *slot.borrow_mut() = Some(sink));

    // Создаём очередь сообщений потока до того, как в неё сможет прийти WM_QUIT
    let mut msg = MSG::default();
    unsafe {
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
    }
    let thread_id = unsafe { GetCurrentThreadId() };

    let hooks = match install_hooks(&options) {
        Ok(hooks) => hooks,
        Err(e) => {
            SINK.with(|slot| slot.borrow_mut().take());
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(thread_id)).is_err() {
        unhook_all(&hooks);
        SINK.with(|slot| slot.borrow_mut().take());
        return;
    }

    loop {
        let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match ret.0 {
            0 => break,
            -1 => {
                error!("GetMessageW вернул ошибку в потоке {} ({})", thread_id, id);
                break;
            }
            _ => unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            },
        }
    }

    unhook_all(&hooks);
    SINK.with(|slot| slot.borrow_mut().take());
    info!("Поток сообщений {} завершён, hook {} снят", thread_id, id);
}

fn install_hooks(options: &HookOptions) -> Result<Vec<HWINEVENTHOOK>> {
    let module = if options.flags.out_of_context {
        HMODULE::default()
    } else {
        module_handle()?
    };
    let flags = options.flags.to_raw();

    let mut hooks = Vec::with_capacity(options.ranges.len());
    for range in &options.ranges {
        let hook = unsafe {
            SetWinEventHook(
                range.min,
                range.max,
                module,
                Some(win_event_callback),
                options.process_id,
                options.thread_id,
                flags,
            )
        };

        if hook.is_invalid() {
            unhook_all(&hooks);
            return Err(NcwError::HookRegistration(format!(
                "SetWinEventHook не сработал для событий 0x{:X}-0x{:X} (флаги 0x{:X})",
                range.min, range.max, flags
            )));
        }

        debug!(
            "SetWinEventHook 0x{:X}-0x{:X}: {:?}",
            range.min, range.max, hook
        );
        hooks.push(hook);
    }

    Ok(hooks)
}

fn unhook_all(hooks: &[HWINEVENTHOOK]) {
    for hook in hooks {
        if !unsafe { UnhookWinEvent(*hook) }.as_bool() {
            warn!("Не удалось снять WinEvent hook: {:?}", hook);
        }
    }
}

unsafe extern "system" fn win_event_callback(
    _hook: HWINEVENTHOOK,
    event: u32,
    hwnd: HWND,
    id_object: i32,
    id_child: i32,
    id_event_thread: u32,
    dwms_event_time: u32,
) {
    let raw = RawWinEvent {
        event,
        handle: WindowHandle::from_raw(hwnd.0 as isize),
        object_id: id_object,
        child_id: id_child,
        event_thread: id_event_thread,
        event_time_ms: dwms_event_time,
    };

    // Паника не должна пересечь границу extern "system"
    if std::panic::catch_unwind(|| dispatch(raw)).is_err() {
        error!("Паника в WinEvent callback для события 0x{:X}", event);
    }
}

fn dispatch(raw: RawWinEvent) {
    // Arc клонируется, чтобы не держать RefCell занятым, пока sink блокируется
    let sink = SINK.with(|slot| slot.borrow().clone());
    if let Some(sink) = sink {
        sink.on_event(raw);
    }
}
