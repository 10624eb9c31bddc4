pub mod window;

pub use window::{BoundingRect, WindowChangeNotification, WindowEventKind, WindowHandle};

/// Смена активного окна
pub const EVENT_SYSTEM_FOREGROUND: u32 = 0x0003;
/// Смена имени объекта (для окна это заголовок)
pub const EVENT_OBJECT_NAMECHANGE: u32 = 0x800C;
/// Объект события - само окно, а не его дочерний элемент
pub const OBJID_WINDOW: i32 = 0;

/// Сырое событие WinEvent в том виде, в каком его передаёт callback ОС
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawWinEvent {
    pub event: u32,
    pub handle: WindowHandle,
    pub object_id: i32,
    pub child_id: i32,
    pub event_thread: u32,
    pub event_time_ms: u32,
}

impl RawWinEvent {
    pub fn new(event: u32, handle: WindowHandle, object_id: i32) -> Self {
        Self {
            event,
            handle,
            object_id,
            child_id: 0,
            event_thread: 0,
            event_time_ms: 0,
        }
    }

    pub fn foreground(handle: WindowHandle) -> Self {
        Self::new(EVENT_SYSTEM_FOREGROUND, handle, OBJID_WINDOW)
    }

    pub fn name_change(handle: WindowHandle) -> Self {
        Self::new(EVENT_OBJECT_NAMECHANGE, handle, OBJID_WINDOW)
    }
}
