use crate::events::{EVENT_OBJECT_NAMECHANGE, EVENT_SYSTEM_FOREGROUND};

/// Callback выполняется вне процесса, который сгенерировал событие
pub const WINEVENT_OUTOFCONTEXT: u32 = 0x0000;
/// Не вызывать callback для событий потока, установившего hook
pub const WINEVENT_SKIPOWNTHREAD: u32 = 0x0001;
/// Не вызывать callback для событий своего процесса
pub const WINEVENT_SKIPOWNPROCESS: u32 = 0x0002;
/// Callback загружается в адресное пространство процесса-источника
pub const WINEVENT_INCONTEXT: u32 = 0x0004;

/// Диапазон идентификаторов событий для одного `SetWinEventHook`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRange {
    pub min: u32,
    pub max: u32,
}

impl EventRange {
    pub fn single(event: u32) -> Self {
        Self {
            min: event,
            max: event,
        }
    }

    pub fn contains(&self, event: u32) -> bool {
        self.min <= event && event <= self.max
    }
}

/// Именованные флаги контекста вместо магических чисел `WINEVENT_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookFlags {
    /// Callback не вызывается для событий потока подписчика
    pub skip_own_thread: bool,
    /// Callback не вызывается для событий процесса подписчика
    pub skip_own_process: bool,
    /// Callback выполняется в нашем процессе, а не в процессе-источнике
    pub out_of_context: bool,
}

impl Default for HookFlags {
    fn default() -> Self {
        Self {
            skip_own_thread: true,
            skip_own_process: false,
            out_of_context: true,
        }
    }
}

impl HookFlags {
    pub fn to_raw(&self) -> u32 {
        let mut flags = if self.out_of_context {
            WINEVENT_OUTOFCONTEXT
        } else {
            WINEVENT_INCONTEXT
        };
        if self.skip_own_thread {
            flags |= WINEVENT_SKIPOWNTHREAD;
        }
        if self.skip_own_process {
            flags |= WINEVENT_SKIPOWNPROCESS;
        }
        flags
    }
}

/// Параметры регистрации hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOptions {
    pub ranges: Vec<EventRange>,
    pub flags: HookFlags,
    /// 0 - события всех процессов
    pub process_id: u32,
    /// 0 - события всех потоков
    pub thread_id: u32,
}

impl Default for HookOptions {
    /// Два узких диапазона: смена активного окна и смена заголовка.
    fn default() -> Self {
        Self {
            ranges: vec![
                EventRange::single(EVENT_SYSTEM_FOREGROUND),
                EventRange::single(EVENT_OBJECT_NAMECHANGE),
            ],
            flags: HookFlags::default(),
            process_id: 0,
            thread_id: 0,
        }
    }
}

impl HookOptions {
    pub fn with_flags(mut self, flags: HookFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn covers(&self, event: u32) -> bool {
        self.ranges.iter().any(|range| range.contains(event))
    }
}
