use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Непрозрачный идентификатор окна (HWND).
///
/// Ничем не владеет: это лишь ключ в таблицу окон ОС. Окно может исчезнуть в
/// любой момент, поэтому запросы по устаревшему handle деградируют, а не падают.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: Self = Self(0);

    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> isize {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Прямоугольник окна в экранных координатах.
///
/// Инварианты не проверяются: для свёрнутого окна `right` может оказаться
/// меньше `left`, поэтому ширина и высота знаковые.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right.wrapping_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.wrapping_sub(self.top)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for BoundingRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}] {}x{}",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// Тип события окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowEventKind {
    /// Сменилось активное (foreground) окно.
    ForegroundChanged,
    /// Сменился заголовок окна.
    TitleChanged,
}

impl fmt::Display for WindowEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForegroundChanged => write!(f, "foreground"),
            Self::TitleChanged => write!(f, "title"),
        }
    }
}

/// Уведомление о смене активного окна или его заголовка.
///
/// Создаётся в callback потока ОС ровно один раз и доставляется потребителю
/// ровно один раз. Заголовок и прямоугольник берутся в момент события; если
/// запрос не удался, здесь пустая строка и нулевой прямоугольник.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowChangeNotification {
    pub handle: WindowHandle,
    pub kind: WindowEventKind,
    pub title: String,
    pub rect: BoundingRect,
    pub process_name: Option<String>,
    pub timestamp: Instant,
}

impl WindowChangeNotification {
    pub fn new(handle: WindowHandle, kind: WindowEventKind) -> Self {
        Self {
            handle,
            kind,
            title: String::new(),
            rect: BoundingRect::default(),
            process_name: None,
            timestamp: Instant::now(),
        }
    }

    pub fn with_title(mut self, title: String) -> Self {
        self.title = title;
        self
    }

    pub fn with_rect(mut self, rect: BoundingRect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_process_name(mut self, process_name: String) -> Self {
        self.process_name = Some(process_name);
        self
    }
}

impl fmt::Display for WindowChangeNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} \"{}\" {}", self.kind, self.handle, self.title, self.rect)?;
        if let Some(process_name) = &self.process_name {
            write!(f, " ({})", process_name)?;
        }
        Ok(())
    }
}
