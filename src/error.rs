use crate::events::WindowHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NcwError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Не удалось установить WinEvent hook: {0}")]
    HookRegistration(String),

    #[error("Не удалось определить процесс окна {handle}: {reason}")]
    ProcessResolution { handle: WindowHandle, reason: String },

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl NcwError {
    pub fn process_resolution<T>(handle: WindowHandle, reason: impl Into<String>) -> Result<T> {
        Err(NcwError::ProcessResolution {
            handle,
            reason: reason.into(),
        })
    }
}

pub type Result<T> = std::result::Result<T, NcwError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! ncw_error {
    (hook, $($arg:tt)*) => {
        $crate::error::NcwError::HookRegistration(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::NcwError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::NcwError::Internal(format!($($arg)*))
    };
}
