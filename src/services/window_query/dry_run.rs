use crate::error::{NcwError, Result};
use crate::events::{BoundingRect, WindowHandle};

use super::r#trait::WindowQuery;

/// Фейковые окна для dry-run: handle, заголовок, исполняемый файл
pub const FAKE_WINDOWS: [(isize, &str, &str); 4] = [
    (0x1001, "Terminal - dry_run", r"C:\Windows\System32\cmd.exe"),
    (0x1002, "Browser - dry_run", r"C:\Program Files\Browser\browser.exe"),
    (0x1003, "Editor - dry_run", r"C:\Program Tools\editor.exe"),
    (0x1004, "Game - dry_run", r"D:\Games\game.exe"),
];

/// Запросы к фейковым окнам. Неизвестный handle ведёт себя как закрытое окно.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunWindowQuery;

impl DryRunWindowQuery {
    pub fn new() -> Self {
        Self
    }

    fn lookup(handle: WindowHandle) -> Option<(usize, &'static str, &'static str)> {
        FAKE_WINDOWS
            .iter()
            .enumerate()
            .find(|(_, (raw, _, _))| *raw == handle.as_raw())
            .map(|(index, (_, title, path))| (index, *title, *path))
    }
}

impl WindowQuery for DryRunWindowQuery {
    fn title(&self, handle: WindowHandle) -> String {
        Self::lookup(handle)
            .map(|(_, title, _)| title.to_string())
            .unwrap_or_default()
    }

    fn bounding_rect(&self, handle: WindowHandle) -> BoundingRect {
        match Self::lookup(handle) {
            Some((index, _, _)) => {
                let offset = index as i32 * 40;
                BoundingRect::new(offset, offset, offset + 800, offset + 600)
            }
            None => BoundingRect::default(),
        }
    }

    fn process_name(&self, handle: WindowHandle) -> Result<String> {
        match Self::lookup(handle) {
            Some((_, _, path)) => Ok(crate::utils::executable_basename(path).to_string()),
            None => NcwError::process_resolution(handle, "окно не существует"),
        }
    }
}
