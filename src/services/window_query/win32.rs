use crate::error::{NcwError, Result};
use crate::events::{BoundingRect, WindowHandle};
use crate::ncw_error;
use crate::utils::{executable_basename, from_wide};
use std::ffi::c_void;
use tracing::{debug, warn};
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HMODULE, HWND, RECT};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetWindowRect, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
};

use super::r#trait::WindowQuery;

/// Длина буфера для пути к исполняемому файлу (с запасом под длинные пути)
const IMAGE_PATH_CAPACITY: usize = 1024;

fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.as_raw() as *mut c_void)
}

/// Handle процесса, закрываемый при любом выходе из функции
struct OwnedProcess(HANDLE);

impl OwnedProcess {
    fn open(pid: u32) -> windows::core::Result<Self> {
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid)? };
        Ok(Self(handle))
    }
}

impl Drop for OwnedProcess {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseHandle(self.0) } {
            warn!("CloseHandle для процесса не удался: {}", e);
        }
    }
}

/// Handle модуля текущего exe, нужен для in-context hook
pub fn module_handle() -> Result<HMODULE> {
    unsafe { GetModuleHandleW(None) }
        .map_err(|e| ncw_error!(hook, "GetModuleHandleW не вернул модуль: {}", e))
}

/// Запросы к окнам через user32/kernel32
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32WindowQuery;

impl Win32WindowQuery {
    pub fn new() -> Self {
        Self
    }
}

impl WindowQuery for Win32WindowQuery {
    fn title(&self, handle: WindowHandle) -> String {
        let hwnd = to_hwnd(handle);
        let length = unsafe { GetWindowTextLengthW(hwnd) };
        if length <= 0 {
            return String::new();
        }

        let mut buffer: Vec<u16> = vec![0; length as usize + 1];
        let copied = unsafe { GetWindowTextW(hwnd, &mut buffer) };
        if copied <= 0 {
            debug!("GetWindowTextW ничего не вернул для окна {}", handle);
            return String::new();
        }

        from_wide(&buffer[..copied as usize])
    }

    fn bounding_rect(&self, handle: WindowHandle) -> BoundingRect {
        let mut rect = RECT::default();
        match unsafe { GetWindowRect(to_hwnd(handle), &mut rect) } {
            Ok(()) => BoundingRect::new(rect.left, rect.top, rect.right, rect.bottom),
            Err(e) => {
                warn!("GetWindowRect для окна {}: {}", handle, e);
                BoundingRect::default()
            }
        }
    }

    fn process_name(&self, handle: WindowHandle) -> Result<String> {
        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(to_hwnd(handle), Some(&mut pid)) };
        if pid == 0 {
            return NcwError::process_resolution(handle, "GetWindowThreadProcessId не вернул PID");
        }

        let process = OwnedProcess::open(pid).map_err(|e| NcwError::ProcessResolution {
            handle,
            reason: format!("OpenProcess({}): {}", pid, e),
        })?;

        let mut buffer: Vec<u16> = vec![0; IMAGE_PATH_CAPACITY];
        let mut size = buffer.len() as u32;
        unsafe {
            QueryFullProcessImageNameW(
                process.0,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &mut size,
            )
        }
        .map_err(|e| NcwError::ProcessResolution {
            handle,
            reason: format!("QueryFullProcessImageNameW({}): {}", pid, e),
        })?;

        let path = from_wide(&buffer[..size as usize]);
        Ok(executable_basename(&path).to_string())
    }
}
