/// Преобразовать UTF-16 буфер из Win32 API в строку.
///
/// Читает до первого NUL (если он есть), невалидные суррогаты заменяются.
pub fn from_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Имя исполняемого файла без пути: `C:\Program Tools\app.exe` -> `app.exe`
pub fn executable_basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_windows_path() {
        assert_eq!(executable_basename(r"C:\Program Tools\app.exe"), "app.exe");
        assert_eq!(executable_basename(r"\\?\C:\Windows\explorer.exe"), "explorer.exe");
        assert_eq!(executable_basename("C:/tools/mixed\\tool.exe"), "tool.exe");
        assert_eq!(executable_basename("bare.exe"), "bare.exe");
        assert_eq!(executable_basename(""), "");
    }

    #[test]
    fn from_wide_stops_at_nul() {
        let mut buffer: Vec<u16> = "Заголовок".encode_utf16().collect();
        buffer.extend_from_slice(&[0, 'x' as u16, 'y' as u16]);
        assert_eq!(from_wide(&buffer), "Заголовок");
        assert_eq!(from_wide(&[]), "");
    }
}
