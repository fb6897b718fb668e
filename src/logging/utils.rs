//! Small helpers shared by the console formatter and the file layer.
use std::path::PathBuf;

/// Strip ANSI escape sequences from a string.
///
/// Handles CSI sequences (`ESC [` ... final byte in `@`..=`~`) and drops the
/// byte following a bare `ESC`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// `<cache dir>/<command>.log`, creating the cache directory.
///
/// `None` when the cache directory cannot be determined or created.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let dir = crate::platform::cache_dir().ok()?;
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `HH:MM:SS.mmm` in UTC.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S%.3f").to_string()
}
