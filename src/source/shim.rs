//! Launcher scripts for module-provided commands.
//!
//! A module manifest may declare `[bins]` entries mapping a command name to
//! an argv.  Each entry becomes a small executable script in the bin
//! directory that `exec`s the argv with the caller's arguments appended.
use std::path::Path;

use anyhow::{Context as _, Result, bail};

/// Permission bits of generated shims.
pub const SHIM_MODE: u32 = 0o755;

/// File name of the shim for `name` on this platform.
#[must_use]
pub fn shim_file_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.cmd")
    } else {
        name.to_string()
    }
}

/// Render the script body for `argv`.
///
/// # Errors
///
/// Returns an error if `argv` is empty.
pub fn render(argv: &[String]) -> Result<String> {
    if argv.is_empty() {
        bail!("shim command must not be empty");
    }
    if cfg!(windows) {
        let args: Vec<String> = argv.iter().map(|a| format!("\"{a}\"")).collect();
        Ok(format!("@echo off\r\n{} %*\r\n", args.join(" ")))
    } else {
        let args: Vec<String> = argv.iter().map(|a| sh_quote(a)).collect();
        Ok(format!("#!/bin/sh\nexec {} \"$@\"\n", args.join(" ")))
    }
}

/// Write an executable shim for `argv` at `path`.
///
/// # Errors
///
/// Returns an error if `argv` is empty or the file cannot be written.
pub fn generate(path: &Path, argv: &[String]) -> Result<()> {
    let script = render(argv)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    std::fs::write(path, script).with_context(|| format!("writing shim {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(SHIM_MODE))
            .with_context(|| format!("chmod shim {}", path.display()))?;
    }
    Ok(())
}

/// Single-quote `arg` for POSIX sh.
fn sh_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn empty_argv_is_rejected() {
        assert!(render(&[]).is_err());
    }

    #[test]
    fn quoting() {
        assert_eq!(sh_quote("nvim"), "nvim");
        assert_eq!(sh_quote("--flag=x"), "--flag=x");
        assert_eq!(sh_quote("two words"), "'two words'");
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
        assert_eq!(sh_quote(""), "''");
    }

    #[cfg(unix)]
    #[test]
    fn renders_exec_line() {
        let script = render(&argv(&["nvim", "-u", "my init.lua"])).unwrap();
        insta::assert_snapshot!(script, @r#"
        #!/bin/sh
        exec nvim -u 'my init.lua' "$@"
        "#);
    }

    #[cfg(unix)]
    #[test]
    fn generated_shim_runs() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin/hello");
        generate(&path, &argv(&["echo", "hello"])).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, SHIM_MODE);
        let out = std::process::Command::new(&path).arg("world").output().unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello world");
    }
}
