use std::path::{Path, PathBuf};

/// Environment variable that relocates the whole data directory (used by tests and portable installs).
pub const DATA_DIR_ENV: &str = "TOKENDECK_DATA_DIR";

/// Platform-specific operations abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Set restrictive *directory* permissions (0o700 on Unix, no-op on Windows).
    fn restrict_dir_permissions(path: &Path);

    /// Set restrictive *file* permissions (0o600 on Unix, no-op on Windows).
    fn restrict_file_permissions(path: &Path);

    /// Binary filename for this platform (`"tokendeck"` / `"tokendeck.exe"`).
    fn binary_name() -> &'static str;

    /// Root data directory for tokendeck.
    /// Unix: `~/.tokendeck`, Windows: `%APPDATA%\tokendeck`.
    fn data_dir() -> PathBuf;
}

/// Honour `TOKENDECK_DATA_DIR` when set, otherwise fall back to the platform default.
pub(crate) fn resolve_data_dir(default: PathBuf) -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => default,
    }
}

/// Create the data directory if needed and lock it down.
pub fn ensure_data_dir() -> std::io::Result<PathBuf> {
    let dir = NativePlatform::data_dir();
    std::fs::create_dir_all(&dir)?;
    NativePlatform::restrict_dir_permissions(&dir);
    Ok(dir)
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
