//! Single source of truth for reposense filesystem layout.
//!
//! This module defines WHERE data lives. It has no I/O beyond directory
//! creation and no business logic.
//!
//! ```text
//! $XDG_CACHE_HOME/reposense/      (else ~/.cache/reposense, else ./.cache/reposense)
//! └── reposense.db                # description + metadata cache
//!
//! ~/.reposense.toml               # user configuration
//! ```

use std::path::PathBuf;

/// Cache directory: `$XDG_CACHE_HOME/reposense`, falling back to
/// `~/.cache/reposense`, falling back to `./.cache/reposense`.
pub fn cache_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("reposense");
        }
    }

    match dirs::home_dir() {
        Some(home) => home.join(".cache").join("reposense"),
        None => PathBuf::from(".cache").join("reposense"),
    }
}

/// Cache database file: `<cache_dir>/reposense.db`
pub fn db_path() -> PathBuf {
    cache_dir().join("reposense.db")
}

/// User config file: `~/.reposense.toml`
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reposense.toml")
}

/// Create the cache directory (mode 0755 on unix) if it does not exist.
pub fn ensure_cache_dir() -> anyhow::Result<PathBuf> {
    let dir = cache_dir();
    std::fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, Permissions::from_mode(0o755))?;
    }

    Ok(dir)
}
