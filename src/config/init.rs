//! Config locations and `loco init`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ConfigError;

use super::defaults::DEFAULT_CONFIG_TEMPLATE;
use super::GlobalConfigInitResult;

/// `$XDG_CONFIG_HOME`, else `~/.config`.
///
/// A relative `XDG_CONFIG_HOME` is ignored, as the XDG base-dir rules require.
pub fn config_root_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|dir| dir.is_absolute())
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
}

/// `<config root>/loco/loco.toml`.
pub fn default_global_config_path() -> Option<PathBuf> {
    config_root_dir().map(|dir| global_config_path_under(&dir))
}

pub(super) fn global_config_path_under(root: &Path) -> PathBuf {
    root.join("loco").join("loco.toml")
}

/// Write the commented default config to the per-user location.
///
/// An existing file is left alone unless `force` is set, in which case it is
/// moved to `loco.toml.<unix-seconds>.bak` first.
pub fn initialize_default_global_config(
    force: bool,
) -> Result<GlobalConfigInitResult, ConfigError> {
    let path = default_global_config_path().ok_or_else(|| {
        ConfigError::Invalid("cannot locate a config directory; set XDG_CONFIG_HOME or HOME".into())
    })?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    write_template(&path, force, now)
}

pub(super) fn write_template(
    path: &Path,
    force: bool,
    now_secs: u64,
) -> Result<GlobalConfigInitResult, ConfigError> {
    let path_buf = path.to_path_buf();
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
        return Ok(GlobalConfigInitResult::Created { path: path_buf });
    }
    if !force {
        return Ok(GlobalConfigInitResult::AlreadyInitialized { path: path_buf });
    }

    let backup_path = backup_path_for(path, now_secs);
    if backup_path.exists() {
        // Never replace an earlier backup with a newer one.
        return Err(ConfigError::Invalid(format!(
            "{} already exists; run `loco init --force` again in a moment",
            backup_path.display()
        )));
    }
    std::fs::rename(path, &backup_path)?;
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(GlobalConfigInitResult::Overwritten {
        path: path_buf,
        backup_path,
    })
}

fn backup_path_for(path: &Path, now_secs: u64) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "loco.toml".into());
    name.push(format!(".{now_secs}.bak"));
    path.with_file_name(name)
}
