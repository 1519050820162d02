//! Config file location.
//!
//! `--dir` wins; otherwise the file lives under the XDG config home
//! (`$XDG_CONFIG_HOME`, falling back to `$HOME/.config`).

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Config file name inside the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Application directory name under the XDG config home.
const APP_DIR: &str = "sdxmltv";

/// Resolves the config file path from `--dir` or the environment.
///
/// # Errors
///
/// Returns an error if `dir` is `None` and neither `XDG_CONFIG_HOME` nor
/// `HOME` is set.
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_with(dir.map(PathBuf::as_path), |key| std::env::var_os(key))
}

/// Resolves the config path with environment lookups supplied by `var`.
///
/// Relative or empty `XDG_CONFIG_HOME` values are ignored, as the XDG base
/// directory rules require.
fn resolve_with(
    dir: Option<&Path>,
    var: impl Fn(&str) -> Option<std::ffi::OsString>,
) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir.join(CONFIG_FILE));
    }

    let xdg = var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute());
    let config_home = match (xdg, var("HOME")) {
        (Some(xdg), _) => xdg,
        (None, Some(home)) if !home.is_empty() => PathBuf::from(home).join(".config"),
        _ => bail!("cannot locate config: pass --dir or set HOME"),
    };
    Ok(config_home.join(APP_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;
    use std::ffi::OsString;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (String::from(*k), OsString::from(v)))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_dir_flag_wins_over_environment() {
        // Arrange
        let dir = PathBuf::from("/srv/epg");

        // Act
        let path = resolve_with(
            Some(&dir),
            env(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/viewer")]),
        )
        .unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/srv/epg/config.toml"));
    }

    #[test]
    fn test_xdg_config_home_is_preferred() {
        // Arrange & Act
        let path = resolve_with(
            None,
            env(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/viewer")]),
        )
        .unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/xdg/sdxmltv/config.toml"));
    }

    #[test]
    fn test_relative_xdg_config_home_falls_back_to_home() {
        // Arrange & Act
        let path = resolve_with(
            None,
            env(&[("XDG_CONFIG_HOME", "relative"), ("HOME", "/home/viewer")]),
        )
        .unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/home/viewer/.config/sdxmltv/config.toml"));
    }

    #[test]
    fn test_missing_home_without_dir_fails() {
        // Arrange & Act
        let result = resolve_with(None, env(&[]));

        // Assert
        assert!(result.unwrap_err().to_string().contains("--dir"));
    }
}
