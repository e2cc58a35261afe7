// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for in every config location.
pub const CONFIG_FILE_NAME: &str = "poslv-rs.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Returns the default search paths for `poslv-rs.toml`
/// (current directory → XDG config → /etc).
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("poslv-rs").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/poslv-rs").join(CONFIG_FILE_NAME));
    paths
}

/// Extract and deserialize a named section from a TOML file.
///
/// Returns `Ok(None)` when the section is absent.
fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(&content, key).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
}

fn parse_section<T: DeserializeOwned>(content: &str, key: &str) -> Result<Option<T>, String> {
    let table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;

    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Round-trip the section so serde defaults apply to missing keys.
    let section_toml = toml::to_string(section).map_err(|e| e.to_string())?;
    toml::from_str::<T>(&section_toml)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Trait for loading configuration from a `poslv-rs.toml` section.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key in `poslv-rs.toml` (e.g. `"poslv-server"`).
    fn section_key() -> &'static str;

    /// Load the section from a specific file path.
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// does not contain the expected `[<section_key>]` header.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Parse the section out of an in-memory TOML document.
    fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let origin = PathBuf::from("<inline>");
        parse_section::<Self>(content, Self::section_key())
            .map_err(|e| ConfigError::ParseError(origin.clone(), e))?
            .ok_or_else(|| {
                ConfigError::ParseError(origin, format!("missing [{}] section", Self::section_key()))
            })
    }

    /// Search default paths (`poslv-rs.toml` in CWD → XDG → /etc) and load
    /// the first file that contains the expected section.
    ///
    /// Returns `(Default::default(), None)` when no config file is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from_paths(&config_search_paths())
    }

    /// Load from the first existing path in `paths` that has the section.
    fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(path, Self::section_key())? {
                    return Ok((cfg, Some(path.clone())));
                }
            }
        }
        Ok((Self::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(default)]
    struct Sample {
        host: String,
        port: u16,
        retries: Option<u32>,
    }

    impl ConfigFile for Sample {
        fn section_key() -> &'static str {
            "sample"
        }
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let cfg = Sample::load_from_str("[sample]\nport = 5602\n").unwrap();
        assert_eq!(cfg.port, 5602);
        assert_eq!(cfg.host, "");
        assert_eq!(cfg.retries, None);
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let err = Sample::load_from_str("[other]\nport = 1\n").unwrap_err();
        assert!(err.to_string().contains("missing [sample] section"));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let err = Sample::load_from_str("[sample\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_, _)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[sample]\nhost = \"10.0.0.2\"\n").unwrap();

        let cfg = Sample::load_from_file(&path).unwrap();
        assert_eq!(cfg.host, "10.0.0.2");

        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            Sample::load_from_file(&missing),
            Err(ConfigError::ReadError(_, _))
        ));
    }

    #[test]
    fn test_search_skips_files_without_section() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        std::fs::write(&first, "[unrelated]\nkey = 1\n").unwrap();
        std::fs::write(&second, "[sample]\nport = 7\n").unwrap();

        let paths = vec![dir.path().join("nowhere.toml"), first, second.clone()];
        let (cfg, found) = Sample::load_from_paths(&paths).unwrap();
        assert_eq!(cfg.port, 7);
        assert_eq!(found, Some(second));
    }

    #[test]
    fn test_search_without_files_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, found) = Sample::load_from_paths(&[dir.path().join("x.toml")]).unwrap();
        assert_eq!(cfg, Sample::default());
        assert_eq!(found, None);
    }
}
