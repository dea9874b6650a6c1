//! CLI configuration loading.
//!
//! A single optional `rasterfx.toml` next to where the tool runs:
//!
//! ```toml
//! # Directories searched for kernel stock files (kernels.usr, kernels.gen,
//! # kernels.def), in priority order.
//! kernel_dirs = ["~/.config/rasterfx", "/usr/share/rasterfx"]
//!
//! # Wrap filters around image edges instead of clamping.
//! tiled = false
//!
//! # Default palette file; the built-in palette is used when absent.
//! palette = "work.pal.toml"
//! ```
//!
//! Every field is optional. A missing file is the stock default, a present
//! but invalid file is an error; silently ignoring a typo'd config is worse
//! than failing loudly.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Candidate directories for kernel stock files, in priority order.
    pub kernel_dirs: Vec<PathBuf>,
    /// Default boundary mode for filter passes.
    pub tiled: bool,
    /// Default palette file.
    pub palette: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, or from `rasterfx.toml` in the working directory
    /// when no path is given. Absent files yield the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from("rasterfx.toml");
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_parses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rasterfx.toml");
        std::fs::write(&path, "kernel_dirs = [\"a\", \"b\"]\ntiled = true").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.kernel_dirs,
            vec![PathBuf::from("a"), PathBuf::from("b")]
        );
        assert!(config.tiled);
        assert_eq!(config.palette, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/rasterfx.toml")));
        assert!(matches!(err, Err(ConfigError::Io(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rasterfx.toml");
        std::fs::write(&path, "tilde = true").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Toml(_))
        ));
    }
}
