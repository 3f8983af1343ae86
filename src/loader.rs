//! Reading configuration documents from disk.
//!
//! The registry only needs two capabilities from the filesystem: checking
//! whether a candidate path exists, and turning a resolved path into a
//! key/value map. Both live behind the [`ConfigLoader`] trait so hosts can
//! substitute their own storage (or an in-memory fake in tests).
//!
//! # Formats
//!
//! [`FileLoader`] selects a parser from the file extension:
//!
//! | Extension      | Parser                                          |
//! |----------------|-------------------------------------------------|
//! | `yml`, `yaml`  | `serde_yaml` (requires the `yaml-format` feature) |
//! | `json`         | `serde_json`                                    |
//! | `toml`         | `toml` (requires the `toml-format` feature)     |
//! | other          | JSON, then TOML, then YAML                      |
//!
//! The top level of every document must be a map:
//!
//! ```json
//! {
//!   "host": "localhost",
//!   "port": 8080,
//!   "database": { "pool": { "size": 4 } }
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// The key/value content of a configuration document.
pub type Content = Map<String, Value>;

/// Errors that can occur while loading a single configuration file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid JSON.
    #[error("JSON parse error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file is not valid YAML.
    #[cfg(feature = "yaml-format")]
    #[error("YAML parse error in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file is not valid TOML.
    #[cfg(feature = "toml-format")]
    #[error("TOML parse error in {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The file parsed, but its top level is not a map.
    #[error("top level of {} is not a key/value map", .path.display())]
    NotATable { path: PathBuf },
}

impl LoadError {
    /// The file this error refers to.
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. } => path,
            LoadError::Json { path, .. } => path,
            #[cfg(feature = "yaml-format")]
            LoadError::Yaml { path, .. } => path,
            #[cfg(feature = "toml-format")]
            LoadError::Toml { path, .. } => path,
            LoadError::NotATable { path } => path,
        }
    }
}

/// Capability the registry uses to probe and read configuration files.
///
/// Implementations must be shareable across threads; the registry calls
/// them while holding its lock.
pub trait ConfigLoader: Send + Sync {
    /// Returns true if `path` names an existing file.
    fn exists(&self, path: &Path) -> bool;

    /// Reads and parses `path` into a key/value map.
    fn load(&self, path: &Path) -> Result<Content, LoadError>;
}

/// The default [`ConfigLoader`], backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl ConfigLoader for FileLoader {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> Result<Content, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "yaml-format")]
            Some("yml" | "yaml") => parse_yaml(path, &text),
            Some("json") => parse_json(path, &text),
            #[cfg(feature = "toml-format")]
            Some("toml") => parse_toml(path, &text),
            _ => parse_any(path, &text),
        }
    }
}

fn parse_json(path: &Path, text: &str) -> Result<Content, LoadError> {
    let value: Value = serde_json::from_str(text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    into_table(path, value)
}

#[cfg(feature = "yaml-format")]
fn parse_yaml(path: &Path, text: &str) -> Result<Content, LoadError> {
    let value: Value = serde_yaml::from_str(text).map_err(|source| LoadError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    into_table(path, value)
}

fn into_table(path: &Path, value: Value) -> Result<Content, LoadError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(LoadError::NotATable {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(feature = "toml-format")]
fn parse_toml(path: &Path, text: &str) -> Result<Content, LoadError> {
    toml::from_str::<Content>(text).map_err(|source| LoadError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

/// Unknown extension: JSON first, then TOML, then YAML. The JSON error wins
/// when all fail.
fn parse_any(path: &Path, text: &str) -> Result<Content, LoadError> {
    let json = parse_json(path, text);
    if json.is_ok() {
        return json;
    }
    #[cfg(feature = "toml-format")]
    if let Ok(map) = parse_toml(path, text) {
        return Ok(map);
    }
    #[cfg(feature = "yaml-format")]
    if let Ok(map) = parse_yaml(path, text) {
        return Ok(map);
    }
    json
}

/// Builds the candidate path `{dir}/{name}.{ext}`.
pub(crate) fn candidate_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{name}.{extension}"))
}
