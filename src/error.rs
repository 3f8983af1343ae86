use std::path::PathBuf;

use thiserror::Error;

use crate::LoadError;

/// Errors surfaced by the registry and by [`ConfigUser`](crate::ConfigUser).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A configuration binding was requested under a name that is already
    /// bound to something that is not a configuration.
    #[error("name '{name}' is already in use by a non-configuration binding")]
    NameInUse { name: String },

    /// The name is empty or is not a single plain path component, so it
    /// could resolve outside the search path.
    #[error("invalid configuration name '{name}'")]
    InvalidName { name: String },

    /// No `{dir}/{name}.{ext}` candidate exists on the search path.
    #[error("configuration file not found for '{name}' (searched {} locations)", .searched.len())]
    FileNotFound {
        name: String,
        /// Every candidate path that was probed, in probe order.
        searched: Vec<PathBuf>,
    },

    /// The resolved file could not be read or parsed while constructing a
    /// new document.
    #[error("failed to load configuration '{name}': {source}")]
    Load {
        name: String,
        #[source]
        source: LoadError,
    },

    /// Global settings were changed after the global registry was first used.
    #[error("cannot modify registry settings after the global registry has been accessed")]
    AlreadyInitialized,
}

impl RegistryError {
    /// Returns true if this is a [`RegistryError::FileNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::FileNotFound { .. })
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
