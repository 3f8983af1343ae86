use std::path::PathBuf;

use serde::Deserialize;

/// Process-wide defaults consulted when the registry builds a new document.
///
/// The search path is probed in order, and within each directory the
/// extensions are tried in order; the first existing `{dir}/{name}.{ext}`
/// wins.
///
/// # Examples
///
/// ```
/// use shared_config::RegistrySettings;
///
/// // `.` then `config`, trying `yml`, `yaml`, `json` then `toml`
/// let settings = RegistrySettings::default();
/// assert_eq!(settings.search_path().len(), 2);
///
/// // Only custom paths
/// let settings = RegistrySettings::with_paths(vec!["/etc/myapp".into()])
///     .with_extensions(["yml", "yaml"]);
/// assert_eq!(settings.extensions(), ["yml", "yaml"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    search_path: Vec<PathBuf>,
    extensions: Vec<String>,
    reload_on_reacquire: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            search_path: Self::default_paths(),
            extensions: Self::default_extensions(),
            reload_on_reacquire: false,
        }
    }
}

impl RegistrySettings {
    /// Creates settings with no search paths and the default extensions.
    pub fn new() -> Self {
        Self {
            search_path: Vec::new(),
            extensions: Self::default_extensions(),
            reload_on_reacquire: false,
        }
    }

    /// Creates settings that search only `paths`, in order.
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            search_path: paths,
            ..Self::new()
        }
    }

    /// Creates settings that search `paths` first, then the default paths.
    pub fn with_paths_and_default(mut paths: Vec<PathBuf>) -> Self {
        paths.extend(Self::default_paths());
        Self {
            search_path: paths,
            ..Self::new()
        }
    }

    /// The default search path: the working directory, then `./config`.
    pub fn default_paths() -> Vec<PathBuf> {
        vec![PathBuf::from("."), PathBuf::from("config")]
    }

    /// Returns the default candidate extensions for the enabled formats.
    pub fn default_extensions() -> Vec<String> {
        let mut extensions = Vec::new();
        if cfg!(feature = "yaml-format") {
            extensions.push("yml".to_string());
            extensions.push("yaml".to_string());
        }
        extensions.push("json".to_string());
        if cfg!(feature = "toml-format") {
            extensions.push("toml".to_string());
        }
        extensions
    }

    /// Returns the per-user configuration directory for `app`, e.g.
    /// `~/.config/<app>` on Linux.
    ///
    /// Falls back to `./<app>` if the platform directory cannot be determined.
    pub fn user_config_dir(app: &str) -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(app)
    }

    /// Appends the per-user configuration directory for `app` to the search
    /// path.
    pub fn with_user_config_dir(mut self, app: &str) -> Self {
        self.search_path.push(Self::user_config_dir(app));
        self
    }

    /// Replaces the candidate extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether reacquiring a registered document reloads it first.
    pub fn with_reload_on_reacquire(mut self, reload: bool) -> Self {
        self.reload_on_reacquire = reload;
        self
    }

    /// Returns the configured search path.
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Returns the candidate extensions.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether acquiring an already-registered document reloads it first.
    pub fn reload_on_reacquire(&self) -> bool {
        self.reload_on_reacquire
    }

    /// Appends a directory to the end of the search path.
    pub fn add_path(&mut self, path: PathBuf) {
        self.search_path.push(path);
    }

    /// Puts a directory at the front of the search path.
    pub fn insert_path(&mut self, path: PathBuf) {
        self.search_path.insert(0, path);
    }

    /// Replaces the candidate extensions.
    pub fn set_extensions(&mut self, extensions: Vec<String>) {
        self.extensions = extensions;
    }

    /// Sets whether reacquiring a registered document reloads it first.
    pub fn set_reload_on_reacquire(&mut self, reload: bool) {
        self.reload_on_reacquire = reload;
    }
}

/// Per-call options for [`ConfigRegistry::acquire`](crate::ConfigRegistry::acquire).
///
/// Options only matter when the call creates the document; later acquires of
/// the same name ignore them.
///
/// ```
/// use shared_config::AcquireOptions;
///
/// let options = AcquireOptions::new().path_insert(["local", "shared"]);
/// assert_eq!(options.inserted_paths().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireOptions {
    file: Option<PathBuf>,
    path_insert: Vec<PathBuf>,
    empty: bool,
}

impl AcquireOptions {
    /// Creates options that search the default path for a file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a document with no backing file.
    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    /// Use `path` directly instead of searching.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Prepend directories to the search path, keeping their relative order.
    pub fn path_insert<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.path_insert.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Never touch the filesystem, whatever else is set.
    pub fn with_empty(mut self, empty: bool) -> Self {
        self.empty = empty;
        self
    }

    /// Returns the explicit file, if one was given.
    pub fn explicit_file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }

    /// Returns the directories to put in front of the search path.
    pub fn inserted_paths(&self) -> &[PathBuf] {
        &self.path_insert
    }

    /// Returns true if the document must not touch the filesystem.
    pub fn is_empty(&self) -> bool {
        self.empty
    }
}
