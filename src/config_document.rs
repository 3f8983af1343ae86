use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::loader::{ConfigLoader, Content, LoadError, candidate_path};
use crate::{AcquireOptions, OwnerId, OwnerSet, RegistryError, RegistrySettings, Result};

/// One named, mutable configuration document, optionally backed by a file.
///
/// Documents are created by [`ConfigRegistry::acquire`](crate::ConfigRegistry::acquire)
/// and shared as `Arc<ConfigDocument>` between every owner of the same name.
///
/// Content access goes through the document's own read/write lock, so reads
/// and writes from different threads are sound. The registry does not
/// coordinate compound updates made by application code; use
/// [`ConfigDocument::with_content_mut`] when several keys must change together.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shared_config::{AcquireOptions, ConfigRegistry, RegistrySettings};
///
/// let registry = ConfigRegistry::new(RegistrySettings::new());
/// let doc = registry.acquire("server", "runtime", AcquireOptions::empty()).unwrap();
///
/// doc.set("workers", 4);
/// doc.set_path("limits.body.max_kb", 512);
///
/// assert_eq!(doc.get_i64("workers"), Some(4));
/// assert_eq!(doc.get_path("limits.body.max_kb"), Some(json!(512)));
/// ```
pub struct ConfigDocument {
    name: String,
    search_path: Vec<PathBuf>,
    extensions: Vec<String>,
    resolved_file: Option<PathBuf>,
    uses_file: bool,
    loader: Arc<dyn ConfigLoader>,
    content: RwLock<Content>,
    // Only mutated while the registry lock is held.
    owners: Mutex<OwnerSet>,
}

impl ConfigDocument {
    /// Builds and loads a document. Nothing is returned unless the document
    /// is fully populated.
    pub(crate) fn open(
        name: &str,
        options: &AcquireOptions,
        settings: &RegistrySettings,
        loader: Arc<dyn ConfigLoader>,
    ) -> Result<Self> {
        if !is_plain_name(name) {
            return Err(RegistryError::InvalidName {
                name: name.to_string(),
            });
        }

        let mut search_path = options.inserted_paths().to_vec();
        search_path.extend(settings.search_path().iter().cloned());

        let mut document = Self {
            name: name.to_string(),
            search_path,
            extensions: settings.extensions().to_vec(),
            resolved_file: options.explicit_file().cloned(),
            uses_file: !options.is_empty(),
            loader,
            content: RwLock::new(Map::new()),
            owners: Mutex::new(OwnerSet::new()),
        };

        if document.uses_file && document.resolved_file.is_none() {
            match document.discover() {
                Some(path) => {
                    debug!(name = %document.name, file = %path.display(), "discovered configuration file");
                    document.resolved_file = Some(path);
                }
                None => {
                    return Err(RegistryError::FileNotFound {
                        name: document.name.clone(),
                        searched: document.candidates().collect(),
                    });
                }
            }
        }

        if document.uses_file {
            document.load().map_err(|source| RegistryError::Load {
                name: document.name.clone(),
                source,
            })?;
        }

        Ok(document)
    }

    /// Every `{dir}/{name}.{ext}` candidate in probe order.
    fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.search_path.iter().flat_map(move |dir| {
            self.extensions
                .iter()
                .map(move |ext| candidate_path(dir, &self.name, ext))
        })
    }

    /// First existing candidate; directories before extensions.
    fn discover(&self) -> Option<PathBuf> {
        self.candidates().find(|path| self.loader.exists(path))
    }

    /// Reads the resolved file and merges its entries into the content.
    fn load(&self) -> Result<(), LoadError> {
        let Some(path) = self.resolved_file.as_deref() else {
            return Ok(());
        };
        let loaded = self.loader.load(path)?;
        let mut content = self.content.write();
        content.extend(loaded);
        Ok(())
    }

    /// Returns the name this document is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the directories probed during discovery, in order.
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Returns the file extensions tried in each directory, in order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// The file this document was loaded from, if any.
    pub fn resolved_file(&self) -> Option<&Path> {
        self.resolved_file.as_deref()
    }

    /// Returns true if this document reads its content from a file.
    pub fn uses_file(&self) -> bool {
        self.uses_file
    }

    /// Removes every entry. File and owner bookkeeping are untouched.
    pub fn clear(&self) {
        self.content.write().clear();
    }

    /// Clears the content and, for file-backed documents, reads the file
    /// again.
    ///
    /// Returns false if the reload failed. A failed reload leaves the
    /// document empty; the previous content is not restored.
    pub fn reload(&self) -> bool {
        self.clear();
        if !self.uses_file {
            return true;
        }
        match self.load() {
            Ok(()) => {
                debug!(name = %self.name, "reloaded configuration");
                true
            }
            Err(error) => {
                warn!(name = %self.name, %error, "reload failed; configuration left empty");
                false
            }
        }
    }

    /// Returns a copy of the value at `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.content.read().get(key).cloned()
    }

    /// Deserializes the value at `key`, returning `None` if it is missing or
    /// has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Returns the string at `key`, or `None` if missing or not a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.content
            .read()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Returns the integer at `key` as an `i64`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.content.read().get(key).and_then(Value::as_i64)
    }

    /// Returns the integer at `key` as a `u64`.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.content.read().get(key).and_then(Value::as_u64)
    }

    /// Returns the number at `key` as an `f64`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.content.read().get(key).and_then(Value::as_f64)
    }

    /// Returns the boolean at `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.content.read().get(key).and_then(Value::as_bool)
    }

    /// Looks up a dotted path such as `"database.pool.size"`.
    ///
    /// Segments index into nested maps; a numeric segment also indexes into
    /// an array.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let content = self.content.read();
        let mut segments = path.split('.');
        let mut current = content.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Deserializes the value at a dotted path.
    pub fn get_path_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get_path(path)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Sets `key`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.content.write().insert(key.into(), value.into())
    }

    /// Sets a dotted path, creating intermediate maps as needed.
    ///
    /// An intermediate segment that holds a non-map value is replaced by a
    /// map.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Option<Value> {
        let mut content = self.content.write();
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop()?;
        let mut map = &mut *content;
        for segment in segments {
            let slot = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            map = slot.as_object_mut()?;
        }
        map.insert(last.to_string(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.content.write().remove(key)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.content.read().contains_key(key)
    }

    /// Returns the top-level keys.
    pub fn keys(&self) -> Vec<String> {
        self.content.read().keys().cloned().collect()
    }

    /// Returns the number of top-level entries.
    pub fn len(&self) -> usize {
        self.content.read().len()
    }

    /// Returns true if the document has no entries.
    pub fn is_empty(&self) -> bool {
        self.content.read().is_empty()
    }

    /// A copy of the current content.
    pub fn snapshot(&self) -> Content {
        self.content.read().clone()
    }

    /// Runs `f` with shared access to the content.
    pub fn with_content<R>(&self, f: impl FnOnce(&Content) -> R) -> R {
        f(&self.content.read())
    }

    /// Runs `f` with exclusive access to the content.
    pub fn with_content_mut<R>(&self, f: impl FnOnce(&mut Content) -> R) -> R {
        f(&mut self.content.write())
    }

    /// Returns the owners currently holding this document.
    pub fn owners(&self) -> Vec<OwnerId> {
        self.owners.lock().to_vec()
    }

    /// Returns the number of owners currently holding this document.
    pub fn owner_count(&self) -> usize {
        self.owners.lock().len()
    }

    /// Returns true if `owner` currently holds this document.
    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        self.owners.lock().contains(owner)
    }

    /// Records `owner`, returning false if it was already present.
    pub(crate) fn add_owner(&self, owner: OwnerId) -> bool {
        self.owners.lock().add(owner)
    }

    /// Returns the number of owners left.
    pub(crate) fn drop_owner(&self, owner: &OwnerId) -> usize {
        let mut owners = self.owners.lock();
        owners.drop_owner(owner);
        owners.len()
    }
}

/// A name must be one normal path component so `{dir}/{name}.{ext}` stays
/// inside `dir`.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => part == name,
        _ => false,
    }
}

impl fmt::Debug for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigDocument")
            .field("name", &self.name)
            .field("search_path", &self.search_path)
            .field("extensions", &self.extensions)
            .field("resolved_file", &self.resolved_file)
            .field("uses_file", &self.uses_file)
            .field("content", &*self.content.read())
            .field("owners", &*self.owners.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    /// In-memory loader: paths map to content, `None` means "exists but
    /// fails to parse".
    #[derive(Default)]
    struct FakeLoader {
        files: RwLock<HashMap<PathBuf, Option<Content>>>,
    }

    impl FakeLoader {
        fn with(files: &[(&str, Option<Value>)]) -> Arc<Self> {
            let loader = Self::default();
            for (path, value) in files {
                loader.put(path, value.clone());
            }
            Arc::new(loader)
        }

        fn put(&self, path: &str, value: Option<Value>) {
            let content = value.map(|v| match v {
                Value::Object(map) => map,
                _ => panic!("fixtures must be objects"),
            });
            self.files.write().insert(PathBuf::from(path), content);
        }
    }

    impl ConfigLoader for FakeLoader {
        fn exists(&self, path: &Path) -> bool {
            self.files.read().contains_key(path)
        }

        fn load(&self, path: &Path) -> Result<Content, LoadError> {
            match self.files.read().get(path) {
                Some(Some(content)) => Ok(content.clone()),
                Some(None) => Err(LoadError::NotATable {
                    path: path.to_path_buf(),
                }),
                None => Err(LoadError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    fn settings() -> RegistrySettings {
        RegistrySettings::with_paths(vec![".".into(), "config".into()])
            .with_extensions(["yml", "yaml"])
    }

    #[test]
    fn test_empty_document_has_no_content() {
        let loader = FakeLoader::with(&[]);
        let doc = ConfigDocument::open("empty_conf", &AcquireOptions::empty(), &settings(), loader)
            .unwrap();
        assert!(doc.is_empty());
        assert!(!doc.uses_file());
        assert_eq!(doc.resolved_file(), None);
        assert_eq!(doc.name(), "empty_conf");
    }

    #[test]
    fn test_empty_wins_over_explicit_file() {
        let loader = FakeLoader::with(&[("app.yml", Some(json!({"a": 1})))]);
        let options = AcquireOptions::empty().file("app.yml");
        let doc = ConfigDocument::open("app", &options, &settings(), loader).unwrap();
        assert!(doc.is_empty());
        assert!(!doc.uses_file());
    }

    #[test]
    fn test_discovery_first_directory_first_extension() {
        let loader = FakeLoader::with(&[
            ("./name.yml", Some(json!({"from": "dot-yml"}))),
            ("./name.yaml", Some(json!({"from": "dot-yaml"}))),
            ("config/name.yaml", Some(json!({"from": "config-yaml"}))),
        ]);
        let doc = ConfigDocument::open("name", &AcquireOptions::new(), &settings(), loader).unwrap();
        assert_eq!(doc.resolved_file(), Some(Path::new("./name.yml")));
        assert_eq!(doc.get_str("from").as_deref(), Some("dot-yml"));
    }

    #[test]
    fn test_discovery_falls_through_directories() {
        let loader = FakeLoader::with(&[("config/name.yaml", Some(json!({"x": true})))]);
        let doc = ConfigDocument::open("name", &AcquireOptions::new(), &settings(), loader).unwrap();
        assert_eq!(doc.resolved_file(), Some(Path::new("config/name.yaml")));
        assert_eq!(doc.get_bool("x"), Some(true));
    }

    #[test]
    fn test_path_insert_is_prepended_in_order() {
        let loader = FakeLoader::with(&[
            ("b/name.yml", Some(json!({"from": "b"}))),
            ("./name.yml", Some(json!({"from": "dot"}))),
        ]);
        let options = AcquireOptions::new().path_insert(["a", "b"]);
        let doc = ConfigDocument::open("name", &options, &settings(), loader).unwrap();
        assert_eq!(
            doc.search_path(),
            [
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("."),
                PathBuf::from("config")
            ]
        );
        assert_eq!(doc.get_str("from").as_deref(), Some("b"));
    }

    #[test]
    fn test_names_must_stay_inside_search_path() {
        let loader = FakeLoader::with(&[
            ("/elsewhere/outside.yml", Some(json!({"a": 1}))),
            ("../escape.yml", Some(json!({"a": 1}))),
        ]);
        for name in ["", "/elsewhere/outside", "..", "../escape", "nested/name", ".", "trailing/"] {
            let err = ConfigDocument::open(name, &AcquireOptions::new(), &settings(), loader.clone())
                .unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidName { name: ref n } if n == name),
                "{name:?} was accepted"
            );
        }
    }

    #[test]
    fn test_empty_name_rejected_without_file() {
        let loader = FakeLoader::with(&[]);
        let err = ConfigDocument::open("", &AcquireOptions::empty(), &settings(), loader).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { .. }));
    }

    #[test]
    fn test_missing_file_fails_construction() {
        let loader = FakeLoader::with(&[]);
        let err = ConfigDocument::open("none_conf", &AcquireOptions::new(), &settings(), loader)
            .unwrap_err();
        match err {
            RegistryError::FileNotFound { name, searched } => {
                assert_eq!(name, "none_conf");
                assert_eq!(searched.len(), 4);
                assert_eq!(searched[0], PathBuf::from("./none_conf.yml"));
                assert_eq!(searched[3], PathBuf::from("config/none_conf.yaml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_explicit_file_fails_construction() {
        let loader = FakeLoader::with(&[("broken.yml", None)]);
        let options = AcquireOptions::new().file("broken.yml");
        let err = ConfigDocument::open("broken", &options, &settings(), loader).unwrap_err();
        assert!(matches!(err, RegistryError::Load { .. }));
    }

    #[test]
    fn test_clear_keeps_bookkeeping() {
        let loader = FakeLoader::with(&[("./first_conf.yml", Some(json!({"a": 1, "b": 2})))]);
        let doc =
            ConfigDocument::open("first_conf", &AcquireOptions::new(), &settings(), loader).unwrap();
        doc.add_owner("owner".into());
        doc.clear();
        assert!(doc.is_empty());
        assert!(doc.uses_file());
        assert_eq!(doc.resolved_file(), Some(Path::new("./first_conf.yml")));
        assert_eq!(doc.owner_count(), 1);
    }

    #[test]
    fn test_reload_restores_file_content() {
        let loader = FakeLoader::with(&[(
            "./first_conf.yml",
            Some(json!({"core": {"name": "first_conf"}})),
        )]);
        let doc =
            ConfigDocument::open("first_conf", &AcquireOptions::new(), &settings(), loader).unwrap();
        doc.set_path("core.name", "changed");
        doc.set("extra", "value");
        assert!(doc.reload());
        assert_eq!(doc.get_path("core.name"), Some(json!("first_conf")));
        assert!(!doc.contains_key("extra"));
    }

    #[test]
    fn test_reload_without_file_only_clears() {
        let loader = FakeLoader::with(&[]);
        let doc = ConfigDocument::open("empty_conf", &AcquireOptions::empty(), &settings(), loader)
            .unwrap();
        doc.set_path("core.name", "changed");
        assert!(doc.reload());
        assert!(doc.keys().is_empty());
    }

    #[test]
    fn test_failed_reload_leaves_document_empty() {
        let loader = FakeLoader::with(&[("./flaky.yml", Some(json!({"a": 1})))]);
        let doc = ConfigDocument::open(
            "flaky",
            &AcquireOptions::new(),
            &settings(),
            loader.clone(),
        )
        .unwrap();
        assert_eq!(doc.get_i64("a"), Some(1));

        loader.put("./flaky.yml", None);
        assert!(!doc.reload());
        assert!(doc.is_empty());
    }

    #[test]
    fn test_typed_accessors() {
        let loader = FakeLoader::with(&[(
            "./typed.yml",
            Some(json!({
                "host": "localhost",
                "port": 8080,
                "ratio": 0.5,
                "debug": false,
                "servers": [{"name": "alpha"}, {"name": "beta"}],
            })),
        )]);
        let doc = ConfigDocument::open("typed", &AcquireOptions::new(), &settings(), loader).unwrap();

        assert_eq!(doc.get_str("host").as_deref(), Some("localhost"));
        assert_eq!(doc.get_u64("port"), Some(8080));
        assert_eq!(doc.get_f64("ratio"), Some(0.5));
        assert_eq!(doc.get_bool("debug"), Some(false));
        assert_eq!(doc.get_as::<u16>("port"), Some(8080));
        assert_eq!(doc.get_as::<u16>("host"), None);
        assert_eq!(doc.get_path("servers.1.name"), Some(json!("beta")));
        assert_eq!(doc.get_path_as::<String>("servers.0.name").as_deref(), Some("alpha"));
        assert_eq!(doc.get_path("host.nested"), None);
        assert_eq!(doc.get_str("missing"), None);
    }

    #[test]
    fn test_set_path_replaces_scalar_intermediate() {
        let loader = FakeLoader::with(&[]);
        let doc = ConfigDocument::open("cfg", &AcquireOptions::empty(), &settings(), loader).unwrap();
        doc.set("one", 1);
        doc.set_path("one.two.three", "a_value");
        assert_eq!(doc.get_path("one.two.three"), Some(json!("a_value")));
        assert_eq!(doc.set("one", 2).map(|v| v.is_object()), Some(true));
    }

    #[test]
    fn test_owner_bookkeeping() {
        let loader = FakeLoader::with(&[]);
        let doc = ConfigDocument::open("cfg", &AcquireOptions::empty(), &settings(), loader).unwrap();
        assert!(doc.add_owner("class_one".into()));
        assert!(!doc.add_owner("class_one".into()));
        assert_eq!(doc.owner_count(), 1);
        assert_eq!(doc.drop_owner(&"unknown".into()), 1);
        assert_eq!(doc.drop_owner(&"class_one".into()), 0);
        assert!(doc.owners().is_empty());
    }
}
