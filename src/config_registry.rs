use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, info};

use crate::loader::{ConfigLoader, FileLoader};
use crate::{AcquireOptions, ConfigDocument, OwnerId, RegistryError, RegistrySettings, Result};

/// A directory of named configuration documents shared between owners.
///
/// The first [`acquire`](Self::acquire) of a name builds the document (finding
/// and loading its file); later acquires of the same name return the same
/// `Arc` and ignore their options. A document stays registered until its last
/// owner [`release`](Self::release)s it.
///
/// Every change to the directory and to owner sets happens under one lock,
/// including the file I/O for a brand-new document, so two threads can never
/// register different documents under one name.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use shared_config::{AcquireOptions, ConfigRegistry, RegistrySettings};
///
/// let registry = ConfigRegistry::new(RegistrySettings::new());
///
/// let a = registry.acquire("worker", "cache", AcquireOptions::empty()).unwrap();
/// a.set("ttl", 30);
///
/// // Same name, same instance; the options of the second call are ignored.
/// let b = registry.acquire("scheduler", "cache", AcquireOptions::new()).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(b.get_i64("ttl"), Some(30));
///
/// registry.release("worker", "cache");
/// assert!(registry.contains("cache"));
/// registry.release("scheduler", "cache");
/// assert!(!registry.contains("cache"));
/// ```
pub struct ConfigRegistry {
    settings: RwLock<RegistrySettings>,
    loader: Arc<dyn ConfigLoader>,
    directory: Mutex<HashMap<String, Arc<ConfigDocument>>>,
}

impl ConfigRegistry {
    /// Creates a registry that reads files from the local filesystem.
    pub fn new(settings: RegistrySettings) -> Self {
        Self::with_loader(settings, Arc::new(FileLoader))
    }

    /// Creates a registry that probes and reads files through `loader`.
    pub fn with_loader(settings: RegistrySettings, loader: Arc<dyn ConfigLoader>) -> Self {
        Self {
            settings: RwLock::new(settings),
            loader,
            directory: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the document registered under `name`, creating it if needed,
    /// and records `owner` as holding it.
    ///
    /// # Errors
    ///
    /// [`RegistryError::FileNotFound`] if the document needs a file and none
    /// exists on the search path, [`RegistryError::Load`] if the file cannot
    /// be read. On error nothing is registered.
    pub fn acquire(
        &self,
        owner: impl Into<OwnerId>,
        name: &str,
        options: AcquireOptions,
    ) -> Result<Arc<ConfigDocument>> {
        self.acquire_with(owner, name, options, |_| {})
    }

    /// Like [`acquire`](Self::acquire), then runs `customize` on the document
    /// (new or existing) before returning it.
    pub fn acquire_with<F>(
        &self,
        owner: impl Into<OwnerId>,
        name: &str,
        options: AcquireOptions,
        customize: F,
    ) -> Result<Arc<ConfigDocument>>
    where
        F: FnOnce(&ConfigDocument),
    {
        let owner = owner.into();
        let mut directory = self.directory.lock();

        if let Some(document) = directory.get(name) {
            if self.settings.read().reload_on_reacquire() {
                document.reload();
            }
            document.add_owner(owner.clone());
            customize(document);
            debug!(name = %name, %owner, owners = document.owner_count(), "reusing configuration");
            return Ok(Arc::clone(document));
        }

        let settings = self.settings.read().clone();
        let document = ConfigDocument::open(name, &options, &settings, Arc::clone(&self.loader))?;
        customize(&document);
        document.add_owner(owner.clone());

        let document = Arc::new(document);
        directory.insert(name.to_string(), Arc::clone(&document));
        debug!(
            name = %name,
            %owner,
            file = ?document.resolved_file(),
            "created configuration"
        );
        Ok(document)
    }

    /// Drops `owner` from the document registered under `name`, discarding
    /// the document once nobody holds it.
    ///
    /// Returns true if the document was discarded. Unknown names and owners
    /// are ignored.
    pub fn release(&self, owner: impl Into<OwnerId>, name: &str) -> bool {
        let owner = owner.into();
        let mut directory = self.directory.lock();

        let Some(document) = directory.get(name) else {
            return false;
        };
        let remaining = document.drop_owner(&owner);
        debug!(name = %name, %owner, remaining, "released configuration");
        if remaining > 0 {
            return false;
        }
        directory.remove(name);
        info!(name = %name, "discarded unreferenced configuration");
        true
    }

    /// Discards every registered document regardless of owners.
    pub fn reset(&self) {
        let mut directory = self.directory.lock();
        let discarded = directory.len();
        directory.clear();
        info!(discarded, "configuration registry reset");
    }

    /// Lets `f` edit the defaults used for documents created from now on.
    ///
    /// Concurrent `configure` calls run one after another, so no edit is
    /// lost. `f` works on a copy that is stored once it returns; it may
    /// acquire documents but must not call `configure` itself. Existing
    /// documents are unaffected.
    pub fn configure<R>(&self, f: impl FnOnce(&mut RegistrySettings) -> R) -> R {
        let current = self.settings.upgradable_read();
        let mut settings = current.clone();
        let result = f(&mut settings);
        *RwLockUpgradableReadGuard::upgrade(current) = settings;
        result
    }

    /// A copy of the current defaults.
    pub fn settings(&self) -> RegistrySettings {
        self.settings.read().clone()
    }

    /// Returns the registered document without recording an owner.
    pub fn get(&self, name: &str) -> Option<Arc<ConfigDocument>> {
        self.directory.lock().get(name).cloned()
    }

    /// Returns true if a document is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.directory.lock().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.directory.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered documents.
    pub fn len(&self) -> usize {
        self.directory.lock().len()
    }

    /// Returns true if no documents are registered.
    pub fn is_empty(&self) -> bool {
        self.directory.lock().is_empty()
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}

impl std::fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("settings", &*self.settings.read())
            .field("names", &self.names())
            .finish()
    }
}

// Global registry state
struct PendingSettings {
    settings: Option<RegistrySettings>,
    locked: bool,
}

static PENDING_SETTINGS: Mutex<PendingSettings> = parking_lot::const_mutex(PendingSettings {
    settings: None,
    locked: false,
});
static GLOBAL_REGISTRY: OnceLock<ConfigRegistry> = OnceLock::new();

/// Sets the defaults for the process-wide registry.
///
/// Must be called **before** the first call to [`global_registry`]; after
/// that the defaults can only be changed through
/// [`ConfigRegistry::configure`].
///
/// # Errors
///
/// [`RegistryError::AlreadyInitialized`] once the global registry exists.
///
/// ```rust,ignore
/// use shared_config::{global_registry, init_global_registry, RegistrySettings};
///
/// init_global_registry(RegistrySettings::default().with_user_config_dir("myapp"))?;
/// let db = global_registry().acquire("app", "database", Default::default())?;
/// ```
pub fn init_global_registry(settings: RegistrySettings) -> Result<()> {
    let mut pending = PENDING_SETTINGS.lock();
    if pending.locked {
        return Err(RegistryError::AlreadyInitialized);
    }
    pending.settings = Some(settings);
    Ok(())
}

/// The process-wide registry, created on first access from the settings
/// given to [`init_global_registry`] (or the defaults).
pub fn global_registry() -> &'static ConfigRegistry {
    GLOBAL_REGISTRY.get_or_init(|| {
        let mut pending = PENDING_SETTINGS.lock();
        pending.locked = true;
        ConfigRegistry::new(pending.settings.take().unwrap_or_default())
    })
}
