use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{AcquireOptions, ConfigDocument, ConfigRegistry, OwnerId, RegistryError, Result};

#[derive(Debug)]
enum Binding {
    Config(Arc<ConfigDocument>),
    Reserved,
}

/// Named configuration bindings held on behalf of one owner.
///
/// A component that wants several configurations keeps a `ConfigUser` and
/// looks documents up by the name it bound them under. Names can also be
/// [reserved](Self::reserve) for members that are not configurations, in
/// which case binding a configuration under that name fails.
///
/// Dropping a `ConfigUser` releases everything it still holds.
///
/// ```
/// use shared_config::{AcquireOptions, ConfigRegistry, ConfigUser, RegistrySettings};
///
/// let registry = ConfigRegistry::new(RegistrySettings::new());
/// {
///     let mut user = ConfigUser::new(&registry, "mailer");
///     user.use_config("smtp", AcquireOptions::empty()).unwrap();
///     user.config("smtp").unwrap().set("port", 25);
///     assert!(registry.contains("smtp"));
/// }
/// assert!(!registry.contains("smtp"));
/// ```
#[derive(Debug)]
pub struct ConfigUser<'r> {
    registry: &'r ConfigRegistry,
    owner: OwnerId,
    bindings: HashMap<String, Binding>,
}

impl<'r> ConfigUser<'r> {
    /// Creates a user with no bindings that acquires as `owner`.
    pub fn new(registry: &'r ConfigRegistry, owner: impl Into<OwnerId>) -> Self {
        Self {
            registry,
            owner: owner.into(),
            bindings: HashMap::new(),
        }
    }

    /// Creates a user whose owner id is the name of `T`.
    pub fn for_type<T: ?Sized>(registry: &'r ConfigRegistry) -> Self {
        Self::new(registry, OwnerId::of::<T>())
    }

    /// Returns the owner id used for every acquire and release.
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Acquires the configuration `name` and binds it under the same name.
    ///
    /// Binding a name that already holds a configuration acquires it again,
    /// which reloads it when the registry is set to reload on reacquire.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NameInUse`] if `name` is reserved, or any error from
    /// [`ConfigRegistry::acquire`].
    pub fn use_config(&mut self, name: &str, options: AcquireOptions) -> Result<Arc<ConfigDocument>> {
        self.use_config_with(name, options, |_| {})
    }

    /// Like [`use_config`](Self::use_config), running `customize` on the
    /// document.
    pub fn use_config_with<F>(
        &mut self,
        name: &str,
        options: AcquireOptions,
        customize: F,
    ) -> Result<Arc<ConfigDocument>>
    where
        F: FnOnce(&ConfigDocument),
    {
        if let Some(Binding::Reserved) = self.bindings.get(name) {
            return Err(RegistryError::NameInUse {
                name: name.to_string(),
            });
        }
        let document = self
            .registry
            .acquire_with(&self.owner, name, options, customize)?;
        self.bindings
            .insert(name.to_string(), Binding::Config(Arc::clone(&document)));
        Ok(document)
    }

    /// Marks `name` as taken by something that is not a configuration.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NameInUse`] if `name` is already bound to a
    /// configuration.
    pub fn reserve(&mut self, name: &str) -> Result<()> {
        if let Some(Binding::Config(_)) = self.bindings.get(name) {
            return Err(RegistryError::NameInUse {
                name: name.to_string(),
            });
        }
        self.bindings.insert(name.to_string(), Binding::Reserved);
        Ok(())
    }

    /// Returns the configuration bound under `name`, if any.
    pub fn config(&self, name: &str) -> Option<Arc<ConfigDocument>> {
        match self.bindings.get(name) {
            Some(Binding::Config(document)) => Some(Arc::clone(document)),
            _ => None,
        }
    }

    /// Releases and unbinds the configuration bound under `name`.
    ///
    /// Returns false if `name` is not bound to a configuration; reserved
    /// names are left alone.
    pub fn drop_config(&mut self, name: &str) -> bool {
        if !matches!(self.bindings.get(name), Some(Binding::Config(_))) {
            return false;
        }
        self.bindings.remove(name);
        self.registry.release(&self.owner, name);
        true
    }

    /// Names currently bound to configurations, sorted.
    pub fn config_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, binding)| matches!(binding, Binding::Config(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Drop for ConfigUser<'_> {
    fn drop(&mut self) {
        for (name, binding) in self.bindings.drain() {
            if let Binding::Config(_) = binding {
                self.registry.release(&self.owner, &name);
            }
        }
        debug!(owner = %self.owner, "config user dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistrySettings;

    #[test]
    fn test_reserved_name_rejects_config() {
        let registry = ConfigRegistry::new(RegistrySettings::new());
        let mut user = ConfigUser::new(&registry, "widget");
        user.reserve("render").unwrap();

        let err = user.use_config("render", AcquireOptions::empty()).unwrap_err();
        assert!(matches!(err, RegistryError::NameInUse { ref name } if name == "render"));
        assert!(!registry.contains("render"));
    }

    #[test]
    fn test_reserve_over_config_is_rejected() {
        let registry = ConfigRegistry::new(RegistrySettings::new());
        let mut user = ConfigUser::new(&registry, "widget");
        user.use_config("theme", AcquireOptions::empty()).unwrap();
        assert!(matches!(
            user.reserve("theme"),
            Err(RegistryError::NameInUse { .. })
        ));
        assert!(user.config("theme").is_some());
    }

    #[test]
    fn test_rebinding_config_is_allowed() {
        let registry = ConfigRegistry::new(RegistrySettings::new());
        let mut user = ConfigUser::new(&registry, "widget");
        let first = user.use_config("theme", AcquireOptions::empty()).unwrap();
        let second = user.use_config("theme", AcquireOptions::empty()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.owner_count(), 1);
    }

    #[test]
    fn test_drop_config_releases() {
        let registry = ConfigRegistry::new(RegistrySettings::new());
        let mut user = ConfigUser::new(&registry, "widget");
        user.use_config("theme", AcquireOptions::empty()).unwrap();
        user.reserve("render").unwrap();

        assert!(!user.drop_config("render"));
        assert!(!user.drop_config("unknown"));
        assert!(user.drop_config("theme"));
        assert!(user.config("theme").is_none());
        assert!(!registry.contains("theme"));
    }

    #[test]
    fn test_two_users_share_until_both_drop() {
        struct Header;
        struct Footer;

        let registry = ConfigRegistry::new(RegistrySettings::new());
        let mut header = ConfigUser::for_type::<Header>(&registry);
        let doc = header.use_config("layout", AcquireOptions::empty()).unwrap();
        doc.set("width", 80);
        {
            let mut footer = ConfigUser::for_type::<Footer>(&registry);
            let shared = footer.use_config("layout", AcquireOptions::empty()).unwrap();
            assert_eq!(shared.get_i64("width"), Some(80));
            assert_eq!(shared.owner_count(), 2);
            assert_eq!(footer.config_names(), vec!["layout".to_string()]);
        }
        assert_eq!(doc.owner_count(), 1);
        assert!(registry.contains("layout"));
        drop(header);
        assert!(!registry.contains("layout"));
    }
}
