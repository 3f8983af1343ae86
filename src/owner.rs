use std::fmt;

/// An opaque identifier for a consumer holding a configuration document.
///
/// The registry never interprets an owner; it only compares owners for
/// equality when counting references.
///
/// # Examples
///
/// ```
/// use shared_config::OwnerId;
///
/// struct Server;
///
/// let by_name = OwnerId::from("server");
/// let by_type = OwnerId::of::<Server>();
/// assert_eq!(by_name.as_str(), "server");
/// assert!(by_type.as_str().ends_with("Server"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an owner id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Names the owner after a Rust type.
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&OwnerId> for OwnerId {
    fn from(id: &OwnerId) -> Self {
        id.clone()
    }
}

/// The set of owners currently holding a document.
///
/// Membership only: adding an owner twice keeps one entry, and dropping an
/// absent owner changes nothing. Insertion order is preserved for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerSet {
    owners: Vec<OwnerId>,
}

impl OwnerSet {
    /// Creates an empty owner set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `owner`, returning false if it was already present.
    pub fn add(&mut self, owner: OwnerId) -> bool {
        if self.owners.contains(&owner) {
            return false;
        }
        self.owners.push(owner);
        true
    }

    /// Removes `owner`, returning false if it was not present.
    pub fn drop_owner(&mut self, owner: &OwnerId) -> bool {
        match self.owners.iter().position(|o| o == owner) {
            Some(index) => {
                self.owners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns true if `owner` is in the set.
    pub fn contains(&self, owner: &OwnerId) -> bool {
        self.owners.contains(owner)
    }

    /// Returns the number of owners.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns true if no owner is present.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Returns an iterator over the owners in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &OwnerId> {
        self.owners.iter()
    }

    /// Returns the owners as a vector, in insertion order.
    pub fn to_vec(&self) -> Vec<OwnerId> {
        self.owners.clone()
    }
}
