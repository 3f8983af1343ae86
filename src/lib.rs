//! Shared Config: a reference-counted registry of named configuration documents.
//!
//! Independent parts of a program ask the registry for a configuration by
//! name. The first request builds the document, finding and loading its
//! backing file; every later request for the same name gets the same shared
//! instance. Each requester is recorded as an owner, and the document is
//! dropped from the registry as soon as its last owner releases it.
//!
//! # Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use shared_config::{AcquireOptions, ConfigRegistry, RegistrySettings};
//!
//! let registry = ConfigRegistry::new(RegistrySettings::new());
//!
//! // A document with no backing file
//! let session = registry.acquire("web", "session", AcquireOptions::empty()).unwrap();
//! session.set("cookie", "sid");
//!
//! // Another owner gets the same instance
//! let same = registry.acquire("api", "session", AcquireOptions::empty()).unwrap();
//! assert!(Arc::ptr_eq(&session, &same));
//! assert_eq!(same.get_str("cookie").as_deref(), Some("sid"));
//!
//! registry.release("web", "session");
//! registry.release("api", "session");
//! assert!(!registry.contains("session"));
//! ```
//!
//! # File Discovery
//!
//! Unless an explicit file is given, a document named `name` is looked up as
//! `{dir}/{name}.{ext}` for each directory on the search path and each
//! candidate extension, in that order. The first existing file wins. The
//! default search path is `.` then `config`, with extensions `yml`, `yaml`
//! (`yaml-format` feature), `json` and `toml` (`toml-format` feature). Both
//! format features are enabled by default.
//!
//! ```rust,ignore
//! use shared_config::{AcquireOptions, ConfigRegistry, RegistrySettings};
//!
//! let registry = ConfigRegistry::new(
//!     RegistrySettings::default().with_user_config_dir("myapp"),
//! );
//!
//! // ./database.yml, ./database.yaml, ./database.json, ./database.toml, config/database.yml, ...
//! let db = registry.acquire("app", "database", AcquireOptions::new())?;
//! let pool: u32 = db.get_path_as("pool.size").unwrap_or(4);
//!
//! // Search extra directories first
//! let local = registry.acquire(
//!     "app",
//!     "overrides",
//!     AcquireOptions::new().path_insert(["local", "shared"]),
//! )?;
//! ```
//!
//! # Reloading
//!
//! [`ConfigDocument::reload`] clears a document and reads its file again.
//! Reloading only ever happens when asked for, either directly or by enabling
//! [`RegistrySettings::with_reload_on_reacquire`]. A reload that fails leaves
//! the document empty.
//!
//! # Process-wide Registry
//!
//! [`global_registry`] returns a lazily created registry shared by the whole
//! process. Its defaults can be set with [`init_global_registry`] before
//! first use. Code that can take an explicit `&ConfigRegistry` should prefer
//! it; tests can then build isolated registries.

mod error;
pub use error::{RegistryError, Result};

mod loader;
pub use loader::{ConfigLoader, Content, FileLoader, LoadError};

mod owner;
pub use owner::{OwnerId, OwnerSet};

mod settings;
pub use settings::{AcquireOptions, RegistrySettings};

mod config_document;
pub use config_document::ConfigDocument;

mod config_registry;
pub use config_registry::{ConfigRegistry, global_registry, init_global_registry};

mod config_user;
pub use config_user::ConfigUser;
