//! Plugin-based component registry
//!
//! Authorities and mirror stores are looked up by the `type` tag of their
//! configuration, so the binary never hard-codes which implementations exist.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dns_mirror_core::registry::ComponentRegistry;
//!
//! // Memory and file stores are registered already
//! let mut registry = ComponentRegistry::with_builtin_stores();
//!
//! // Adapter crates register themselves
//! dns_mirror_provider_aliyun::register(&mut registry);
//! dns_mirror_store_mysql::register(&mut registry);
//!
//! let authority = registry.create_authority(&config.authority)?;
//! let store = registry.create_store(&config.store).await?;
//! ```

use crate::config::{AuthorityConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileMirrorStoreFactory, MemoryMirrorStoreFactory};
use crate::traits::{MirrorStore, MirrorStoreFactory, RecordAuthority, RecordAuthorityFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of authority and store factories
///
/// Registration takes `&mut self`; the registry is assembled once at
/// startup and only read afterwards.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered authority factories
    authorities: HashMap<String, Box<dyn RecordAuthorityFactory>>,

    /// Registered store factories
    stores: HashMap<String, Arc<dyn MirrorStoreFactory>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` stores registered
    pub fn with_builtin_stores() -> Self {
        let mut registry = Self::new();
        registry.register_store("memory", Box::new(MemoryMirrorStoreFactory));
        registry.register_store("file", Box::new(FileMirrorStoreFactory));
        registry
    }

    /// Register an authority factory under its config type name (e.g. "aliyun")
    pub fn register_authority(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn RecordAuthorityFactory>,
    ) {
        self.authorities.insert(name.into(), factory);
    }

    /// Register a store factory under its config type name (e.g. "mysql")
    pub fn register_store(&mut self, name: impl Into<String>, factory: Box<dyn MirrorStoreFactory>) {
        self.stores.insert(name.into(), Arc::from(factory));
    }

    /// Create an authority from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordAuthority>)`: Created authority
    /// - `Err(Error)`: Type not registered or creation failed
    pub fn create_authority(&self, config: &AuthorityConfig) -> Result<Box<dyn RecordAuthority>> {
        let authority_type = config.type_name();
        let factory = self.authorities.get(authority_type).ok_or_else(|| {
            Error::config(format!("Unknown authority type: {}", authority_type))
        })?;

        factory.create(config)
    }

    /// Create a mirror store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn MirrorStore>)`: Created store
    /// - `Err(Error)`: Type not registered or creation failed
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn MirrorStore>> {
        let store_type = config.type_name();
        let factory = self
            .stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
            .clone();

        factory.create(config).await
    }

    /// List all registered authority types
    pub fn list_authorities(&self) -> Vec<String> {
        self.authorities.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Check if an authority type is registered
    pub fn has_authority(&self, name: &str) -> bool {
        self.authorities.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }
}
