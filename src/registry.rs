//! Scenario-scoped registry of named resources
//!
//! Resource steps register a manifest under a logical name ("a resource
//! called foo"); later assertion steps look the name up to learn which live
//! object to fetch.
//!
//! # Example
//!
//! ```
//! use kubebdd::registry::ObjectRegistry;
//!
//! let mut registry = ObjectRegistry::new();
//! registry.register_manifest("foo", "
//! apiVersion: v1
//! kind: ConfigMap
//! metadata:
//!   name: foo-config
//! ").unwrap();
//!
//! assert_eq!(registry.get("foo").unwrap().name, "foo-config");
//! ```

use std::collections::HashMap;
use std::fmt;

/// Errors from registering resources
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("provided resource has an empty apiVersion")]
    MissingApiVersion,

    #[error("provided resource has an empty kind")]
    MissingKind,

    #[error("provided resource has an empty metadata.name")]
    MissingName,
}

/// Identity of a live object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ObjectRef {
    /// Create a reference to a namespaced or defaulted object
    #[must_use]
    pub fn new(api_version: &str, kind: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: None,
        }
    }

    /// Set the namespace
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Split `api_version` into (group, version); the core group is ""
    #[must_use]
    pub fn group_version(&self) -> (&str, &str) {
        self.api_version
            .split_once('/')
            .unwrap_or(("", self.api_version.as_str()))
    }

    /// Read identity fields from a YAML or JSON manifest
    ///
    /// Tabs are expanded to two spaces first, since YAML forbids them as
    /// indentation and feature files often contain them.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the manifest does not parse or lacks
    /// `apiVersion`, `kind` or `metadata.name`.
    pub fn from_manifest(manifest: &str) -> Result<Self, RegistryError> {
        let manifest = manifest.replace('\t', "  ");
        let doc: serde_json::Value = serde_yaml::from_str(&manifest)
            .map_err(|e| RegistryError::InvalidManifest(e.to_string()))?;

        let field = |pointer: &str| {
            doc.pointer(pointer)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };

        Ok(Self {
            api_version: field("/apiVersion").ok_or(RegistryError::MissingApiVersion)?,
            kind: field("/kind").ok_or(RegistryError::MissingKind)?,
            name: field("/metadata/name").ok_or(RegistryError::MissingName)?,
            namespace: field("/metadata/namespace"),
        })
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} ({ns})", self.kind.to_lowercase(), self.name),
            None => write!(f, "{}/{}", self.kind.to_lowercase(), self.name),
        }
    }
}

/// Logical name to object reference mapping, owned by one scenario
#[derive(Debug, Default, Clone)]
pub struct ObjectRegistry {
    objects: HashMap<String, ObjectRef>,
}

impl ObjectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a reference under `name`
    pub fn register(&mut self, name: impl Into<String>, object: ObjectRef) {
        let name = name.into();
        tracing::debug!(reference = %name, object = %object, "Registered resource");
        self.objects.insert(name, object);
    }

    /// Parse `manifest` and register it under `name`
    ///
    /// # Errors
    ///
    /// See [`ObjectRef::from_manifest`].
    pub fn register_manifest(
        &mut self,
        name: impl Into<String>,
        manifest: &str,
    ) -> Result<&ObjectRef, RegistryError> {
        let name = name.into();
        let object = ObjectRef::from_manifest(manifest)?;
        self.register(name.clone(), object);
        Ok(&self.objects[&name])
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ObjectRef> {
        self.objects.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
