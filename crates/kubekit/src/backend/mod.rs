//! Backend abstraction for the cluster API.
//!
//! Only the handful of operations the gate needs are modeled: read and
//! write namespace annotations, apply and delete an opaque manifest.

pub mod kubectl;

use std::collections::BTreeMap;

use crate::error::Result;

/// Annotation key/value pairs on a resource.
pub type Annotations = BTreeMap<String, String>;

/// How a manifest deletion should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Block until the objects are gone
    pub wait: bool,
    /// Treat already-absent objects as success
    pub ignore_not_found: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            wait: true,
            ignore_not_found: true,
        }
    }
}

/// Backend trait for cluster operations.
///
/// Implementations exist for the real `kubectl` binary; tests provide
/// in-memory ones.
pub trait Backend {
    /// Annotations on `namespace`. A missing namespace is
    /// [`Error::NotFound`](crate::Error::NotFound), never an empty map.
    fn namespace_annotations(&self, namespace: &str) -> Result<Annotations>;

    /// Set (or overwrite) one annotation on `namespace`.
    fn annotate_namespace(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Apply a manifest.
    fn apply_manifest(&self, manifest: &[u8]) -> Result<()>;

    /// Delete every object in a manifest.
    fn delete_manifest(&self, manifest: &[u8], options: DeleteOptions) -> Result<()>;
}

/// Get the default backend (real kubectl).
pub fn default_backend() -> Result<kubectl::KubectlBackend> {
    kubectl::KubectlBackend::new()
}
