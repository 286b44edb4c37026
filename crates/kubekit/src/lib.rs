//! # kubekit
//!
//! Just enough of the cluster API to deploy a manifest whose creation-time
//! inputs may change between runs.
//!
//! ## What it does
//!
//! - Read and write annotations on a namespace.
//! - Apply or delete a rendered manifest (opaque bytes).
//! - Decide, from a [`gate::Fingerprint`] stored as a namespace annotation,
//!   whether the manifest must be deleted before it is applied again.
//!
//! ## Example
//!
//! ```no_run
//! use kubekit::{Client, Fingerprint, POSTGRES_FINGERPRINT_ANNOTATION, RolloutOptions};
//!
//! let client = Client::new()?;
//! let gate = client.gate("external", POSTGRES_FINGERPRINT_ANNOTATION);
//!
//! let fingerprint = Fingerprint::compute(&[
//!     ("user", "admin"),
//!     ("password", "p1"),
//!     ("database", "postgres"),
//! ]);
//! let decision = gate.decide(fingerprint)?;
//! gate.rollout(&decision, b"apiVersion: v1\nkind: Namespace\n", RolloutOptions::default())?;
//! # Ok::<(), kubekit::Error>(())
//! ```
//!
//! ## Backends
//!
//! - `kubectl` (default): shells out to the `kubectl` on `PATH`, using the
//!   current context.

#![deny(unsafe_code)]
#![warn(clippy::all)]

/// Backend implementations for cluster operations.
pub mod backend;
/// Error types for cluster operations.
pub mod error;
/// Fingerprint gate and rollout.
pub mod gate;

pub use backend::{Annotations, Backend, DeleteOptions};
pub use error::{Error, ErrorCategory, Result};
pub use gate::{
    Decision, Fingerprint, Gate, POSTGRES_FINGERPRINT_ANNOTATION, Previous, RolloutOptions,
    RolloutOutcome,
};

/// High-level client over a cluster backend.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client backed by `kubectl`.
    ///
    /// Fails if `kubectl` is not on `PATH`.
    pub fn new() -> Result<Self> {
        let backend = backend::default_backend()?;
        Ok(Self {
            backend: Box::new(backend),
        })
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Borrow the underlying backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// A gate over `annotation` on `namespace`.
    pub fn gate(&self, namespace: &str, annotation: &str) -> Gate<'_> {
        Gate::new(self.backend(), namespace, annotation)
    }

    /// Annotations on `namespace`.
    pub fn namespace_annotations(&self, namespace: &str) -> Result<Annotations> {
        self.backend.namespace_annotations(namespace)
    }
}
