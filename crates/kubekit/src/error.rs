use thiserror::Error;

/// Broad classes of cluster API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// kubectl missing or the API server unreachable
    Connectivity,
    /// Reading cluster state failed or returned something unexpected
    StateQuery,
    /// apply/delete/annotate was rejected
    Mutation,
}

/// Errors that can occur while talking to the cluster.
#[derive(Debug, Error)]
pub enum Error {
    /// The namespace does not exist
    #[error("namespace not found: {0}")]
    NotFound(String),

    /// kubectl is not on PATH
    #[error("kubectl not found in PATH")]
    KubectlNotFound,

    /// kubectl exited non-zero
    #[error("kubectl {command} failed: {stderr}")]
    CommandFailed {
        /// Arguments passed to kubectl
        command: String,
        /// Captured stderr (or stdout when stderr was empty)
        stderr: String,
    },

    /// The annotation map on a namespace could not be decoded
    #[error("invalid annotations on namespace {namespace}: {message}")]
    InvalidAnnotations {
        /// Namespace whose metadata was read
        namespace: String,
        /// Decoder error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::KubectlNotFound | Error::Io(_) => ErrorCategory::Connectivity,
            Error::NotFound(_) | Error::InvalidAnnotations { .. } => ErrorCategory::StateQuery,
            Error::CommandFailed { stderr, .. } if is_connectivity_message(stderr) => {
                ErrorCategory::Connectivity
            }
            Error::CommandFailed { command, .. } if command.starts_with("get ") => {
                ErrorCategory::StateQuery
            }
            Error::CommandFailed { .. } => ErrorCategory::Mutation,
        }
    }

    /// Whether this error means the object is absent rather than unreadable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Classify kubectl output for a failed command.
    ///
    /// Only the API server's answer for `namespace` itself counts as
    /// absence. Other "not found" messages (a missing kube context, an
    /// unknown resource type) stay [`Error::CommandFailed`].
    pub fn from_kubectl_output(command: &str, stderr: &str, namespace: Option<&str>) -> Self {
        if let Some(ns) = namespace {
            if is_namespace_not_found(stderr, ns) {
                return Error::NotFound(ns.to_string());
            }
        }
        Error::CommandFailed {
            command: command.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }
}

fn is_namespace_not_found(stderr: &str, namespace: &str) -> bool {
    let answer = format!("namespaces \"{namespace}\" not found");
    stderr.contains("(NotFound)") && stderr.contains(&answer)
}

fn is_connectivity_message(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("connection refused")
        || lower.contains("unable to connect to the server")
        || lower.contains("i/o timeout")
        || lower.contains("no such host")
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;
