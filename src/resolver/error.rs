//! Resolution errors and their stable reason codes.

use std::fmt;

use thiserror::Error;

use crate::model::ObjectKey;

/// Stable reason codes written into fragment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reason {
    RootNamespaceError,
    IncludeCycleError,
    OrphanedError,
    DuplicateFqdnError,
    PolicyError,
    ConditionError,
    IncludeError,
    ServiceError,
    TlsError,
    VirtualHostError,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::RootNamespaceError => "RootNamespaceError",
            Reason::IncludeCycleError => "IncludeCycleError",
            Reason::OrphanedError => "OrphanedError",
            Reason::DuplicateFqdnError => "DuplicateFQDNError",
            Reason::PolicyError => "PolicyError",
            Reason::ConditionError => "ConditionError",
            Reason::IncludeError => "IncludeError",
            Reason::ServiceError => "ServiceError",
            Reason::TlsError => "TLSError",
            Reason::VirtualHostError => "VirtualHostError",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Reason::IncludeCycleError
            | Reason::OrphanedError
            | Reason::DuplicateFqdnError
            | Reason::IncludeError => ErrorClass::Structural,
            Reason::RootNamespaceError => ErrorClass::Conflict,
            Reason::PolicyError
            | Reason::ConditionError
            | Reason::ServiceError
            | Reason::TlsError
            | Reason::VirtualHostError => ErrorClass::Policy,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy. Every class is local to the fragment or tree it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Cycle, orphan, duplicate FQDN, bad include.
    Structural,
    /// Malformed value; the fragment serves nothing.
    Policy,
    /// Root declared outside the allowed namespaces; the tree is discarded.
    Conflict,
}

/// A validation failure attached to one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("root fragments cannot be defined in namespace {namespace:?}")]
    RootNamespace { namespace: String },

    #[error("include creates a cycle: {path}")]
    IncludeCycle { path: String },

    #[error("fragment is not part of a delegation chain from a valid root")]
    Orphaned,

    #[error("fqdn {fqdn:?} is already claimed by {owner}")]
    DuplicateFqdn { fqdn: String, owner: ObjectKey },

    #[error("{0}")]
    Policy(String),

    #[error("{0}")]
    Condition(String),

    #[error("{0}")]
    Include(String),

    #[error("{0}")]
    Service(String),

    #[error("{0}")]
    Tls(String),

    #[error("{0}")]
    VirtualHost(String),
}

impl ResolveError {
    pub fn reason(&self) -> Reason {
        match self {
            ResolveError::RootNamespace { .. } => Reason::RootNamespaceError,
            ResolveError::IncludeCycle { .. } => Reason::IncludeCycleError,
            ResolveError::Orphaned => Reason::OrphanedError,
            ResolveError::DuplicateFqdn { .. } => Reason::DuplicateFqdnError,
            ResolveError::Policy(_) => Reason::PolicyError,
            ResolveError::Condition(_) => Reason::ConditionError,
            ResolveError::Include(_) => Reason::IncludeError,
            ResolveError::Service(_) => Reason::ServiceError,
            ResolveError::Tls(_) => Reason::TlsError,
            ResolveError::VirtualHost(_) => Reason::VirtualHostError,
        }
    }
}

/// A non-fatal finding. The fragment stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveWarning {
    #[error("include {target} not found; it contributes no routes")]
    IncludeNotFound { target: ObjectKey },
}

impl ResolveWarning {
    pub fn reason(&self) -> &'static str {
        match self {
            ResolveWarning::IncludeNotFound { .. } => "IncludeNotFound",
        }
    }
}
