//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! when crossing a port boundary. No variant carries a bare `String` reason;
//! adapter failures are boxed with their full source chain.

/// Workspace-wide error returned by ports and services.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The requested record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A persistence backend failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An integration (protocol adapter) failed.
    #[error("integration error")]
    Integration(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("entity_id must not be empty")]
    EmptyEntityId,

    #[error("integration must not be empty")]
    EmptyIntegration,

    #[error("unique_id must not be empty")]
    EmptyUniqueId,
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of record that was looked up (e.g. `"Device"`).
    pub entity: &'static str,
    /// The identifier that was not found.
    pub id: String,
}
