//! EnOcean adapter error types.

use enohub_domain::error::HubError;

use crate::transport::TransportError;

/// Errors specific to the EnOcean adapter.
#[derive(Debug, thiserror::Error)]
pub enum EnOceanError {
    /// A device identifier is not four colon-separated hex bytes.
    #[error("invalid EnOcean id: {0}")]
    InvalidIdentifier(String),

    /// An equipment profile is not three colon-separated hex bytes.
    #[error("invalid EnOcean EEP: {0}")]
    InvalidEquipmentProfile(String),

    /// A switch channel does not fit the 5-bit I/O channel field.
    #[error("channel {0} is out of range (max 0x1F)")]
    InvalidChannel(i64),

    /// The dispatcher was configured with a zero capacity.
    #[error("dispatch capacity must be greater than zero")]
    InvalidCapacity,

    /// No dongle path was configured and none was detected.
    #[error("no EnOcean dongle found")]
    MissingDevice,

    /// A background operation was requested before `setup`.
    #[error("integration is not set up")]
    NotStarted,

    /// The protocol transport failed.
    #[error("transport error")]
    Transport(#[from] TransportError),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] HubError),
}

impl EnOceanError {
    /// Convert into a [`HubError`] for propagation across port boundaries.
    #[must_use]
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Domain(err) => err,
            other => HubError::Integration(Box::new(other)),
        }
    }
}

impl From<EnOceanError> for HubError {
    fn from(err: EnOceanError) -> Self {
        err.into_domain()
    }
}
