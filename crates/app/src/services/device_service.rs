//! Device service: the device registry, keyed by integration and unique id.

use enohub_domain::device::Device;
use enohub_domain::error::HubError;

use crate::ports::DeviceRepository;

/// Device registry use-cases.
pub struct DeviceService<R> {
    repo: R,
}

impl<R: DeviceRepository> DeviceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Store a new device.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for an invalid device, or the
    /// repository failure.
    #[tracing::instrument(skip(self, device), fields(unique_id = %device.unique_id))]
    pub async fn create_device(&self, device: Device) -> Result<Device, HubError> {
        device.validate()?;
        self.repo.create(device).await
    }

    /// The devices registered by `integration`.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn list_by_integration(&self, integration: &str) -> Result<Vec<Device>, HubError> {
        let mut devices = self.repo.get_all().await?;
        devices.retain(|d| d.integration == integration);
        Ok(devices)
    }

    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn find_by_integration_unique_id(
        &self,
        integration: &str,
        unique_id: &str,
    ) -> Result<Option<Device>, HubError> {
        self.repo
            .find_by_integration_unique_id(integration, unique_id)
            .await
    }

    /// Create the device, or overwrite the one already registered under the
    /// same `(integration, unique_id)` while keeping its id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for an invalid device, or the
    /// repository failure.
    #[tracing::instrument(skip(self, device), fields(unique_id = %device.unique_id))]
    pub async fn upsert_device(&self, device: Device) -> Result<Device, HubError> {
        let known = self
            .repo
            .find_by_integration_unique_id(&device.integration, &device.unique_id)
            .await?;
        let Some(existing) = known else {
            return self.create_device(device).await;
        };
        let device = Device {
            id: existing.id,
            ..device
        };
        device.validate()?;
        self.repo.update(device).await
    }
}
