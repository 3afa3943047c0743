//! Storage port: repository traits for persistence.
//!
//! The hub owns persistence; integrations never talk to repositories
//! directly; they go through the
//! [`IntegrationContext`](crate::ports::IntegrationContext).

use std::future::Future;

use enohub_domain::device::Device;
use enohub_domain::entity::Entity;
use enohub_domain::error::HubError;
use enohub_domain::id::DeviceId;

/// Repository for persisting and querying [`Device`]s.
pub trait DeviceRepository {
    /// Insert a new device.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send;

    /// List every device.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send;

    /// Find the device an integration registered under `unique_id`.
    fn find_by_integration_unique_id(
        &self,
        integration: &str,
        unique_id: &str,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send;

    /// Replace an existing device.
    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send;
}

/// Repository for persisting and querying [`Entity`]s.
pub trait EntityRepository {
    /// Insert a new entity.
    fn create(&self, entity: Entity) -> impl Future<Output = Result<Entity, HubError>> + Send;

    /// List every entity.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Entity>, HubError>> + Send;

    /// List the entities attached to a device.
    fn find_by_device_id(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Vec<Entity>, HubError>> + Send;

    /// Find an entity by its `entity_id` string (e.g. `switch.enocean_04050607_1`).
    fn find_by_entity_id(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<Option<Entity>, HubError>> + Send;

    /// Replace an existing entity.
    fn update(&self, entity: Entity) -> impl Future<Output = Result<Entity, HubError>> + Send;
}
