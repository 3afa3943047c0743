//! Integration port: lifecycle and service-call handling for device integrations.
//!
//! An integration bridges a radio protocol (EnOcean, …) into enohub. It
//! restores what the registry already knows on startup, learns new devices
//! from traffic, and handles service calls directed at entities it owns.

use std::future::Future;

use enohub_domain::device::Device;
use enohub_domain::entity::Entity;
use enohub_domain::error::HubError;
use enohub_domain::event::Event;
use enohub_domain::id::{DeviceId, EntityId};

/// Registry view handed to integrations.
///
/// This is a **port**: adapters call it to persist and look up the devices
/// and entities they manage. [`ServiceContext`](crate::services::integration_context::ServiceContext)
/// is the concrete implementation backed by `DeviceService` and `EntityService`.
pub trait IntegrationContext: Send + Sync {
    /// Persist a device (create or update by `integration`+`unique_id`).
    fn upsert_device(&self, device: Device)
    -> impl Future<Output = Result<Device, HubError>> + Send;

    /// Persist an entity (create or update by `entity_id` string).
    ///
    /// Publishes `StateChanged` / `EntityCreated` events when appropriate.
    fn upsert_entity(&self, entity: Entity)
    -> impl Future<Output = Result<Entity, HubError>> + Send;

    /// Publish a domain event to the event bus.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Find the device `integration` registered under `unique_id`.
    fn find_device(
        &self,
        integration: &str,
        unique_id: &str,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send;

    /// List every device owned by `integration`.
    fn list_devices(
        &self,
        integration: &str,
    ) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send;

    /// List the entities attached to a device.
    fn list_entities(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Vec<Entity>, HubError>> + Send;
}

/// A pluggable device integration.
///
/// The host calls the lifecycle methods in order:
///
/// 1. [`setup`](Self::setup): open the hardware and restore known entities
/// 2. [`start_background`](Self::start_background): spawn long-running tasks
/// 3. service calls are forwarded via [`handle_service_call`](Self::handle_service_call)
/// 4. [`teardown`](Self::teardown): release resources
pub trait Integration {
    /// Unique name identifying this integration (e.g. `"enocean"`).
    fn name(&self) -> &'static str;

    /// Fast, non-blocking initialisation.
    ///
    /// Must not wait for radio traffic; listening belongs in
    /// [`start_background`](Self::start_background).
    fn setup(
        &mut self,
        ctx: &impl IntegrationContext,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Start long-running background work and return immediately.
    ///
    /// The default implementation is a no-op.
    fn start_background(
        &mut self,
        _ctx: impl IntegrationContext + Clone + 'static,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        async { Ok(()) }
    }

    /// Handle a service call (`turn_on`, `turn_off`, `toggle`) for an
    /// entity owned by this integration.
    ///
    /// Returns the [`Entity`] as it stands after the call.
    fn handle_service_call(
        &self,
        entity_id: EntityId,
        service: &str,
        data: serde_json::Value,
    ) -> impl Future<Output = Result<Entity, HubError>> + Send;

    /// Called on graceful shutdown.
    fn teardown(&mut self) -> impl Future<Output = Result<(), HubError>> + Send;
}
