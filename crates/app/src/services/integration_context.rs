//! Concrete [`IntegrationContext`] backed by application services.

use std::sync::Arc;

use enohub_domain::device::Device;
use enohub_domain::entity::Entity;
use enohub_domain::error::HubError;
use enohub_domain::event::Event;
use enohub_domain::id::DeviceId;

use crate::ports::{DeviceRepository, EntityRepository, EventPublisher, IntegrationContext};
use crate::services::device_service::DeviceService;
use crate::services::entity_service::EntityService;

/// [`IntegrationContext`] implementation that delegates to `DeviceService`,
/// `EntityService`, and an `EventPublisher`.
///
/// Cheap to clone; integrations see only the [`IntegrationContext`] trait.
pub struct ServiceContext<DR, ER, EP> {
    device_service: Arc<DeviceService<DR>>,
    entity_service: Arc<EntityService<ER, EP>>,
    event_publisher: EP,
}

impl<DR, ER, EP> ServiceContext<DR, ER, EP> {
    /// Create a new context backed by the given services and event publisher.
    pub fn new(
        device_service: Arc<DeviceService<DR>>,
        entity_service: Arc<EntityService<ER, EP>>,
        event_publisher: EP,
    ) -> Self {
        Self {
            device_service,
            entity_service,
            event_publisher,
        }
    }
}

impl<DR, ER, EP: Clone> Clone for ServiceContext<DR, ER, EP> {
    fn clone(&self) -> Self {
        Self {
            device_service: Arc::clone(&self.device_service),
            entity_service: Arc::clone(&self.entity_service),
            event_publisher: self.event_publisher.clone(),
        }
    }
}

impl<DR, ER, EP> IntegrationContext for ServiceContext<DR, ER, EP>
where
    DR: DeviceRepository + Send + Sync + 'static,
    ER: EntityRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
{
    async fn upsert_device(&self, device: Device) -> Result<Device, HubError> {
        self.device_service.upsert_device(device).await
    }

    async fn upsert_entity(&self, entity: Entity) -> Result<Entity, HubError> {
        self.entity_service.upsert_entity(entity).await
    }

    async fn publish(&self, event: Event) -> Result<(), HubError> {
        self.event_publisher.publish(event).await
    }

    async fn find_device(
        &self,
        integration: &str,
        unique_id: &str,
    ) -> Result<Option<Device>, HubError> {
        self.device_service
            .find_by_integration_unique_id(integration, unique_id)
            .await
    }

    async fn list_devices(&self, integration: &str) -> Result<Vec<Device>, HubError> {
        self.device_service.list_by_integration(integration).await
    }

    async fn list_entities(&self, device_id: DeviceId) -> Result<Vec<Entity>, HubError> {
        self.entity_service.list_by_device(device_id).await
    }
}
