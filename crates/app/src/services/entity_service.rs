//! Entity service: keeps the entity registry and announces what changes in it.

use enohub_domain::entity::{Entity, EntityState};
use enohub_domain::error::HubError;
use enohub_domain::event::{Event, EventType};
use enohub_domain::id::DeviceId;
use enohub_domain::time::now;

use crate::ports::{EntityRepository, EventPublisher};

/// Entity registry use-cases.
///
/// New entities are announced with `EntityCreated`, state transitions with
/// `StateChanged`.
pub struct EntityService<R, P> {
    repo: R,
    publisher: P,
}

impl<R: EntityRepository, P: EventPublisher> EntityService<R, P> {
    pub fn new(repo: R, publisher: P) -> Self {
        Self { repo, publisher }
    }

    /// Store a new entity, stamping both timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for an invalid entity, or whatever
    /// the repository or publisher fails with.
    pub async fn create_entity(&self, mut entity: Entity) -> Result<Entity, HubError> {
        entity.validate()?;
        let ts = now();
        entity.last_updated = ts;
        entity.last_changed = ts;
        let created = self.repo.create(entity).await?;
        self.publisher
            .publish(Event::new(
                EventType::EntityCreated,
                Some(created.id),
                serde_json::json!({ "entity_id": created.entity_id }),
            ))
            .await?;
        Ok(created)
    }

    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn list_entities(&self) -> Result<Vec<Entity>, HubError> {
        self.repo.get_all().await
    }

    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn list_by_device(&self, device_id: DeviceId) -> Result<Vec<Entity>, HubError> {
        self.repo.find_by_device_id(device_id).await
    }

    /// Create or refresh the entity registered under `entity.entity_id`.
    ///
    /// A refreshed entity keeps its stored id. `last_changed` only moves when
    /// the state does, and that move is published as `StateChanged`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for an invalid entity, or whatever
    /// the repository or publisher fails with.
    #[tracing::instrument(skip(self, entity), fields(entity_id = %entity.entity_id))]
    pub async fn upsert_entity(&self, entity: Entity) -> Result<Entity, HubError> {
        let Some(mut existing) = self.repo.find_by_entity_id(&entity.entity_id).await? else {
            return self.create_entity(entity).await;
        };

        entity.validate()?;
        let from = existing.state;
        existing.device_id = entity.device_id;
        existing.friendly_name = entity.friendly_name;
        existing.attributes = entity.attributes;
        existing.update_state(entity.state, now());

        let saved = self.repo.update(existing).await?;
        if saved.state != from {
            self.announce_change(&saved, from).await?;
        }
        Ok(saved)
    }

    async fn announce_change(&self, entity: &Entity, from: EntityState) -> Result<(), HubError> {
        tracing::debug!(entity_id = %entity.entity_id, %from, to = %entity.state, "state changed");
        self.publisher
            .publish(Event::new(
                EventType::StateChanged,
                Some(entity.id),
                serde_json::json!({ "from": from, "to": entity.state }),
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use enohub_domain::entity::AttributeValue;
    use enohub_domain::error::ValidationError;
    use std::sync::Mutex;

    /// Entities kept in insertion order.
    #[derive(Default)]
    struct VecEntityRepo(Mutex<Vec<Entity>>);

    impl EntityRepository for VecEntityRepo {
        async fn create(&self, entity: Entity) -> Result<Entity, HubError> {
            self.0.lock().unwrap().push(entity.clone());
            Ok(entity)
        }

        async fn get_all(&self) -> Result<Vec<Entity>, HubError> {
            Ok(self.0.lock().unwrap().clone())
        }

        async fn find_by_device_id(&self, device_id: DeviceId) -> Result<Vec<Entity>, HubError> {
            let entities = self.0.lock().unwrap();
            Ok(entities
                .iter()
                .filter(|e| e.device_id == device_id)
                .cloned()
                .collect())
        }

        async fn find_by_entity_id(&self, entity_id: &str) -> Result<Option<Entity>, HubError> {
            let entities = self.0.lock().unwrap();
            Ok(entities.iter().find(|e| e.entity_id == entity_id).cloned())
        }

        async fn update(&self, entity: Entity) -> Result<Entity, HubError> {
            let mut entities = self.0.lock().unwrap();
            if let Some(slot) = entities.iter_mut().find(|e| e.id == entity.id) {
                *slot = entity.clone();
            }
            Ok(entity)
        }
    }

    fn service() -> (EntityService<VecEntityRepo, InProcessEventBus>, InProcessEventBus) {
        let bus = InProcessEventBus::new(16);
        (EntityService::new(VecEntityRepo::default(), bus.clone()), bus)
    }

    fn channel_switch(device_id: DeviceId, channel: i64, state: EntityState) -> Entity {
        Entity::builder()
            .device_id(device_id)
            .entity_id(format!("switch.enocean_04050607_{channel}"))
            .friendly_name(format!("EnOcean switch 04:05:06:07 - {channel}"))
            .state(state)
            .attribute("channel", AttributeValue::Int(channel))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_announce_new_entity() {
        let (svc, bus) = service();
        let mut rx = bus.subscribe();

        let created = svc
            .upsert_entity(channel_switch(DeviceId::new(), 1, EntityState::Off))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::EntityCreated);
        assert_eq!(event.entity_id, Some(created.id));
        assert_eq!(event.data["entity_id"], "switch.enocean_04050607_1");
        assert_eq!(created.last_changed, created.last_updated);
    }

    #[tokio::test]
    async fn should_refuse_entity_without_key() {
        let (svc, bus) = service();
        let mut rx = bus.subscribe();
        let mut entity = channel_switch(DeviceId::new(), 1, EntityState::Off);
        entity.entity_id = String::new();

        let result = svc.upsert_entity(entity).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyEntityId))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_list_entities_of_one_device() {
        let (svc, _bus) = service();
        let actuator = DeviceId::new();
        svc.create_entity(channel_switch(actuator, 1, EntityState::Off))
            .await
            .unwrap();
        svc.create_entity(channel_switch(actuator, 2, EntityState::Off))
            .await
            .unwrap();
        let mut foreign = channel_switch(DeviceId::new(), 1, EntityState::Off);
        foreign.entity_id = "switch.enocean_01a319b2_1".to_string();
        svc.create_entity(foreign).await.unwrap();

        assert_eq!(svc.list_entities().await.unwrap().len(), 3);
        let keys: Vec<String> = svc
            .list_by_device(actuator)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.entity_id)
            .collect();
        assert_eq!(
            keys,
            vec!["switch.enocean_04050607_1", "switch.enocean_04050607_2"]
        );
    }

    #[tokio::test]
    async fn should_keep_stored_id_and_announce_transition() {
        let (svc, bus) = service();
        let actuator = DeviceId::new();
        let first = svc
            .upsert_entity(channel_switch(actuator, 1, EntityState::Off))
            .await
            .unwrap();
        let mut rx = bus.subscribe();

        let second = svc
            .upsert_entity(channel_switch(actuator, 1, EntityState::On))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.state, EntityState::On);
        assert!(second.last_changed >= first.last_changed);
        assert_eq!(svc.list_entities().await.unwrap().len(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::StateChanged);
        assert_eq!(event.entity_id, Some(first.id));
        assert_eq!(event.data["from"], "off");
        assert_eq!(event.data["to"], "on");
    }

    #[tokio::test]
    async fn should_refresh_attributes_silently_when_state_is_unchanged() {
        let (svc, bus) = service();
        let actuator = DeviceId::new();
        let first = svc
            .upsert_entity(channel_switch(actuator, 1, EntityState::Off))
            .await
            .unwrap();
        let mut rx = bus.subscribe();

        let mut renamed = channel_switch(actuator, 1, EntityState::Off);
        renamed.friendly_name = "Kitchen".to_string();
        let saved = svc.upsert_entity(renamed).await.unwrap();

        assert_eq!(saved.friendly_name, "Kitchen");
        assert_eq!(saved.last_changed, first.last_changed);
        assert!(rx.try_recv().is_err());
    }
}
