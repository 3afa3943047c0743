//! In-memory fakes shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use enohub_app::ports::IntegrationContext;
use enohub_domain::device::Device;
use enohub_domain::entity::Entity;
use enohub_domain::error::HubError;
use enohub_domain::event::Event;
use enohub_domain::id::DeviceId;

use crate::id::EnOceanId;
use crate::packet::{OutboundPacket, Packet};
use crate::transport::{Transport, TransportError};

/// Registry fake keyed the same way as the real one.
#[derive(Clone, Default)]
pub(crate) struct MemoryContext {
    devices: Arc<Mutex<Vec<Device>>>,
    entities: Arc<Mutex<Vec<Entity>>>,
    events: Arc<Mutex<Vec<Event>>>,
    pub(crate) fail_lookups: Arc<AtomicBool>,
}

impl MemoryContext {
    pub(crate) fn devices(&self) -> Vec<Device> {
        self.devices.lock().unwrap().clone()
    }

    pub(crate) fn entities(&self) -> Vec<Entity> {
        self.entities.lock().unwrap().clone()
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn entity(&self, key: &str) -> Option<Entity> {
        self.entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.entity_id == key)
            .cloned()
    }
}

impl IntegrationContext for MemoryContext {
    async fn upsert_device(&self, mut device: Device) -> Result<Device, HubError> {
        let mut devices = self.devices.lock().unwrap();
        if let Some(existing) = devices
            .iter_mut()
            .find(|d| d.integration == device.integration && d.unique_id == device.unique_id)
        {
            device.id = existing.id;
            *existing = device.clone();
        } else {
            devices.push(device.clone());
        }
        Ok(device)
    }

    async fn upsert_entity(&self, mut entity: Entity) -> Result<Entity, HubError> {
        let mut entities = self.entities.lock().unwrap();
        if let Some(existing) = entities.iter_mut().find(|e| e.entity_id == entity.entity_id) {
            entity.id = existing.id;
            *existing = entity.clone();
        } else {
            entities.push(entity.clone());
        }
        Ok(entity)
    }

    async fn publish(&self, event: Event) -> Result<(), HubError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn find_device(
        &self,
        integration: &str,
        unique_id: &str,
    ) -> Result<Option<Device>, HubError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(HubError::Storage("registry offline".into()));
        }
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.integration == integration && d.unique_id == unique_id)
            .cloned())
    }

    async fn list_devices(&self, integration: &str) -> Result<Vec<Device>, HubError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.integration == integration)
            .cloned()
            .collect())
    }

    async fn list_entities(&self, device_id: DeviceId) -> Result<Vec<Entity>, HubError> {
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.device_id == device_id)
            .cloned()
            .collect())
    }
}

/// Transport fake that records everything the adapter does to it.
pub(crate) struct FakeTransport {
    inbound: Mutex<Option<mpsc::UnboundedSender<Packet>>>,
    pub(crate) sent: Mutex<Vec<OutboundPacket>>,
    pub(crate) reinjected: Mutex<Vec<Packet>>,
    base_id: watch::Sender<Option<EnOceanId>>,
    pub(crate) teach_in: AtomicBool,
    pub(crate) base_id_requests: AtomicUsize,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            inbound: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            reinjected: Mutex::new(Vec::new()),
            base_id: watch::channel(None).0,
            teach_in: AtomicBool::new(false),
            base_id_requests: AtomicUsize::new(0),
        }
    }
}

impl FakeTransport {
    /// Simulate a frame read from the serial line.
    pub(crate) fn receive(&self, packet: Packet) {
        if let Some(inbound) = self.inbound.lock().unwrap().as_ref() {
            let _ = inbound.send(packet);
        }
    }

    pub(crate) fn resolve_base_id(&self, id: EnOceanId) {
        self.base_id.send_replace(Some(id));
    }

    pub(crate) fn sent(&self) -> Vec<OutboundPacket> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn open(path: &str) -> Result<Self, TransportError> {
        if path.contains("missing") {
            return Err(TransportError::Open {
                path: path.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(Self::default())
    }

    fn start(&self, inbound: mpsc::UnboundedSender<Packet>) -> Result<(), TransportError> {
        *self.inbound.lock().unwrap() = Some(inbound);
        Ok(())
    }

    fn send(&self, packet: OutboundPacket) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(packet);
        Ok(())
    }

    fn reinject(&self, packet: Packet) {
        self.reinjected.lock().unwrap().push(packet);
    }

    fn request_base_id(&self) {
        self.base_id_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn base_id(&self) -> watch::Receiver<Option<EnOceanId>> {
        self.base_id.subscribe()
    }

    fn set_teach_in(&self, enabled: bool) {
        self.teach_in.store(enabled, Ordering::SeqCst);
    }
}
