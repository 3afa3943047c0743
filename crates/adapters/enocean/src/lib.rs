//! # enohub-adapter-enocean
//!
//! EnOcean integration: binds an ESP3 dongle to enohub devices and entities.
//!
//! ## How it works
//!
//! ```text
//! Transport ──packets──▶ Dongle ──telegrams──▶ Dispatcher ──▶ switch listener
//!     ▲                    │ unknown sender                        │
//!     │                    ▼                                       ▼
//!     │                discovery ──devices/entities──▶ IntegrationContext
//!     └──commands── Dongle forwarder ◀── CommandSender ◀── EnOceanSwitch
//! ```
//!
//! The serial protocol itself sits behind the [`Transport`] trait.
//!
//! ## Supported profiles
//!
//! | EEP | Entities |
//! |-----|----------|
//! | D2-01-xx | one switch on channel 1 |
//! | D2-01-10, D2-01-11 | switches on channels 1 and 2 |
//! | A5-12-01 | updates switches of the same device (metering) |
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `enohub-app` and `enohub-domain`.

mod config;
mod discovery;
mod dispatcher;
mod dongle;
mod eep;
mod error;
mod id;
pub mod packet;
pub mod profiles;
mod switch;
mod transport;

#[cfg(test)]
mod testing;

pub use config::{EnOceanConfig, SwitchConfig};
pub use discovery::DiscoveryInfo;
pub use dispatcher::{CommandReceiver, CommandSender, Dispatcher};
pub use dongle::{Dongle, DongleState, IdentificationRetry, detect, validate_path};
pub use eep::Eep;
pub use error::EnOceanError;
pub use id::EnOceanId;
pub use switch::{EnOceanSwitch, SwitchTable};
pub use transport::{Transport, TransportError};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use enohub_app::ports::integration::{Integration, IntegrationContext};
use enohub_domain::entity::Entity;
use enohub_domain::error::{HubError, NotFoundError};
use enohub_domain::id::EntityId;

use crate::packet::Packet;

/// Name under which EnOcean devices are registered.
pub const INTEGRATION_NAME: &str = "enocean";

/// State that only exists between `setup` and `teardown`.
struct Running<T> {
    dongle: Arc<Dongle<T>>,
    dispatcher: Dispatcher,
    packets: Option<mpsc::UnboundedReceiver<Packet>>,
}

/// EnOcean integration driving one dongle.
pub struct EnOceanIntegration<T> {
    config: EnOceanConfig,
    serial_path: String,
    transport: Arc<T>,
    switches: SwitchTable,
    running: Option<Running<T>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: Transport> EnOceanIntegration<T> {
    /// Open the configured dongle, or the first detected one.
    ///
    /// # Errors
    ///
    /// Returns [`EnOceanError::MissingDevice`] when nothing is configured or
    /// detected, and [`EnOceanError::Transport`] when it cannot be opened.
    pub fn open(config: EnOceanConfig) -> Result<Self, EnOceanError> {
        let path = if config.device.is_empty() {
            let path = detect()
                .into_iter()
                .next()
                .ok_or(EnOceanError::MissingDevice)?;
            tracing::info!(%path, "EnOcean dongle detected");
            path
        } else {
            config.device.clone()
        };
        let transport = T::open(&path)?;
        Ok(Self::new(config, path, Arc::new(transport)))
    }

    /// Create the integration around an already opened transport.
    #[must_use]
    pub fn new(config: EnOceanConfig, serial_path: impl Into<String>, transport: Arc<T>) -> Self {
        Self {
            config,
            serial_path: serial_path.into(),
            transport,
            switches: SwitchTable::default(),
            running: None,
            tasks: Vec::new(),
        }
    }

    /// The live switches.
    #[must_use]
    pub fn switches(&self) -> &SwitchTable {
        &self.switches
    }

    #[must_use]
    pub fn dongle(&self) -> Option<&Dongle<T>> {
        self.running.as_ref().map(|running| running.dongle.as_ref())
    }

    fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(running) = self.running.take() {
            running.dongle.unload();
        }
        self.switches.clear();
    }

    async fn restore_switches(
        &self,
        ctx: &impl IntegrationContext,
        commands: &CommandSender,
    ) -> Result<(), HubError> {
        for device in ctx.list_devices(INTEGRATION_NAME).await? {
            for entity in ctx.list_entities(device.id).await? {
                if !entity.entity_id.starts_with("switch.") {
                    continue;
                }
                let switch = EnOceanSwitch::restore(&device, &entity, commands.clone())?;
                tracing::debug!(entity = %entity.entity_id, "EnOcean switch restored");
                self.switches.insert(switch);
            }
        }
        Ok(())
    }

    async fn register_configured(
        &self,
        ctx: &impl IntegrationContext,
        commands: &CommandSender,
    ) -> Result<(), HubError> {
        for declared in &self.config.switches {
            if self.switches.contains(declared.id, declared.channel) {
                continue;
            }
            let device = ctx
                .upsert_device(discovery::build_device(declared.id, declared.eep)?)
                .await?;
            let switch = EnOceanSwitch::new(
                device.id,
                declared.id,
                declared.eep,
                declared.name.clone(),
                declared.channel,
                commands.clone(),
            );
            switch::register(switch, ctx, &self.switches).await?;
        }
        Ok(())
    }
}

impl<T: Transport> Integration for EnOceanIntegration<T> {
    fn name(&self) -> &'static str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, ctx: &impl IntegrationContext) -> Result<(), HubError> {
        self.stop();
        self.config.validate()?;

        let (dispatcher, commands) = Dispatcher::new(self.config.dispatch_capacity)?;
        let dongle = Arc::new(Dongle::new(
            Arc::clone(&self.transport),
            &self.serial_path,
            IdentificationRetry::from(&self.config),
        ));
        let packets = dongle.setup(commands)?;
        self.running = Some(Running {
            dongle,
            dispatcher: dispatcher.clone(),
            packets: Some(packets),
        });

        let command_sender = dispatcher.command_sender();
        let loaded = async {
            self.restore_switches(ctx, &command_sender).await?;
            self.register_configured(ctx, &command_sender).await
        }
        .await;
        if let Err(err) = loaded {
            tracing::warn!(%err, "EnOcean setup failed, stopping dongle");
            self.stop();
            return Err(err);
        }

        tracing::info!(
            path = %self.serial_path,
            switches = self.switches.len(),
            "EnOcean integration set up"
        );
        Ok(())
    }

    async fn start_background(
        &mut self,
        ctx: impl IntegrationContext + Clone + 'static,
    ) -> Result<(), HubError> {
        let running = self.running.as_mut().ok_or(EnOceanError::NotStarted)?;
        let packets = running.packets.take().ok_or(EnOceanError::NotStarted)?;

        let listener = tokio::spawn(switch::listen(
            running.dispatcher.subscribe(),
            self.switches.clone(),
            ctx.clone(),
        ));
        let inbound = tokio::spawn(dongle::run(
            Arc::clone(&running.dongle),
            packets,
            ctx,
            running.dispatcher.clone(),
            self.switches.clone(),
        ));
        self.tasks.extend([listener, inbound]);

        tracing::info!(dongle = %running.dongle.identifier(), "EnOcean listening");
        Ok(())
    }

    async fn handle_service_call(
        &self,
        entity_id: EntityId,
        service: &str,
        _data: serde_json::Value,
    ) -> Result<Entity, HubError> {
        let Some(snapshot) = self.switches.with_switch_mut(entity_id, |switch| {
            switch.handle_service(service);
            switch.to_entity()
        }) else {
            return Err(NotFoundError {
                entity: "Entity",
                id: entity_id.to_string(),
            }
            .into());
        };
        snapshot
    }

    async fn teardown(&mut self) -> Result<(), HubError> {
        self.stop();
        tracing::info!("EnOcean integration stopped");
        Ok(())
    }
}
