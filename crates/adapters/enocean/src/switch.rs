//! EnOcean switch entity.
//!
//! One [`EnOceanSwitch`] exists per actuator channel. It learns its state
//! from two telegram families:
//!
//! - A5-12-01 power metering: a current reading above 1 W means "on"
//! - D2-01 actuator status (CMD 4) for its own channel
//!
//! and drives the actuator with D2-01 "set output" commands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use enohub_app::ports::IntegrationContext;
use enohub_domain::device::Device;
use enohub_domain::entity::{AttributeValue, Entity, EntityState};
use enohub_domain::error::HubError;
use enohub_domain::id::{DeviceId, EntityId};

use crate::dispatcher::CommandSender;
use crate::eep::Eep;
use crate::error::EnOceanError;
use crate::id::EnOceanId;
use crate::packet::{RORG_BS4, RORG_VLD, RadioPacket, Telegram};
use crate::profiles::{self, ActuatorStatus, MeterReading};

/// Entity attribute holding the actuator channel.
pub const ATTR_CHANNEL: &str = "channel";
/// Entity attribute holding the device profile, e.g. `D2:01:12`.
pub const ATTR_EEP: &str = "eep";
pub const DEFAULT_CHANNEL: u8 = 1;

/// Metered power above which a switch is considered on.
const ON_THRESHOLD_WATTS: f64 = 1.0;

/// The D2-01 FUNC of electronic switches and dimmers.
const FUNC_SWITCH: u8 = 0x01;

/// Switch entities to create for a device announcing `eep`.
///
/// D2-01-* get channel 1; the dual-channel D2-01-10 and D2-01-11 also get
/// channel 2. Anything else gets none.
#[must_use]
pub fn channels_for_profile(eep: Eep) -> Vec<u8> {
    if eep.rorg() != RORG_VLD || eep.func() != FUNC_SWITCH {
        return Vec::new();
    }
    match eep.kind() {
        0x10 | 0x11 => vec![1, 2],
        _ => vec![DEFAULT_CHANNEL],
    }
}

/// Check that `channel` fits the 5-bit I/O channel field.
///
/// # Errors
///
/// Returns [`EnOceanError::InvalidChannel`] above `0x1F`.
pub fn check_channel(channel: u8) -> Result<u8, EnOceanError> {
    if channel > profiles::MAX_CHANNEL {
        return Err(EnOceanError::InvalidChannel(i64::from(channel)));
    }
    Ok(channel)
}

/// One output channel of an EnOcean actuator.
#[derive(Debug)]
pub struct EnOceanSwitch {
    entity_id: EntityId,
    device_id: DeviceId,
    dev_id: EnOceanId,
    eep: Option<Eep>,
    name: String,
    channel: u8,
    on: bool,
    commands: CommandSender,
}

impl EnOceanSwitch {
    /// Create a switch that starts off.
    ///
    /// Without a `name`, it is called `EnOcean switch <id> - <channel>`.
    #[must_use]
    pub fn new(
        device_id: DeviceId,
        dev_id: EnOceanId,
        eep: Option<Eep>,
        name: Option<String>,
        channel: u8,
        commands: CommandSender,
    ) -> Self {
        Self {
            entity_id: EntityId::new(),
            device_id,
            dev_id,
            eep,
            name: name.unwrap_or_else(|| format!("EnOcean switch {dev_id} - {channel}")),
            channel,
            on: false,
            commands,
        }
    }

    /// Rebuild a switch from its registry records.
    ///
    /// # Errors
    ///
    /// Returns [`EnOceanError::InvalidIdentifier`] when `device.unique_id` is
    /// not an EnOcean id, [`EnOceanError::InvalidEquipmentProfile`] for a bad
    /// `eep` attribute and [`EnOceanError::InvalidChannel`] for a bad channel.
    pub fn restore(
        device: &Device,
        entity: &Entity,
        commands: CommandSender,
    ) -> Result<Self, EnOceanError> {
        let dev_id: EnOceanId = device.unique_id.parse()?;
        let eep = entity
            .get_attribute(ATTR_EEP)
            .and_then(AttributeValue::as_str)
            .map(str::parse::<Eep>)
            .transpose()?;
        let channel = match entity.get_attribute(ATTR_CHANNEL).and_then(AttributeValue::as_int) {
            None => DEFAULT_CHANNEL,
            Some(raw) => {
                let channel = u8::try_from(raw).map_err(|_| EnOceanError::InvalidChannel(raw))?;
                check_channel(channel)?
            }
        };

        Ok(Self {
            entity_id: entity.id,
            device_id: device.id,
            dev_id,
            eep,
            name: entity.friendly_name.clone(),
            channel,
            on: entity.state == EntityState::On,
            commands,
        })
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    #[must_use]
    pub fn dev_id(&self) -> EnOceanId {
        self.dev_id
    }

    #[must_use]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Stable entity key, e.g. `switch.enocean_01a319b2_1`.
    #[must_use]
    pub fn entity_key(&self) -> String {
        format!("switch.enocean_{}_{}", self.dev_id.slug(), self.channel)
    }

    /// Apply a telegram from this switch's device.
    ///
    /// Returns `true` when the telegram carried a state for this switch.
    pub fn value_changed(&mut self, radio: &RadioPacket) -> bool {
        match radio.data.first().copied() {
            Some(RORG_BS4) => {
                let reading = MeterReading::parse(radio.payload());
                let Some(watts) = reading.and_then(|r| r.watts()) else {
                    return false;
                };
                if watts > ON_THRESHOLD_WATTS {
                    self.on = true;
                    return true;
                }
                false
            }
            Some(RORG_VLD) => match ActuatorStatus::parse(radio.payload()) {
                Some(status) if status.channel == self.channel => {
                    self.on = status.output > 0;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    pub fn turn_on(&mut self) {
        self.set_output(profiles::OUTPUT_ON);
        self.on = true;
    }

    pub fn turn_off(&mut self) {
        self.set_output(profiles::OUTPUT_OFF);
        self.on = false;
    }

    pub fn toggle(&mut self) {
        if self.on {
            self.turn_off();
        } else {
            self.turn_on();
        }
    }

    /// Run a hub service against this switch. Unknown services are ignored.
    pub fn handle_service(&mut self, service: &str) {
        match service {
            "turn_on" => self.turn_on(),
            "turn_off" => self.turn_off(),
            "toggle" => self.toggle(),
            other => tracing::debug!(service = other, entity = %self.entity_key(), "unsupported service"),
        }
    }

    fn set_output(&self, level: u8) {
        tracing::debug!(dest = %self.dev_id, channel = self.channel, level, "sending set output");
        self.commands
            .send(profiles::set_output(self.dev_id, self.channel, level));
    }

    /// Snapshot of this switch as a hub entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn to_entity(&self) -> Result<Entity, HubError> {
        let mut builder = Entity::builder()
            .id(self.entity_id)
            .device_id(self.device_id)
            .entity_id(self.entity_key())
            .friendly_name(&self.name)
            .state(EntityState::from_on(self.on))
            .attribute(ATTR_CHANNEL, AttributeValue::Int(i64::from(self.channel)));
        if let Some(eep) = self.eep {
            builder = builder.attribute(ATTR_EEP, AttributeValue::String(eep.to_string()));
        }
        builder.build()
    }
}

/// The live switches of one integration, shared with its background tasks.
#[derive(Debug, Clone, Default)]
pub struct SwitchTable(Arc<Mutex<HashMap<EntityId, EnOceanSwitch>>>);

impl SwitchTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<EntityId, EnOceanSwitch>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, switch: EnOceanSwitch) {
        self.lock().insert(switch.entity_id, switch);
    }

    /// Whether a switch for `dev_id` on `channel` is already live.
    #[must_use]
    pub fn contains(&self, dev_id: EnOceanId, channel: u8) -> bool {
        self.lock()
            .values()
            .any(|s| s.dev_id == dev_id && s.channel == channel)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Feed a telegram to every switch of its sender and return the
    /// snapshots of those it updated.
    #[must_use]
    pub fn apply_telegram(&self, telegram: &Telegram) -> Vec<Entity> {
        let sender = telegram.sender();
        let radio = telegram.radio();
        let mut updated = Vec::new();
        for switch in self.lock().values_mut().filter(|s| s.dev_id == sender) {
            if !switch.value_changed(radio) {
                continue;
            }
            match switch.to_entity() {
                Ok(entity) => updated.push(entity),
                Err(err) => tracing::warn!(%err, entity = %switch.entity_key(), "invalid switch snapshot"),
            }
        }
        updated
    }

    /// Run `f` on the switch owning `entity_id`, if any.
    pub fn with_switch_mut<R>(
        &self,
        entity_id: EntityId,
        f: impl FnOnce(&mut EnOceanSwitch) -> R,
    ) -> Option<R> {
        self.lock().get_mut(&entity_id).map(f)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Persist `switch` through `ctx` and make it live.
///
/// The switch adopts the id of an already registered entity with the same key.
///
/// # Errors
///
/// Returns the registry error when the entity cannot be upserted.
pub async fn register<C: IntegrationContext>(
    mut switch: EnOceanSwitch,
    ctx: &C,
    switches: &SwitchTable,
) -> Result<Entity, HubError> {
    let saved = ctx.upsert_entity(switch.to_entity()?).await?;
    switch.entity_id = saved.id;
    tracing::info!(entity = %saved.entity_id, "EnOcean switch registered");
    switches.insert(switch);
    Ok(saved)
}

/// Apply every dispatched telegram to the live switches and push the
/// resulting snapshots to the registry. Runs until the dispatcher is dropped.
pub async fn listen<C: IntegrationContext>(
    mut telegrams: broadcast::Receiver<Telegram>,
    switches: SwitchTable,
    ctx: C,
) {
    loop {
        match telegrams.recv().await {
            Ok(telegram) => {
                for entity in switches.apply_telegram(&telegram) {
                    if let Err(err) = ctx.upsert_entity(entity).await {
                        tracing::warn!(%err, "failed to persist switch state");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "switch listener lagged behind, telegrams dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::debug!("switch listener stopped");
}
