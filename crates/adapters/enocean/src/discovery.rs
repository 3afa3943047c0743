//! Discovery of devices the registry does not know yet.

use enohub_app::ports::IntegrationContext;
use enohub_domain::device::Device;
use enohub_domain::error::HubError;
use enohub_domain::event::{Event, EventType};

use crate::INTEGRATION_NAME;
use crate::dispatcher::CommandSender;
use crate::eep::Eep;
use crate::id::EnOceanId;
use crate::packet::Telegram;
use crate::switch::{self, EnOceanSwitch, SwitchTable};

const MANUFACTURER: &str = "EnOcean";

/// Read-only view of a telegram from a device heard for the first time.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryInfo<'a> {
    telegram: &'a Telegram,
}

impl<'a> DiscoveryInfo<'a> {
    #[must_use]
    pub fn new(telegram: &'a Telegram) -> Self {
        Self { telegram }
    }

    #[must_use]
    pub fn sender(&self) -> EnOceanId {
        self.telegram.sender()
    }

    /// Human-readable device name, e.g. `EnOcean device 01:A3:19:B2`.
    #[must_use]
    pub fn name(&self) -> String {
        device_name(self.sender())
    }

    /// Registry key of the device: its colon-hex identifier.
    #[must_use]
    pub fn device_id(&self) -> String {
        self.sender().to_string()
    }

    /// The profile announced by the telegram, if it carries one.
    ///
    /// UTE teach-ins announce the RORG of the profile separately from their
    /// own.
    #[must_use]
    pub fn eep(&self) -> Option<Eep> {
        let radio = self.telegram.radio();
        let (Some(func), Some(kind)) = (radio.rorg_func, radio.rorg_type) else {
            return None;
        };
        let rorg = match self.telegram {
            Telegram::TeachIn(teach_in) => teach_in.rorg_of_eep,
            Telegram::Radio(radio) => radio.rorg,
        };
        Some(Eep::new(rorg, func, kind))
    }
}

pub(crate) fn device_name(id: EnOceanId) -> String {
    format!("EnOcean device {id}")
}

/// Registry record of an EnOcean device.
///
/// # Errors
///
/// Returns a validation error if the builder fails.
pub fn build_device(id: EnOceanId, eep: Option<Eep>) -> Result<Device, HubError> {
    let mut builder = Device::builder()
        .name(device_name(id))
        .manufacturer(MANUFACTURER)
        .integration(INTEGRATION_NAME)
        .unique_id(id.to_string());
    if let Some(eep) = eep {
        builder = builder.model(eep.to_string());
    }
    builder.build()
}

/// Best-effort creation of the device behind `info` and its entities.
///
/// Telegrams without a profile, or with a profile no entity supports, are
/// dropped. Failures are logged, never returned.
pub async fn create_device<C: IntegrationContext>(
    info: DiscoveryInfo<'_>,
    ctx: &C,
    commands: &CommandSender,
    switches: &SwitchTable,
) {
    let Some(eep) = info.eep() else {
        tracing::debug!(sender = %info.sender(), "unknown device sent no profile, ignoring");
        return;
    };

    let event = Event::new(
        EventType::DeviceDetected,
        None,
        serde_json::json!({
            "integration": INTEGRATION_NAME,
            "unique_id": info.device_id(),
            "name": info.name(),
            "eep": eep.to_string(),
        }),
    );
    if let Err(err) = ctx.publish(event).await {
        tracing::warn!(%err, sender = %info.sender(), "failed to publish device_detected event");
    }

    let channels = switch::channels_for_profile(eep);
    if channels.is_empty() {
        tracing::debug!(sender = %info.sender(), %eep, "no entity supports this profile");
        return;
    }

    if let Err(err) = register(info, eep, &channels, ctx, commands, switches).await {
        tracing::warn!(%err, sender = %info.sender(), "failed to create discovered device");
    }
}

async fn register<C: IntegrationContext>(
    info: DiscoveryInfo<'_>,
    eep: Eep,
    channels: &[u8],
    ctx: &C,
    commands: &CommandSender,
    switches: &SwitchTable,
) -> Result<(), HubError> {
    let device = ctx
        .upsert_device(build_device(info.sender(), Some(eep))?)
        .await?;
    tracing::info!(device = %device.unique_id, %eep, "EnOcean device discovered");

    for &channel in channels {
        let switch = EnOceanSwitch::new(
            device.id,
            info.sender(),
            Some(eep),
            None,
            channel,
            commands.clone(),
        );
        switch::register(switch, ctx, switches).await?;
    }
    Ok(())
}
