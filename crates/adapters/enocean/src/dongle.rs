//! The USB dongle: packet classification, identification and routing.
//!
//! Every inbound frame goes through [`Dongle::handle_packet`]:
//!
//! | Frame | Action |
//! |-------|--------|
//! | response | handed back to the transport; while unidentified, schedule a base-id check |
//! | radio telegram | returned to the caller for [`route_telegram`] |
//! | anything else | dropped |
//!
//! The dongle starts in [`DongleState::AwaitingIdentification`] and moves to
//! [`DongleState::Identified`] once the transport has resolved its base id.
//! Teach-in is only enabled after that point.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use enohub_app::ports::IntegrationContext;

use crate::INTEGRATION_NAME;
use crate::config::EnOceanConfig;
use crate::discovery::{self, DiscoveryInfo};
use crate::dispatcher::{CommandReceiver, Dispatcher};
use crate::error::EnOceanError;
use crate::id::EnOceanId;
use crate::packet::{Packet, Telegram};
use crate::switch::SwitchTable;
use crate::transport::Transport;

/// Identification progress of a dongle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DongleState {
    AwaitingIdentification,
    Identified,
}

/// How long to wait for the base id after each response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentificationRetry {
    pub interval: Duration,
    pub attempts: u32,
}

impl From<&EnOceanConfig> for IdentificationRetry {
    fn from(config: &EnOceanConfig) -> Self {
        Self {
            interval: config.identification_retry(),
            attempts: config.identification_attempts,
        }
    }
}

/// One EnOcean USB dongle and the transport bound to it.
pub struct Dongle<T> {
    transport: Arc<T>,
    serial_path: String,
    identifier: String,
    state: Arc<Mutex<DongleState>>,
    retry: IdentificationRetry,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    identification: Mutex<Option<JoinHandle<()>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport> Dongle<T> {
    #[must_use]
    pub fn new(transport: Arc<T>, serial_path: &str, retry: IdentificationRetry) -> Self {
        let identifier = Path::new(serial_path)
            .file_name()
            .map_or_else(|| serial_path.to_string(), |name| name.to_string_lossy().into_owned());
        Self {
            transport,
            serial_path: serial_path.to_string(),
            identifier,
            state: Arc::new(Mutex::new(DongleState::AwaitingIdentification)),
            retry,
            forwarder: Mutex::new(None),
            identification: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn serial_path(&self) -> &str {
        &self.serial_path
    }

    /// Short name of the dongle: the last component of its serial path.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn state(&self) -> DongleState {
        *lock(&self.state)
    }

    /// Start the transport, ask for the base id and forward `commands` to it.
    ///
    /// Returns the channel the transport pushes inbound frames into.
    ///
    /// # Errors
    ///
    /// Returns [`EnOceanError::Transport`] when the transport fails to start.
    pub fn setup(
        &self,
        commands: CommandReceiver,
    ) -> Result<mpsc::UnboundedReceiver<Packet>, EnOceanError> {
        let (inbound, packets) = mpsc::unbounded_channel();
        self.transport.start(inbound)?;
        *lock(&self.state) = DongleState::AwaitingIdentification;
        self.transport.request_base_id();

        let handle = tokio::spawn(forward_commands(Arc::clone(&self.transport), commands));
        if let Some(previous) = lock(&self.forwarder).replace(handle) {
            previous.abort();
        }

        tracing::info!(dongle = %self.identifier, path = %self.serial_path, "EnOcean dongle started");
        Ok(packets)
    }

    /// Classify one inbound frame. Radio telegrams are handed back.
    pub fn handle_packet(&self, packet: Packet) -> Option<Telegram> {
        match packet {
            Packet::Response(response) => {
                // The library resolves its base id from this very frame.
                self.transport.reinject(Packet::Response(response));
                if self.state() == DongleState::AwaitingIdentification {
                    self.schedule_identification();
                }
                None
            }
            Packet::Telegram(telegram) => {
                tracing::debug!(
                    sender = %telegram.sender(),
                    rorg = telegram.radio().rorg,
                    "received radio telegram"
                );
                Some(telegram)
            }
            Packet::Other { packet_type } => {
                tracing::trace!(packet_type, "ignoring packet");
                None
            }
        }
    }

    fn schedule_identification(&self) {
        let mut slot = lock(&self.identification);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *slot = Some(tokio::spawn(identify(
            Arc::clone(&self.transport),
            Arc::clone(&self.state),
            self.identifier.clone(),
            self.retry,
        )));
    }

    /// Stop forwarding commands and any pending identification. Idempotent.
    pub fn unload(&self) {
        if let Some(handle) = lock(&self.identification).take() {
            handle.abort();
        }
        if let Some(handle) = lock(&self.forwarder).take() {
            handle.abort();
            tracing::info!(dongle = %self.identifier, "EnOcean dongle unloaded");
        }
    }
}

impl<T> Drop for Dongle<T> {
    fn drop(&mut self) {
        for slot in [&self.forwarder, &self.identification] {
            if let Some(handle) = lock(slot).take() {
                handle.abort();
            }
        }
    }
}

async fn forward_commands<T: Transport>(transport: Arc<T>, mut commands: CommandReceiver) {
    while let Some(packet) = commands.recv().await {
        if let Err(err) = transport.send(packet) {
            tracing::warn!(%err, "failed to send EnOcean packet");
        }
    }
    tracing::debug!("command channel closed, forwarder stopped");
}

async fn identify<T: Transport>(
    transport: Arc<T>,
    state: Arc<Mutex<DongleState>>,
    identifier: String,
    retry: IdentificationRetry,
) {
    let Some(base_id) = await_base_id(transport.base_id(), retry).await else {
        tracing::debug!(dongle = %identifier, "dongle base id not resolved yet");
        return;
    };
    {
        let mut state = lock(&state);
        if *state == DongleState::Identified {
            return;
        }
        *state = DongleState::Identified;
    }
    tracing::info!(dongle = %identifier, %base_id, "dongle identified");
    transport.set_teach_in(true);
}

async fn await_base_id(
    mut base_id: watch::Receiver<Option<EnOceanId>>,
    retry: IdentificationRetry,
) -> Option<EnOceanId> {
    for _ in 0..retry.attempts {
        if let Some(id) = *base_id.borrow_and_update() {
            return Some(id);
        }
        if let Ok(Err(_)) = tokio::time::timeout(retry.interval, base_id.changed()).await {
            // The transport dropped its sender; the value is final.
            break;
        }
    }
    *base_id.borrow()
}

/// Publish a telegram from a known device, or try to create an unknown one.
pub async fn route_telegram<C: IntegrationContext>(
    telegram: Telegram,
    ctx: &C,
    dispatcher: &Dispatcher,
    switches: &SwitchTable,
) {
    let sender = telegram.sender();
    match ctx.find_device(INTEGRATION_NAME, &sender.to_string()).await {
        Ok(Some(_)) => dispatcher.publish(telegram),
        Ok(None) => {
            discovery::create_device(
                DiscoveryInfo::new(&telegram),
                ctx,
                &dispatcher.command_sender(),
                switches,
            )
            .await;
        }
        Err(err) => {
            tracing::warn!(%err, %sender, "device lookup failed, dropping telegram");
        }
    }
}

/// Inbound loop: classify every frame and route the telegrams.
///
/// Runs until the transport drops its sender.
pub async fn run<T: Transport, C: IntegrationContext>(
    dongle: Arc<Dongle<T>>,
    mut packets: mpsc::UnboundedReceiver<Packet>,
    ctx: C,
    dispatcher: Dispatcher,
    switches: SwitchTable,
) {
    while let Some(packet) = packets.recv().await {
        if let Some(telegram) = dongle.handle_packet(packet) {
            route_telegram(telegram, &ctx, &dispatcher, &switches).await;
        }
    }
    tracing::debug!(dongle = %dongle.identifier(), "inbound channel closed");
}

/// Candidate serial paths of plugged-in EnOcean dongles.
#[must_use]
pub fn detect() -> Vec<String> {
    let mut found = candidates_in(Path::new("/dev"), |name| {
        name.starts_with("tty") && name.contains("FTOA2PV")
    });
    found.extend(candidates_in(Path::new("/dev/serial/by-id"), |name| {
        name.contains("EnOcean")
    }));
    found
}

fn candidates_in(dir: &Path, matches: impl Fn(&str) -> bool) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_str().is_some_and(&matches))
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect();
    paths.sort();
    paths
}

/// Whether a transport can be opened on `path`.
#[must_use]
pub fn validate_path<T: Transport>(path: &str) -> bool {
    match T::open(path) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(%err, %path, "dongle path is invalid");
            false
        }
    }
}
