//! In-process dispatch bus between the dongle and the entities.
//!
//! Two directions, two channels:
//!
//! - inbound telegrams fan out on a [`broadcast`] channel (one writer, the
//!   inbound loop; any number of subscribers)
//! - outbound commands funnel into one [`mpsc`] channel read by the dongle's
//!   forwarder

use tokio::sync::{broadcast, mpsc};

use crate::error::EnOceanError;
use crate::packet::{OutboundPacket, Telegram};

/// Receiving half of the command channel, owned by the dongle.
pub type CommandReceiver = mpsc::UnboundedReceiver<OutboundPacket>;

/// The dispatch bus owned by one integration instance.
#[derive(Clone)]
pub struct Dispatcher {
    telegrams: broadcast::Sender<Telegram>,
    commands: CommandSender,
}

impl Dispatcher {
    /// Create a bus whose telegram channel holds `capacity` messages.
    ///
    /// # Errors
    ///
    /// Returns [`EnOceanError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<(Self, CommandReceiver), EnOceanError> {
        if capacity == 0 {
            return Err(EnOceanError::InvalidCapacity);
        }
        let (telegrams, _) = broadcast::channel(capacity);
        let (commands, receiver) = mpsc::unbounded_channel();
        Ok((
            Self {
                telegrams,
                commands: CommandSender(commands),
            },
            receiver,
        ))
    }

    /// Broadcast a telegram to every subscriber.
    pub fn publish(&self, telegram: Telegram) {
        let sender = telegram.sender();
        match self.telegrams.send(telegram) {
            Ok(receivers) => tracing::trace!(%sender, receivers, "telegram dispatched"),
            Err(_) => tracing::trace!(%sender, "no subscriber for telegram"),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Telegram> {
        self.telegrams.subscribe()
    }

    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        self.commands.clone()
    }
}

/// Handle entities use to queue outbound frames.
#[derive(Debug, Clone)]
pub struct CommandSender(mpsc::UnboundedSender<OutboundPacket>);

impl CommandSender {
    /// Queue a frame for the dongle. Dropped once the dongle is unloaded.
    pub fn send(&self, packet: OutboundPacket) {
        if self.0.send(packet).is_err() {
            tracing::debug!("command channel closed, dropping outbound packet");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EnOceanId;
    use crate::packet::{Packet, PACKET_RADIO_ERP1};
    use crate::profiles;

    fn telegram() -> Telegram {
        let data = vec![0xD2, 0x04, 0x01, 0x64, 0x04, 0x05, 0x06, 0x07, 0x00];
        match Packet::from_esp3(PACKET_RADIO_ERP1, data, vec![]) {
            Packet::Telegram(telegram) => telegram,
            other => panic!("expected telegram, got {other:?}"),
        }
    }

    #[test]
    fn should_reject_zero_capacity() {
        assert!(matches!(
            Dispatcher::new(0),
            Err(EnOceanError::InvalidCapacity)
        ));
    }

    #[tokio::test]
    async fn should_fan_out_telegrams_to_every_subscriber() {
        let (dispatcher, _commands) = Dispatcher::new(8).unwrap();
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();

        dispatcher.publish(telegram());

        assert_eq!(first.recv().await.unwrap(), telegram());
        assert_eq!(second.recv().await.unwrap(), telegram());
    }

    #[test]
    fn should_publish_without_subscribers() {
        let (dispatcher, _commands) = Dispatcher::new(8).unwrap();
        dispatcher.publish(telegram());
    }

    #[tokio::test]
    async fn should_funnel_commands_from_every_clone() {
        let (dispatcher, mut commands) = Dispatcher::new(8).unwrap();
        let a = dispatcher.command_sender();
        let b = a.clone();
        let dest = EnOceanId::new([4, 5, 6, 7]);

        a.send(profiles::set_output(dest, 1, profiles::OUTPUT_ON));
        b.send(profiles::set_output(dest, 2, profiles::OUTPUT_OFF));

        assert_eq!(commands.recv().await.unwrap().data[2], 1);
        assert_eq!(commands.recv().await.unwrap().data[2], 2);
    }

    #[test]
    fn should_drop_command_when_receiver_is_gone() {
        let (dispatcher, commands) = Dispatcher::new(8).unwrap();
        drop(commands);
        dispatcher
            .command_sender()
            .send(profiles::set_output(EnOceanId::new([0; 4]), 1, profiles::OUTPUT_ON));
    }
}
