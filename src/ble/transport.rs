//! Transport gate and send interface.
//!
//! The caller implements this on top of its HCI driver. Both gates are
//! non-blocking polls: when either reports busy the central does nothing
//! and tries again on the next event.

use crate::ble::hci::Command;
use crate::ble::ConnectionHandle;

pub trait Transport {
    /// The command channel can take another HCI command right now.
    fn can_send_command(&self) -> bool;

    /// The ACL data channel can take another connectionless packet right now.
    fn can_send_data(&self) -> bool;

    /// Issue a control command. Only called after `can_send_command`.
    fn send_command(&mut self, command: &Command);

    /// Send `payload` on L2CAP `channel_id` of `handle`. Only called after
    /// `can_send_data`.
    fn send_data(&mut self, handle: ConnectionHandle, channel_id: u16, payload: &[u8]);

    /// Largest ATT MTU the local side accepts on `handle`, when the link
    /// layer knows better than the client configuration.
    fn max_mtu(&self, _handle: ConnectionHandle) -> Option<u16> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn can_send_command(&self) -> bool {
        (**self).can_send_command()
    }

    fn can_send_data(&self) -> bool {
        (**self).can_send_data()
    }

    fn send_command(&mut self, command: &Command) {
        (**self).send_command(command)
    }

    fn send_data(&mut self, handle: ConnectionHandle, channel_id: u16, payload: &[u8]) {
        (**self).send_data(handle, channel_id, payload)
    }

    fn max_mtu(&self, handle: ConnectionHandle) -> Option<u16> {
        (**self).max_mtu(handle)
    }
}
