//! Bluetooth Low Energy central subsystem.
//!
//! This module drives an HCI controller in **Central** role over a
//! transport that accepts one outstanding command at a time:
//!
//! 1. **Central** - the driver state machine and event dispatcher. It
//!    scans, connects to one peripheral, negotiates the ATT MTU and
//!    reports lifecycle changes.
//! 2. **Registry** - the peripheral connection records, looked up by
//!    record id, connection handle or record state.
//! 3. **Transport** - the gate and send interface the caller implements
//!    on top of its HCI/L2CAP driver.
//! 4. **Sink** - the event handler the central notifies, plus queue and
//!    channel adapters.
//!
//! The HCI and ATT codecs live in [`hci`], [`adv_report`] and [`att`].

pub mod adv_report;
pub mod att;
pub mod central;
pub mod hci;
pub mod registry;
pub mod sink;
pub mod transport;

use core::fmt;

use crate::config::MAX_ADV_DATA_LEN;
use adv_report::AdvertisingReport;
use heapless::Vec;
use registry::Peripheral;

/// Bluetooth device address, most significant byte first.
///
/// HCI carries addresses little-endian; use [`BdAddr::from_le_bytes`] and
/// [`BdAddr::to_le_bytes`] at the wire boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build from the little-endian order used on the wire.
    pub fn from_le_bytes(wire: &[u8; 6]) -> Self {
        let mut bytes = *wire;
        bytes.reverse();
        Self(bytes)
    }

    pub fn to_le_bytes(&self) -> [u8; 6] {
        let mut wire = self.0;
        wire.reverse();
        wire
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// LE address type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressType {
    Public,
    Random,
    /// Identity-address variants and anything newer, kept verbatim.
    Other(u8),
}

impl From<u8> for AddressType {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => AddressType::Public,
            0x01 => AddressType::Random,
            other => AddressType::Other(other),
        }
    }
}

impl From<AddressType> for u8 {
    fn from(t: AddressType) -> u8 {
        match t {
            AddressType::Public => 0x00,
            AddressType::Random => 0x01,
            AddressType::Other(raw) => raw,
        }
    }
}

/// Connection handle assigned by the link layer (12 significant bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHandle(pub u16);

impl ConnectionHandle {
    /// Strip the packet-boundary / broadcast flags.
    pub const fn new(raw: u16) -> Self {
        Self(raw & 0x0FFF)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// HCI status / error code. Zero is success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Status = Status(0x00);
    pub const UNKNOWN_CONNECTION_ID: Status = Status(0x02);
    pub const HARDWARE_FAILURE: Status = Status(0x03);
    pub const PAGE_TIMEOUT: Status = Status(0x04);
    pub const CONNECTION_TIMEOUT: Status = Status(0x08);
    pub const COMMAND_DISALLOWED: Status = Status(0x0C);
    pub const REMOTE_USER_TERMINATED: Status = Status(0x13);
    pub const TERMINATED_BY_LOCAL_HOST: Status = Status(0x16);
    pub const CONNECTION_FAILED_TO_ESTABLISH: Status = Status(0x3E);

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Owned copy of one advertising report.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Advertisement {
    pub event_type: u8,
    pub address_type: AddressType,
    pub address: BdAddr,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
    /// Raw AD structures, unparsed.
    pub data: Vec<u8, MAX_ADV_DATA_LEN>,
}

impl From<&AdvertisingReport<'_>> for Advertisement {
    fn from(report: &AdvertisingReport<'_>) -> Self {
        let mut data = Vec::new();
        // Decoding already capped the payload at MAX_ADV_DATA_LEN.
        let _ = data.extend_from_slice(report.data);
        Self {
            event_type: report.event_type,
            address_type: report.address_type,
            address: report.address,
            rssi: report.rssi,
            data,
        }
    }
}

/// Connection lifecycle notification.
///
/// The peripheral is a snapshot taken when the event fired; the record
/// may already have left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    /// Connection attempt finished. Success is only reported once the MTU
    /// exchange is done.
    ConnectionComplete { peripheral: Peripheral, status: Status },
    /// Link closed, or an in-flight connect was cancelled.
    DisconnectionComplete {
        peripheral: Peripheral,
        status: Status,
        reason: Status,
    },
}

impl ConnectionEvent {
    pub fn peripheral(&self) -> &Peripheral {
        match self {
            ConnectionEvent::ConnectionComplete { peripheral, .. }
            | ConnectionEvent::DisconnectionComplete { peripheral, .. } => peripheral,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ConnectionEvent::ConnectionComplete { status, .. }
            | ConnectionEvent::DisconnectionComplete { status, .. } => *status,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionEvent::ConnectionComplete { status, .. } if status.is_success())
    }
}

/// Everything the central publishes to the application.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Advertisement(Advertisement),
    Connection(ConnectionEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bd_addr_wire_order_is_reversed() {
        let wire = [0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
        let addr = BdAddr::from_le_bytes(&wire);
        assert_eq!(addr.0, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(addr.to_le_bytes(), wire);
    }

    #[test]
    fn bd_addr_display() {
        let addr = BdAddr::new([0xC0, 0xFF, 0xEE, 0x00, 0x01, 0x0A]);
        assert_eq!(std::format!("{}", addr), "C0:FF:EE:00:01:0A");
    }

    #[test]
    fn address_type_keeps_unknown_values() {
        assert_eq!(AddressType::from(0), AddressType::Public);
        assert_eq!(AddressType::from(1), AddressType::Random);
        assert_eq!(AddressType::from(3), AddressType::Other(3));
        assert_eq!(u8::from(AddressType::Other(3)), 3);
    }

    #[test]
    fn connection_handle_masks_flags() {
        assert_eq!(ConnectionHandle::new(0x2040).raw(), 0x0040);
    }

    #[test]
    fn status_success() {
        assert!(Status::SUCCESS.is_success());
        assert!(!Status::PAGE_TIMEOUT.is_success());
    }
}
