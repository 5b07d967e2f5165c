//! Single-connection Bluetooth LE central client.
//!
//! The client sits on top of an HCI transport and drives the controller
//! through scanning, connecting to one peripheral at a time, and
//! negotiating the ATT MTU. Lifecycle changes and advertising reports are
//! delivered to an application [`EventHandler`].
//!
//! Everything is `no_std` and allocation-free; capacities are fixed in
//! [`config`]. Host tests run with `cargo test`.
//!
//! ```ignore
//! let mut central = Central::new(transport, EventQueue::<8>::new(), ClientConfig::default());
//! central.handle_packet(Packet::Stack(StackState::Working))?;
//! central.start_scan();
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod error;

pub use ble::central::{Central, DriverState, Packet, StackState};
pub use ble::registry::{Peripheral, PeripheralId, PeripheralState};
pub use ble::sink::{EventHandler, EventQueue, Request, Requests};
pub use ble::transport::Transport;
pub use ble::{AddressType, Advertisement, BdAddr, ConnectionEvent, ConnectionHandle, Event, Status};
pub use config::ClientConfig;
pub use error::{DecodeError, Error};

#[cfg(feature = "embassy")]
pub use ble::sink::ChannelHandler;
