//! HCI command encoding and event decoding.
//!
//! Only the commands and events the central actually uses are modelled;
//! anything else decodes to [`HciEvent::Unknown`] and is ignored by the
//! dispatcher.

use crate::ble::adv_report::AdvertisingReports;
use crate::ble::{AddressType, BdAddr, ConnectionHandle, Status};
use crate::config::ConnectionParameters;
use crate::error::DecodeError;

/// HCI command opcodes (OGF << 10 | OCF).
pub mod opcode {
    pub const DISCONNECT: u16 = 0x0406;
    pub const LE_SET_SCAN_ENABLE: u16 = 0x200C;
    pub const LE_CREATE_CONNECTION: u16 = 0x200D;
    pub const LE_CREATE_CONNECTION_CANCEL: u16 = 0x200E;
}

/// HCI event codes.
pub mod event_code {
    pub const DISCONNECTION_COMPLETE: u8 = 0x05;
    pub const COMMAND_COMPLETE: u8 = 0x0E;
    pub const COMMAND_STATUS: u8 = 0x0F;
    pub const LE_META: u8 = 0x3E;
}

/// LE Meta event sub-event codes.
pub mod le_subevent {
    pub const CONNECTION_COMPLETE: u8 = 0x01;
    pub const ADVERTISING_REPORT: u8 = 0x02;
}

/// Command header: 2-byte opcode + 1-byte parameter length.
pub const COMMAND_HEADER_SIZE: usize = 3;

/// Largest command we emit (LE Create Connection).
pub const MAX_COMMAND_SIZE: usize = COMMAND_HEADER_SIZE + 25;

/// Control commands the central issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    LeSetScanEnable {
        enable: bool,
        filter_duplicates: bool,
    },
    LeCreateConnection {
        peer_address_type: AddressType,
        peer_address: BdAddr,
        params: ConnectionParameters,
    },
    LeCreateConnectionCancel,
    Disconnect {
        handle: ConnectionHandle,
        reason: Status,
    },
}

impl Command {
    pub fn opcode(&self) -> u16 {
        match self {
            Command::LeSetScanEnable { .. } => opcode::LE_SET_SCAN_ENABLE,
            Command::LeCreateConnection { .. } => opcode::LE_CREATE_CONNECTION,
            Command::LeCreateConnectionCancel => opcode::LE_CREATE_CONNECTION_CANCEL,
            Command::Disconnect { .. } => opcode::DISCONNECT,
        }
    }

    fn param_len(&self) -> usize {
        match self {
            Command::LeSetScanEnable { .. } => 2,
            Command::LeCreateConnection { .. } => 25,
            Command::LeCreateConnectionCancel => 0,
            Command::Disconnect { .. } => 3,
        }
    }

    /// Serialize as an HCI command packet (without the H4 packet indicator).
    ///
    /// Returns the number of bytes written, or 0 if `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        let total = COMMAND_HEADER_SIZE + self.param_len();
        if buf.len() < total {
            return 0;
        }

        buf[0..2].copy_from_slice(&self.opcode().to_le_bytes());
        buf[2] = self.param_len() as u8;
        let p = &mut buf[COMMAND_HEADER_SIZE..total];

        match self {
            Command::LeSetScanEnable {
                enable,
                filter_duplicates,
            } => {
                p[0] = *enable as u8;
                p[1] = *filter_duplicates as u8;
            }
            Command::LeCreateConnection {
                peer_address_type,
                peer_address,
                params,
            } => {
                p[0..2].copy_from_slice(&params.scan_interval.to_le_bytes());
                p[2..4].copy_from_slice(&params.scan_window.to_le_bytes());
                p[4] = 0x00; // initiator filter policy: use peer address
                p[5] = u8::from(*peer_address_type);
                p[6..12].copy_from_slice(&peer_address.to_le_bytes());
                p[12] = 0x00; // own address type: public
                p[13..15].copy_from_slice(&params.conn_interval_min.to_le_bytes());
                p[15..17].copy_from_slice(&params.conn_interval_max.to_le_bytes());
                p[17..19].copy_from_slice(&params.conn_latency.to_le_bytes());
                p[19..21].copy_from_slice(&params.supervision_timeout.to_le_bytes());
                p[21..23].copy_from_slice(&params.min_ce_length.to_le_bytes());
                p[23..25].copy_from_slice(&params.max_ce_length.to_le_bytes());
            }
            Command::LeCreateConnectionCancel => {}
            Command::Disconnect { handle, reason } => {
                p[0..2].copy_from_slice(&handle.raw().to_le_bytes());
                p[2] = reason.0;
            }
        }

        total
    }
}

/// LE Connection Complete sub-event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeConnectionComplete {
    pub status: Status,
    pub handle: ConnectionHandle,
    pub role: u8,
    pub peer_address_type: AddressType,
    pub peer_address: BdAddr,
    pub conn_interval: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
}

impl LeConnectionComplete {
    /// Parameters after the sub-event code.
    const LEN: usize = 18;

    fn parse(p: &[u8]) -> Result<Self, DecodeError> {
        if p.len() < Self::LEN {
            return Err(DecodeError::Truncated);
        }
        let mut addr = [0u8; 6];
        addr.copy_from_slice(&p[5..11]);
        Ok(Self {
            status: Status(p[0]),
            handle: ConnectionHandle::new(read_u16(p, 1)),
            role: p[3],
            peer_address_type: AddressType::from(p[4]),
            peer_address: BdAddr::from_le_bytes(&addr),
            conn_interval: read_u16(p, 11),
            conn_latency: read_u16(p, 13),
            supervision_timeout: read_u16(p, 15),
        })
    }
}

/// Decoded HCI event, borrowing variable-length parts from the packet.
#[derive(Clone, Copy, Debug)]
pub enum HciEvent<'a> {
    CommandComplete {
        num_packets: u8,
        opcode: u16,
        /// First return parameter; success when the command returns none.
        status: Status,
    },
    CommandStatus {
        status: Status,
        num_packets: u8,
        opcode: u16,
    },
    DisconnectionComplete {
        status: Status,
        handle: ConnectionHandle,
        reason: Status,
    },
    LeConnectionComplete(LeConnectionComplete),
    LeAdvertisingReport(AdvertisingReports<'a>),
    /// Event or LE sub-event we do not handle.
    Unknown { code: u8 },
}

impl<'a> HciEvent<'a> {
    /// Decode an HCI event packet: event code, parameter length, parameters.
    pub fn parse(packet: &'a [u8]) -> Result<Self, DecodeError> {
        if packet.is_empty() {
            return Err(DecodeError::Empty);
        }
        if packet.len() < 2 {
            return Err(DecodeError::Truncated);
        }

        let code = packet[0];
        let len = packet[1] as usize;
        if packet.len() - 2 != len {
            return Err(DecodeError::LengthMismatch);
        }
        let p = &packet[2..];

        match code {
            event_code::COMMAND_COMPLETE => {
                if p.len() < 3 {
                    return Err(DecodeError::Truncated);
                }
                Ok(HciEvent::CommandComplete {
                    num_packets: p[0],
                    opcode: read_u16(p, 1),
                    status: p.get(3).map_or(Status::SUCCESS, |s| Status(*s)),
                })
            }
            event_code::COMMAND_STATUS => {
                if p.len() < 4 {
                    return Err(DecodeError::Truncated);
                }
                Ok(HciEvent::CommandStatus {
                    status: Status(p[0]),
                    num_packets: p[1],
                    opcode: read_u16(p, 2),
                })
            }
            event_code::DISCONNECTION_COMPLETE => {
                if p.len() < 4 {
                    return Err(DecodeError::Truncated);
                }
                Ok(HciEvent::DisconnectionComplete {
                    status: Status(p[0]),
                    handle: ConnectionHandle::new(read_u16(p, 1)),
                    reason: Status(p[3]),
                })
            }
            event_code::LE_META => {
                let Some((&subevent, rest)) = p.split_first() else {
                    return Err(DecodeError::Truncated);
                };
                match subevent {
                    le_subevent::CONNECTION_COMPLETE => {
                        LeConnectionComplete::parse(rest).map(HciEvent::LeConnectionComplete)
                    }
                    le_subevent::ADVERTISING_REPORT => {
                        AdvertisingReports::parse(rest).map(HciEvent::LeAdvertisingReport)
                    }
                    _ => Ok(HciEvent::Unknown { code }),
                }
            }
            _ => Ok(HciEvent::Unknown { code }),
        }
    }
}

/// Read a little-endian u16 at `offset`. Caller checks bounds.
pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}
