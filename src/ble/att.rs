//! Attribute protocol PDUs carried on the fixed ATT channel.
//!
//! The central only negotiates the MTU; every other opcode is decoded as
//! [`AttPdu::Other`] so the dispatcher can drop it.

use crate::ble::hci::read_u16;
use crate::config::ATT_DEFAULT_MTU;
use crate::error::DecodeError;

/// L2CAP fixed channel for the attribute protocol.
pub const L2CAP_CID_ATT: u16 = 0x0004;

pub const ATT_EXCHANGE_MTU_REQUEST: u8 = 0x02;
pub const ATT_EXCHANGE_MTU_RESPONSE: u8 = 0x03;

/// Size of an Exchange MTU request / response PDU.
pub const EXCHANGE_MTU_PDU_SIZE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttPdu {
    ExchangeMtuResponse { server_rx_mtu: u16 },
    Other { opcode: u8 },
}

impl AttPdu {
    pub fn parse(pdu: &[u8]) -> Result<Self, DecodeError> {
        let Some(&opcode) = pdu.first() else {
            return Err(DecodeError::Empty);
        };
        match opcode {
            ATT_EXCHANGE_MTU_RESPONSE => {
                if pdu.len() < EXCHANGE_MTU_PDU_SIZE {
                    return Err(DecodeError::Truncated);
                }
                Ok(AttPdu::ExchangeMtuResponse {
                    server_rx_mtu: read_u16(pdu, 1),
                })
            }
            _ => Ok(AttPdu::Other { opcode }),
        }
    }
}

/// Exchange MTU request offering `client_rx_mtu`.
pub fn exchange_mtu_request(client_rx_mtu: u16) -> [u8; EXCHANGE_MTU_PDU_SIZE] {
    let mtu = client_rx_mtu.to_le_bytes();
    [ATT_EXCHANGE_MTU_REQUEST, mtu[0], mtu[1]]
}

/// ATT_MTU both sides settle on. Never below the LE default of 23.
pub fn negotiated_mtu(remote_rx_mtu: u16, local_rx_mtu: u16) -> u16 {
    remote_rx_mtu.min(local_rx_mtu).max(ATT_DEFAULT_MTU)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        assert_eq!(exchange_mtu_request(200), [0x02, 0xC8, 0x00]);
        assert_eq!(exchange_mtu_request(517), [0x02, 0x05, 0x02]);
    }

    #[test]
    fn parse_mtu_response() {
        assert_eq!(
            AttPdu::parse(&[0x03, 0x00, 0x02]).unwrap(),
            AttPdu::ExchangeMtuResponse { server_rx_mtu: 512 }
        );
    }

    #[test]
    fn other_opcodes_pass_through() {
        // Handle Value Notification
        assert_eq!(
            AttPdu::parse(&[0x1B, 0x03, 0x00, 0xAA]).unwrap(),
            AttPdu::Other { opcode: 0x1B }
        );
    }

    #[test]
    fn malformed_pdus() {
        assert_eq!(AttPdu::parse(&[]).unwrap_err(), DecodeError::Empty);
        assert_eq!(AttPdu::parse(&[0x03, 0x17]).unwrap_err(), DecodeError::Truncated);
    }

    #[test]
    fn negotiated_mtu_is_the_smaller_side() {
        assert_eq!(negotiated_mtu(512, 200), 200);
        assert_eq!(negotiated_mtu(23, 247), 23);
    }

    #[test]
    fn negotiated_mtu_floors_at_default() {
        assert_eq!(negotiated_mtu(5, 247), ATT_DEFAULT_MTU);
        assert_eq!(negotiated_mtu(512, 0), ATT_DEFAULT_MTU);
    }
}
