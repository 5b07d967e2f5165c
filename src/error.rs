//! Unified error type for le-central.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Protocol status codes are not errors; they travel in [`Status`] and are
//! surfaced through connection events.
//!
//! [`Status`]: crate::ble::Status

use core::fmt;

/// Top-level error type returned by the client API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The peripheral registry has no free slot for another record.
    RegistryFull,

    /// A handler tried to defer more requests than the queue holds.
    RequestQueueFull,

    /// An incoming packet could not be decoded.
    Decode(DecodeError),
}

/// Why an incoming HCI event or ATT PDU was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Zero-length packet.
    Empty,
    /// Packet shorter than its fixed header or parameters.
    Truncated,
    /// Declared parameter length disagrees with the bytes received.
    LengthMismatch,
    /// Advertising report event announcing zero reports.
    NoReports,
    /// Advertising report event announcing more reports than we accept.
    TooManyReports(u8),
    /// Advertising payload longer than the legacy 31-byte limit.
    PayloadTooLong(u8),
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RegistryFull => f.write_str("peripheral registry full"),
            Error::RequestQueueFull => f.write_str("deferred request queue full"),
            Error::Decode(e) => write!(f, "malformed packet: {}", e),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => f.write_str("empty packet"),
            DecodeError::Truncated => f.write_str("truncated packet"),
            DecodeError::LengthMismatch => f.write_str("parameter length mismatch"),
            DecodeError::NoReports => f.write_str("advertising event without reports"),
            DecodeError::TooManyReports(n) => write!(f, "{} advertising reports in one event", n),
            DecodeError::PayloadTooLong(n) => write!(f, "advertising payload of {} bytes", n),
        }
    }
}
