//! Client-wide constants and runtime configuration.
//!
//! Capacity limits, protocol constants and LE connection defaults live
//! here so they can be tuned in one place.

// Capacity

/// Maximum number of peripheral records the registry tracks.
pub const MAX_PERIPHERALS: usize = 4;

/// Maximum advertising reports accepted in one LE Advertising Report event.
/// The controller never packs more than 0x19.
pub const MAX_REPORTS_PER_EVENT: usize = 25;

/// Legacy advertising / scan response payload limit (bytes).
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Requests a handler may defer during a single dispatch.
pub const MAX_DEFERRED_REQUESTS: usize = 4;

// ATT / L2CAP

/// ATT_MTU every LE link starts with.
pub const ATT_DEFAULT_MTU: u16 = 23;

/// Largest ATT MTU we offer when the transport does not say otherwise.
/// 251-byte LE data length minus the 4-byte L2CAP header.
pub const L2CAP_MAX_MTU: u16 = 247;

// LE scanning / initiating

/// Initiator scan interval and window (in 0.625 ms units). 1000 = 625 ms.
pub const LE_SCAN_INTERVAL: u16 = 1000;
pub const LE_SCAN_WINDOW: u16 = 1000;

/// Drop duplicate advertising reports in the controller.
pub const LE_FILTER_DUPLICATES: bool = false;

/// Connection interval range (in 1.25 ms units). 80 = 100 ms.
pub const LE_CONN_INTERVAL_MIN: u16 = 80;
pub const LE_CONN_INTERVAL_MAX: u16 = 80;

/// Peripheral latency (connection events the peripheral may skip).
pub const LE_CONN_LATENCY: u16 = 0;

/// Supervision timeout (in 10 ms units). 2000 = 20 s.
pub const LE_SUPERVISION_TIMEOUT: u16 = 2000;

/// Connection event length hints (in 0.625 ms units).
pub const LE_MIN_CE_LENGTH: u16 = 0;
pub const LE_MAX_CE_LENGTH: u16 = 1000;

/// Parameters sent with every LE Create Connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionParameters {
    pub scan_interval: u16,
    pub scan_window: u16,
    pub conn_interval_min: u16,
    pub conn_interval_max: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
    pub min_ce_length: u16,
    pub max_ce_length: u16,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            scan_interval: LE_SCAN_INTERVAL,
            scan_window: LE_SCAN_WINDOW,
            conn_interval_min: LE_CONN_INTERVAL_MIN,
            conn_interval_max: LE_CONN_INTERVAL_MAX,
            conn_latency: LE_CONN_LATENCY,
            supervision_timeout: LE_SUPERVISION_TIMEOUT,
            min_ce_length: LE_MIN_CE_LENGTH,
            max_ce_length: LE_MAX_CE_LENGTH,
        }
    }
}

/// Runtime configuration handed to [`Central::new`](crate::ble::central::Central::new).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClientConfig {
    /// Ask the controller to filter duplicate advertising reports.
    pub filter_duplicates: bool,
    /// ATT MTU offered when the transport has no per-link limit.
    pub local_max_mtu: u16,
    pub connection: ConnectionParameters,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            filter_duplicates: LE_FILTER_DUPLICATES,
            local_max_mtu: L2CAP_MAX_MTU,
            connection: ConnectionParameters::default(),
        }
    }
}
