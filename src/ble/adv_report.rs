//! LE Advertising Report decoding.
//!
//! One LE Advertising Report event packs several reports as parallel
//! arrays rather than per-report records:
//!
//! ```text
//! num_reports | event_type[n] | address_type[n] | address[n * 6]
//!             | data_length[n] | data[sum(data_length)] | rssi[n]
//! ```
//!
//! The report count, each payload length and the total size are checked
//! up front, so iterating never indexes out of bounds.

use crate::ble::{AddressType, BdAddr};
use crate::config::{MAX_ADV_DATA_LEN, MAX_REPORTS_PER_EVENT};
use crate::error::DecodeError;

/// A single advertising report, borrowing its payload from the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvertisingReport<'a> {
    pub event_type: u8,
    pub address_type: AddressType,
    pub address: BdAddr,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
    /// Raw AD structures, unparsed.
    pub data: &'a [u8],
}

/// A validated batch of advertising reports.
#[derive(Clone, Copy, Debug)]
pub struct AdvertisingReports<'a> {
    count: usize,
    /// Parameters after the sub-event code, starting at the report count.
    params: &'a [u8],
    total_data_len: usize,
}

impl<'a> AdvertisingReports<'a> {
    /// Validate the parallel-array layout. `params` starts at `num_reports`.
    pub fn parse(params: &'a [u8]) -> Result<Self, DecodeError> {
        let Some(&num_reports) = params.first() else {
            return Err(DecodeError::Truncated);
        };
        let count = num_reports as usize;
        if count == 0 {
            return Err(DecodeError::NoReports);
        }
        if count > MAX_REPORTS_PER_EVENT {
            return Err(DecodeError::TooManyReports(num_reports));
        }

        // Fixed-size arrays up to and including the data lengths.
        let lengths_at = 1 + count * 8;
        if params.len() < lengths_at + count {
            return Err(DecodeError::Truncated);
        }

        let mut total_data_len = 0;
        for &len in &params[lengths_at..lengths_at + count] {
            if len as usize > MAX_ADV_DATA_LEN {
                return Err(DecodeError::PayloadTooLong(len));
            }
            total_data_len += len as usize;
        }

        let required = 1 + count * 10 + total_data_len;
        if params.len() < required {
            return Err(DecodeError::Truncated);
        }
        if params.len() > required {
            return Err(DecodeError::LengthMismatch);
        }

        Ok(Self {
            count,
            params,
            total_data_len,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reports in the order they were packed.
    pub fn iter(&self) -> Iter<'a> {
        Iter {
            reports: *self,
            index: 0,
            data_offset: 0,
        }
    }
}

impl<'a> IntoIterator for AdvertisingReports<'a> {
    type Item = AdvertisingReport<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Iterator over an [`AdvertisingReports`] batch.
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    reports: AdvertisingReports<'a>,
    index: usize,
    data_offset: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = AdvertisingReport<'a>;

    fn next(&mut self) -> Option<AdvertisingReport<'a>> {
        let n = self.reports.count;
        let i = self.index;
        if i >= n {
            return None;
        }
        let p = self.reports.params;

        let mut addr = [0u8; 6];
        let addr_at = 1 + n * 2 + i * 6;
        addr.copy_from_slice(&p[addr_at..addr_at + 6]);

        let len = p[1 + n * 8 + i] as usize;
        let data_at = 1 + n * 9 + self.data_offset;
        let rssi_at = 1 + n * 9 + self.reports.total_data_len + i;

        let report = AdvertisingReport {
            event_type: p[1 + i],
            address_type: AddressType::from(p[1 + n + i]),
            address: BdAddr::from_le_bytes(&addr),
            rssi: p[rssi_at] as i8,
            data: &p[data_at..data_at + len],
        };

        self.index += 1;
        self.data_offset += len;
        Some(report)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.reports.count - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two reports: 3 bytes and 0 bytes of payload.
    fn two_reports() -> [u8; 24] {
        [
            0x02, // num_reports
            0x00, 0x04, // event types
            0x00, 0x01, // address types
            0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // address 0
            0x16, 0x15, 0x14, 0x13, 0x12, 0x11, // address 1
            0x03, 0x00, // data lengths
            0x02, 0x01, 0x06, // data 0 (flags)
            0xC4, 0xB0, // rssi -60, -80
        ]
    }

    #[test]
    fn decodes_parallel_arrays_in_order() {
        let params = two_reports();
        let reports = AdvertisingReports::parse(&params).unwrap();
        assert_eq!(reports.len(), 2);

        let mut it = reports.iter();
        let first = it.next().unwrap();
        assert_eq!(first.event_type, 0x00);
        assert_eq!(first.address_type, AddressType::Public);
        assert_eq!(first.address.0, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(first.data, &[0x02, 0x01, 0x06]);
        assert_eq!(first.rssi, -60);

        let second = it.next().unwrap();
        assert_eq!(second.event_type, 0x04);
        assert_eq!(second.address_type, AddressType::Random);
        assert_eq!(second.address.0, [0x11, 0x12, 0x13, 0x14, 0x15, 0x16]);
        assert!(second.data.is_empty());
        assert_eq!(second.rssi, -80);

        assert!(it.next().is_none());
    }

    #[test]
    fn rejects_zero_reports() {
        assert_eq!(
            AdvertisingReports::parse(&[0x00]).unwrap_err(),
            DecodeError::NoReports
        );
    }

    #[test]
    fn rejects_report_count_over_limit() {
        let params = [26u8; 300];
        assert_eq!(
            AdvertisingReports::parse(&params).unwrap_err(),
            DecodeError::TooManyReports(26)
        );
    }

    #[test]
    fn rejects_truncated_payload() {
        let params = two_reports();
        assert_eq!(
            AdvertisingReports::parse(&params[..23]).unwrap_err(),
            DecodeError::Truncated
        );
        assert_eq!(
            AdvertisingReports::parse(&params[..10]).unwrap_err(),
            DecodeError::Truncated
        );
        assert_eq!(
            AdvertisingReports::parse(&[]).unwrap_err(),
            DecodeError::Truncated
        );
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut params = [0u8; 25];
        params[..24].copy_from_slice(&two_reports());
        assert_eq!(
            AdvertisingReports::parse(&params).unwrap_err(),
            DecodeError::LengthMismatch
        );
    }

    #[test]
    fn rejects_oversized_payload_length() {
        let mut params = two_reports();
        params[17] = 32;
        assert_eq!(
            AdvertisingReports::parse(&params).unwrap_err(),
            DecodeError::PayloadTooLong(32)
        );
    }
}
