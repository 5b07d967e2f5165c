//! Peripheral connection registry.
//!
//! Records live in insertion order so "first record in state X" always
//! picks the oldest request. A side index maps connection handles to
//! record ids for the events that only carry a handle.

use crate::ble::{AddressType, BdAddr, ConnectionHandle};
use crate::config::MAX_PERIPHERALS;
use crate::error::Error;
use heapless::{LinearMap, Vec};

/// Opaque reference to a registry record, handed out by `connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralId(u16);

impl PeripheralId {
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Per-peripheral lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralState {
    Idle,
    /// Connect requested, LE Create Connection not sent yet.
    WantsConnection,
    /// LE Create Connection sent.
    AwaitingConnected,
    /// Link up, MTU request not sent yet.
    WantsMtuExchange,
    /// Exchange MTU request sent.
    AwaitingMtu,
    /// MTU negotiated, connection reported to the application.
    Ready,
    /// Cancel requested, cancel / disconnect command not sent yet.
    WantsDisconnect,
    /// Cancel / disconnect command sent.
    AwaitingDisconnected,
}

/// A peripheral connection record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Peripheral {
    pub(crate) id: PeripheralId,
    pub(crate) address: BdAddr,
    pub(crate) address_type: AddressType,
    pub(crate) handle: Option<ConnectionHandle>,
    pub(crate) mtu: u16,
    pub(crate) state: PeripheralState,
}

impl Peripheral {
    fn new(id: PeripheralId, address: BdAddr, address_type: AddressType) -> Self {
        Self {
            id,
            address,
            address_type,
            handle: None,
            mtu: 0,
            state: PeripheralState::Idle,
        }
    }

    pub fn id(&self) -> PeripheralId {
        self.id
    }

    pub fn address(&self) -> BdAddr {
        self.address
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    /// Link-layer handle, once the connection is established.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.handle
    }

    /// Negotiated ATT MTU; 0 until the exchange completes.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn state(&self) -> PeripheralState {
        self.state
    }
}

pub struct Registry {
    records: Vec<Peripheral, MAX_PERIPHERALS>,
    by_handle: LinearMap<ConnectionHandle, PeripheralId, MAX_PERIPHERALS>,
    next_id: u16,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            by_handle: LinearMap::new(),
            next_id: 0,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_handle.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.is_full()
    }

    /// Add a record for `address` in `WantsConnection`.
    pub fn insert(
        &mut self,
        address: BdAddr,
        address_type: AddressType,
    ) -> Result<PeripheralId, Error> {
        if self.records.is_full() {
            return Err(Error::RegistryFull);
        }

        let id = self.allocate_id();
        let mut record = Peripheral::new(id, address, address_type);
        record.state = PeripheralState::WantsConnection;
        self.records
            .push(record)
            .map_err(|_| Error::RegistryFull)?;
        Ok(id)
    }

    fn allocate_id(&mut self) -> PeripheralId {
        loop {
            let id = PeripheralId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.contains(id) {
                return id;
            }
        }
    }

    pub fn contains(&self, id: PeripheralId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: PeripheralId) -> Option<usize> {
        self.records.iter().position(|p| p.id == id)
    }

    pub fn get(&self, id: PeripheralId) -> Option<&Peripheral> {
        self.records.iter().find(|p| p.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: PeripheralId) -> Option<&mut Peripheral> {
        self.records.iter_mut().find(|p| p.id == id)
    }

    pub fn find_by_address(&self, address: &BdAddr) -> Option<&Peripheral> {
        self.records.iter().find(|p| p.address == *address)
    }

    pub fn find_by_handle(&self, handle: ConnectionHandle) -> Option<&Peripheral> {
        let id = *self.by_handle.get(&handle)?;
        self.get(id)
    }

    /// Oldest record in `state`.
    pub fn first_in(&self, state: PeripheralState) -> Option<&Peripheral> {
        self.first_where(|p| p.state == state)
    }

    pub fn first_where(&self, pred: impl Fn(&Peripheral) -> bool) -> Option<&Peripheral> {
        self.records.iter().find(|p| pred(p))
    }

    pub fn set_state(&mut self, id: PeripheralId, state: PeripheralState) {
        if let Some(p) = self.get_mut(id) {
            p.state = state;
        }
    }

    /// Record the link-layer handle and index it.
    pub fn bind_handle(&mut self, id: PeripheralId, handle: ConnectionHandle) {
        let Some(p) = self.get_mut(id) else {
            return;
        };
        if let Some(old) = p.handle.replace(handle) {
            self.by_handle.remove(&old);
        }
        if self.by_handle.insert(handle, id).is_err() {
            warn!("handle index full, {} not indexed", handle.raw());
        }
    }

    /// Take a record out of the registry, returning it in `Idle`.
    pub fn remove(&mut self, id: PeripheralId) -> Option<Peripheral> {
        let index = self.position(id)?;
        let mut record = self.records.remove(index);
        if let Some(handle) = record.handle {
            self.by_handle.remove(&handle);
        }
        record.state = PeripheralState::Idle;
        Some(record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peripheral> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> BdAddr {
        BdAddr::new([0xC0, 0, 0, 0, 0, last])
    }

    #[test]
    fn insert_starts_in_wants_connection() {
        let mut reg = Registry::new();
        let id = reg.insert(addr(1), AddressType::Public).unwrap();
        let p = reg.get(id).unwrap();
        assert_eq!(p.state(), PeripheralState::WantsConnection);
        assert_eq!(p.mtu(), 0);
        assert!(p.handle().is_none());
    }

    #[test]
    fn first_in_follows_insertion_order() {
        let mut reg = Registry::new();
        let a = reg.insert(addr(1), AddressType::Public).unwrap();
        let b = reg.insert(addr(2), AddressType::Random).unwrap();
        assert_eq!(reg.first_in(PeripheralState::WantsConnection).unwrap().id(), a);

        reg.set_state(a, PeripheralState::AwaitingConnected);
        assert_eq!(reg.first_in(PeripheralState::WantsConnection).unwrap().id(), b);
        assert!(reg.first_in(PeripheralState::Ready).is_none());
    }

    #[test]
    fn capacity_is_bounded() {
        let mut reg = Registry::new();
        for i in 0..MAX_PERIPHERALS {
            reg.insert(addr(i as u8), AddressType::Public).unwrap();
        }
        assert!(reg.is_full());
        assert_eq!(
            reg.insert(addr(0xFF), AddressType::Public),
            Err(Error::RegistryFull)
        );
    }

    #[test]
    fn handle_lookup_tracks_bind_and_remove() {
        let mut reg = Registry::new();
        let id = reg.insert(addr(1), AddressType::Public).unwrap();
        let handle = ConnectionHandle::new(0x40);

        reg.bind_handle(id, handle);
        assert_eq!(reg.find_by_handle(handle).unwrap().id(), id);

        let removed = reg.remove(id).unwrap();
        assert_eq!(removed.state(), PeripheralState::Idle);
        assert_eq!(removed.handle(), Some(handle));
        assert!(reg.find_by_handle(handle).is_none());
        assert!(!reg.contains(id));
    }

    #[test]
    fn ids_are_not_reused_while_live() {
        let mut reg = Registry::new();
        let a = reg.insert(addr(1), AddressType::Public).unwrap();
        reg.remove(a);
        let b = reg.insert(addr(2), AddressType::Public).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn find_by_address() {
        let mut reg = Registry::new();
        let id = reg.insert(addr(7), AddressType::Random).unwrap();
        assert_eq!(reg.find_by_address(&addr(7)).unwrap().id(), id);
        assert!(reg.find_by_address(&addr(8)).is_none());
    }
}
