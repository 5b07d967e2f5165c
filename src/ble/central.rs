//! Central driver - scan / connect / MTU state machine and event dispatcher.
//!
//! The central owns its transport and handler. Every entry point ends in
//! [`Central::run`], which issues at most one command per call and only
//! when both transport gates are open. Completions come back through
//! [`Central::handle_packet`], which updates the driver and registry,
//! notifies the handler, and then runs one driver step.
//!
//! Only one peripheral is connected at a time. Further connect requests
//! queue in the registry and are served, oldest first, once the driver is
//! idle again.

use crate::ble::adv_report::AdvertisingReports;
use crate::ble::att::{self, AttPdu, L2CAP_CID_ATT};
use crate::ble::hci::{opcode, Command, HciEvent, LeConnectionComplete};
use crate::ble::registry::{Peripheral, PeripheralId, PeripheralState, Registry};
use crate::ble::sink::{EventHandler, Request, Requests};
use crate::ble::transport::Transport;
use crate::ble::{AddressType, BdAddr, ConnectionEvent, ConnectionHandle, Status};
use crate::config::ClientConfig;
use crate::error::Error;

/// Global driver state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// Waiting for the stack to report it is working.
    AwaitingStackReady,
    Idle,
    StartScan,
    AwaitingScanActive,
    ScanActive,
    StopScan,
    AwaitingScanStopped,
    AwaitingConnection,
    Connected,
    Disconnect,
    AwaitingDisconnected,
}

/// Stack power state reported by the HCI driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackState {
    Off,
    Initializing,
    Working,
    Halting,
}

/// One incoming item from the external run loop.
#[derive(Clone, Copy, Debug)]
pub enum Packet<'a> {
    /// Stack lifecycle change.
    Stack(StackState),
    /// HCI event packet: event code, parameter length, parameters.
    Hci(&'a [u8]),
    /// Connectionless L2CAP payload received on `channel_id` of `handle`.
    Data {
        handle: ConnectionHandle,
        channel_id: u16,
        payload: &'a [u8],
    },
}

pub struct Central<T: Transport, H: EventHandler> {
    transport: T,
    handler: H,
    config: ClientConfig,
    state: DriverState,
    registry: Registry,
    requests: Requests,
}

impl<T: Transport, H: EventHandler> Central<T, H> {
    pub fn new(transport: T, handler: H, config: ClientConfig) -> Self {
        Self {
            transport,
            handler,
            config,
            state: DriverState::AwaitingStackReady,
            registry: Registry::new(),
            requests: Requests::new(),
        }
    }

    /// Back to `AwaitingStackReady` with an empty registry. No events.
    pub fn initialize(&mut self) {
        self.state = DriverState::AwaitingStackReady;
        self.registry.clear();
        self.requests.clear();
    }

    // ─── Accessors ─────────────────────────────────────────────────────────

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn peripheral(&self, id: PeripheralId) -> Option<&Peripheral> {
        self.registry.get(id)
    }

    pub fn is_registered(&self, id: PeripheralId) -> bool {
        self.registry.contains(id)
    }

    pub fn peripherals(&self) -> impl Iterator<Item = &Peripheral> {
        self.registry.iter()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Install `handler`, returning the previous one.
    pub fn register_event_handler(&mut self, handler: H) -> H {
        core::mem::replace(&mut self.handler, handler)
    }

    // ─── Application API ───────────────────────────────────────────────────

    /// Start scanning. Ignored unless the driver is idle.
    pub fn start_scan(&mut self) {
        self.apply_start_scan();
        self.run();
    }

    /// Stop scanning. Ignored unless a scan is active.
    pub fn stop_scan(&mut self) {
        self.apply_stop_scan();
        self.run();
    }

    /// Queue a connection to `address`.
    ///
    /// The outcome arrives later as a [`ConnectionEvent`]. An address that
    /// already has a record gets that record back unchanged.
    pub fn connect(
        &mut self,
        address: BdAddr,
        address_type: AddressType,
    ) -> Result<PeripheralId, Error> {
        let id = self.apply_connect(address, address_type)?;
        self.run();
        Ok(id)
    }

    /// Cancel a queued, in-flight or established connection.
    ///
    /// A request that has not reached the controller is dropped silently;
    /// anything further along goes through the transport and ends in a
    /// disconnection event.
    pub fn cancel_connect(&mut self, id: PeripheralId) {
        self.apply_cancel_connect(id);
        self.run();
    }

    fn apply_start_scan(&mut self) {
        if self.state != DriverState::Idle {
            debug!("start_scan ignored in {:?}", self.state);
            return;
        }
        self.transition(DriverState::StartScan);
    }

    fn apply_stop_scan(&mut self) {
        if self.state != DriverState::ScanActive {
            debug!("stop_scan ignored in {:?}", self.state);
            return;
        }
        self.transition(DriverState::StopScan);
    }

    fn apply_connect(
        &mut self,
        address: BdAddr,
        address_type: AddressType,
    ) -> Result<PeripheralId, Error> {
        if let Some(existing) = self.registry.find_by_address(&address) {
            debug!("connect: {} already registered", address);
            return Ok(existing.id());
        }
        let id = self.registry.insert(address, address_type)?;
        info!("connect requested: {}", address);
        Ok(id)
    }

    fn apply_cancel_connect(&mut self, id: PeripheralId) {
        let Some(state) = self.registry.get(id).map(|p| p.state()) else {
            return;
        };

        match state {
            PeripheralState::Idle
            | PeripheralState::WantsDisconnect
            | PeripheralState::AwaitingDisconnected => {}
            PeripheralState::WantsConnection => {
                self.registry.remove(id);
                debug!("cancelled queued connect {}", id.raw());
            }
            PeripheralState::AwaitingConnected
            | PeripheralState::WantsMtuExchange
            | PeripheralState::AwaitingMtu
            | PeripheralState::Ready => {
                self.registry.set_state(id, PeripheralState::WantsDisconnect);
                self.transition(DriverState::Disconnect);
            }
        }
    }

    fn apply_deferred(&mut self) {
        while let Some(request) = self.requests.pop() {
            match request {
                Request::StartScan => self.apply_start_scan(),
                Request::StopScan => self.apply_stop_scan(),
                Request::Connect {
                    address,
                    address_type,
                } => {
                    if let Err(e) = self.apply_connect(address, address_type) {
                        warn!("deferred connect dropped: {}", e);
                    }
                }
                Request::CancelConnect(id) => self.apply_cancel_connect(id),
            }
        }
    }

    // ─── Driver step ───────────────────────────────────────────────────────

    /// Run one driver step: apply deferred requests, then issue at most
    /// one command if both transport gates are open.
    pub fn run(&mut self) {
        self.apply_deferred();

        if !self.transport.can_send_command() || !self.transport.can_send_data() {
            return;
        }

        match self.state {
            DriverState::Idle => {
                let Some(p) = self.registry.first_in(PeripheralState::WantsConnection) else {
                    return;
                };
                let (id, address, address_type) = (p.id(), p.address(), p.address_type());

                self.registry.set_state(id, PeripheralState::AwaitingConnected);
                self.transition(DriverState::AwaitingConnection);
                self.send_command(Command::LeCreateConnection {
                    peer_address_type: address_type,
                    peer_address: address,
                    params: self.config.connection,
                });
            }
            DriverState::StartScan => {
                self.transition(DriverState::AwaitingScanActive);
                self.send_scan_enable(true);
            }
            DriverState::ScanActive => {
                // A pending connect needs the radio; stop scanning first.
                if self
                    .registry
                    .first_in(PeripheralState::WantsConnection)
                    .is_some()
                {
                    self.transition(DriverState::AwaitingScanStopped);
                    self.send_scan_enable(false);
                }
            }
            DriverState::StopScan => {
                self.transition(DriverState::AwaitingScanStopped);
                self.send_scan_enable(false);
            }
            DriverState::Connected => {
                let Some(p) = self.registry.first_in(PeripheralState::WantsMtuExchange) else {
                    return;
                };
                let (id, handle) = (p.id(), p.handle());
                let Some(handle) = handle else {
                    return;
                };

                let mtu = self.local_mtu(handle);
                self.registry.set_state(id, PeripheralState::AwaitingMtu);
                debug!("exchange MTU on {}: offering {}", handle.raw(), mtu);
                self.transport
                    .send_data(handle, L2CAP_CID_ATT, &att::exchange_mtu_request(mtu));
            }
            DriverState::Disconnect => {
                // Re-query: the record may have completed or vanished since
                // the cancel was requested.
                let Some(p) = self.registry.first_in(PeripheralState::WantsDisconnect) else {
                    self.settle();
                    return;
                };
                let (id, handle) = (p.id(), p.handle());

                self.registry
                    .set_state(id, PeripheralState::AwaitingDisconnected);
                self.transition(DriverState::AwaitingDisconnected);
                match handle {
                    Some(handle) => self.send_command(Command::Disconnect {
                        handle,
                        reason: Status::REMOTE_USER_TERMINATED,
                    }),
                    None => self.send_command(Command::LeCreateConnectionCancel),
                }
            }
            DriverState::AwaitingStackReady
            | DriverState::AwaitingScanActive
            | DriverState::AwaitingScanStopped
            | DriverState::AwaitingConnection
            | DriverState::AwaitingDisconnected => {}
        }
    }

    fn send_scan_enable(&mut self, enable: bool) {
        self.send_command(Command::LeSetScanEnable {
            enable,
            filter_duplicates: self.config.filter_duplicates,
        });
    }

    fn send_command(&mut self, command: Command) {
        trace!("send command 0x{:04x}", command.opcode());
        self.transport.send_command(&command);
    }

    fn local_mtu(&self, handle: ConnectionHandle) -> u16 {
        self.transport
            .max_mtu(handle)
            .unwrap_or(self.config.local_max_mtu)
    }

    fn transition(&mut self, next: DriverState) {
        if self.state != next {
            debug!("driver {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Pick the resting state that matches the registry.
    fn settle(&mut self) {
        let next = if self.registry.first_where(is_linked).is_some() {
            DriverState::Connected
        } else if self
            .registry
            .first_in(PeripheralState::AwaitingConnected)
            .is_some()
        {
            DriverState::AwaitingConnection
        } else {
            DriverState::Idle
        };
        self.transition(next);
    }

    // ─── Event dispatch ────────────────────────────────────────────────────

    /// Dispatch one incoming packet, then run one driver step.
    ///
    /// A malformed packet is reported as [`Error::Decode`]; it changes no
    /// state, and the driver step still runs.
    pub fn handle_packet(&mut self, packet: Packet<'_>) -> Result<(), Error> {
        let result = self.dispatch(packet);
        self.run();
        result
    }

    fn dispatch(&mut self, packet: Packet<'_>) -> Result<(), Error> {
        match packet {
            Packet::Stack(state) => {
                self.on_stack_state(state);
                Ok(())
            }
            Packet::Hci(bytes) => {
                let event = HciEvent::parse(bytes).map_err(|e| {
                    warn!("dropping malformed HCI event: {}", e);
                    Error::from(e)
                })?;
                self.on_hci_event(event);
                Ok(())
            }
            Packet::Data {
                handle,
                channel_id,
                payload,
            } => {
                if channel_id != L2CAP_CID_ATT {
                    trace!("ignoring data on channel 0x{:04x}", channel_id);
                    return Ok(());
                }
                let pdu = AttPdu::parse(payload).map_err(|e| {
                    warn!("dropping malformed ATT PDU: {}", e);
                    Error::from(e)
                })?;
                self.on_att_pdu(handle, pdu);
                Ok(())
            }
        }
    }

    fn on_stack_state(&mut self, state: StackState) {
        match state {
            StackState::Working => {
                if self.state == DriverState::AwaitingStackReady {
                    info!("stack working");
                    self.transition(DriverState::Idle);
                }
            }
            StackState::Off | StackState::Halting => {
                if self.state == DriverState::AwaitingStackReady {
                    return;
                }
                warn!("stack stopped in {:?}, resetting", self.state);
                loop {
                    let Some(id) = self.registry.iter().next().map(|p| p.id()) else {
                        break;
                    };
                    let Some(peripheral) = self.registry.remove(id) else {
                        break;
                    };
                    self.notify(ConnectionEvent::DisconnectionComplete {
                        peripheral,
                        status: Status::TERMINATED_BY_LOCAL_HOST,
                        reason: Status::TERMINATED_BY_LOCAL_HOST,
                    });
                }
                self.transition(DriverState::AwaitingStackReady);
            }
            StackState::Initializing => {}
        }
    }

    fn on_hci_event(&mut self, event: HciEvent<'_>) {
        match event {
            HciEvent::CommandComplete { opcode, status, .. } => match opcode {
                opcode::LE_SET_SCAN_ENABLE => self.on_scan_enable_complete(status),
                opcode::LE_CREATE_CONNECTION_CANCEL if !status.is_success() => {
                    self.on_cancel_failed(status)
                }
                _ => {}
            },
            HciEvent::CommandStatus { opcode, status, .. } => {
                if !status.is_success() {
                    self.on_command_failed(opcode, status);
                }
            }
            HciEvent::LeAdvertisingReport(reports) => self.on_advertising_reports(reports),
            HciEvent::LeConnectionComplete(complete) => self.on_connection_complete(&complete),
            HciEvent::DisconnectionComplete {
                status,
                handle,
                reason,
            } => self.on_disconnection_complete(status, handle, reason),
            HciEvent::Unknown { code } => trace!("ignoring HCI event 0x{:02x}", code),
        }
    }

    fn on_scan_enable_complete(&mut self, status: Status) {
        match self.state {
            DriverState::AwaitingScanActive => {
                if status.is_success() {
                    info!("scan active");
                    self.transition(DriverState::ScanActive);
                } else {
                    warn!("scan enable failed: {}", status.0);
                    self.transition(DriverState::Idle);
                }
            }
            DriverState::AwaitingScanStopped => {
                if status.is_success() {
                    info!("scan stopped");
                    self.transition(DriverState::Idle);
                } else {
                    warn!("scan disable failed: {}", status.0);
                    self.transition(DriverState::ScanActive);
                }
            }
            _ => {}
        }
    }

    /// Command Status with a failure: the completion event will never come.
    fn on_command_failed(&mut self, opcode: u16, status: Status) {
        match opcode {
            opcode::LE_CREATE_CONNECTION => {
                if let Some(id) = self.first_id(PeripheralState::AwaitingConnected) {
                    warn!("create connection rejected: {}", status.0);
                    self.fail_connection(id, status);
                } else if let Some(id) = self.cancelling_id() {
                    warn!("create connection rejected while cancelling: {}", status.0);
                    self.finish_disconnect(id, status, status);
                }
            }
            opcode::DISCONNECT => {
                let awaiting = self.registry.first_where(|p| {
                    p.state() == PeripheralState::AwaitingDisconnected && p.handle().is_some()
                });
                if let Some(id) = awaiting.map(|p| p.id()) {
                    warn!("disconnect rejected: {}", status.0);
                    self.finish_disconnect(id, status, status);
                }
            }
            _ => {}
        }
    }

    /// Cancel refused: no connection attempt is pending at the controller.
    fn on_cancel_failed(&mut self, status: Status) {
        let awaiting = self.registry.first_where(|p| {
            p.state() == PeripheralState::AwaitingDisconnected && p.handle().is_none()
        });
        if let Some(id) = awaiting.map(|p| p.id()) {
            warn!("create connection cancel rejected: {}", status.0);
            self.finish_disconnect(id, status, status);
        }
    }

    fn on_advertising_reports(&mut self, reports: AdvertisingReports<'_>) {
        if self.state != DriverState::ScanActive {
            trace!("advertising report outside active scan ignored");
            return;
        }
        for report in reports {
            self.handler.on_advertisement(&report, &mut self.requests);
        }
    }

    fn on_connection_complete(&mut self, complete: &LeConnectionComplete) {
        let status = complete.status;

        if let Some(id) = self.first_id(PeripheralState::AwaitingConnected) {
            if !status.is_success() {
                warn!("connection failed: {}", status.0);
                self.fail_connection(id, status);
                return;
            }
            info!("connected: handle {}", complete.handle.raw());
            self.registry.bind_handle(id, complete.handle);
            self.registry
                .set_state(id, PeripheralState::WantsMtuExchange);
            self.transition(DriverState::Connected);
            return;
        }

        let Some(id) = self.cancelling_id() else {
            debug!("unsolicited connection complete ignored");
            return;
        };

        if status.is_success() {
            // Cancel lost the race; tear the new link down.
            debug!("connected while cancelling, disconnecting {}", complete.handle.raw());
            self.registry.bind_handle(id, complete.handle);
            self.registry.set_state(id, PeripheralState::WantsDisconnect);
            self.transition(DriverState::Disconnect);
        } else {
            self.finish_disconnect(id, status, status);
        }
    }

    fn on_disconnection_complete(
        &mut self,
        status: Status,
        handle: ConnectionHandle,
        reason: Status,
    ) {
        let Some(id) = self.registry.find_by_handle(handle).map(|p| p.id()) else {
            trace!("disconnection for unknown handle {}", handle.raw());
            return;
        };
        self.finish_disconnect(id, status, reason);
    }

    fn on_att_pdu(&mut self, handle: ConnectionHandle, pdu: AttPdu) {
        let AttPdu::ExchangeMtuResponse { server_rx_mtu } = pdu else {
            return;
        };
        let Some(p) = self.registry.find_by_handle(handle) else {
            return;
        };
        if p.state() != PeripheralState::AwaitingMtu {
            debug!("unexpected MTU response on {}", handle.raw());
            return;
        }
        let id = p.id();

        let mtu = att::negotiated_mtu(server_rx_mtu, self.local_mtu(handle));
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };
        record.mtu = mtu;
        record.state = PeripheralState::Ready;
        let peripheral = *record;

        info!("MTU negotiated on {}: {}", handle.raw(), mtu);
        self.notify(ConnectionEvent::ConnectionComplete {
            peripheral,
            status: Status::SUCCESS,
        });
    }

    // ─── Helpers ───────────────────────────────────────────────────────────

    fn first_id(&self, state: PeripheralState) -> Option<PeripheralId> {
        self.registry.first_in(state).map(|p| p.id())
    }

    /// Cancel pending on a link that had no handle yet.
    fn cancelling_id(&self) -> Option<PeripheralId> {
        self.registry
            .first_where(|p| {
                matches!(
                    p.state(),
                    PeripheralState::WantsDisconnect | PeripheralState::AwaitingDisconnected
                ) && p.handle().is_none()
            })
            .map(|p| p.id())
    }

    fn fail_connection(&mut self, id: PeripheralId, status: Status) {
        let Some(peripheral) = self.registry.remove(id) else {
            return;
        };
        self.settle();
        self.notify(ConnectionEvent::ConnectionComplete { peripheral, status });
    }

    fn finish_disconnect(&mut self, id: PeripheralId, status: Status, reason: Status) {
        let Some(peripheral) = self.registry.remove(id) else {
            return;
        };
        info!("disconnected: status {} reason {}", status.0, reason.0);
        self.settle();
        self.notify(ConnectionEvent::DisconnectionComplete {
            peripheral,
            status,
            reason,
        });
    }

    fn notify(&mut self, event: ConnectionEvent) {
        self.handler.on_connection_event(&event, &mut self.requests);
    }
}

/// Record holds an established link.
fn is_linked(p: &Peripheral) -> bool {
    p.handle().is_some()
        && matches!(
            p.state(),
            PeripheralState::WantsMtuExchange | PeripheralState::AwaitingMtu | PeripheralState::Ready
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::hci::event_code;
    use heapless::Vec;

    #[derive(Default)]
    struct Recorder {
        commands: Vec<Command, 16>,
        data: Vec<(ConnectionHandle, u16, [u8; 3]), 4>,
        command_busy: bool,
        data_busy: bool,
    }

    impl Transport for Recorder {
        fn can_send_command(&self) -> bool {
            !self.command_busy
        }

        fn can_send_data(&self) -> bool {
            !self.data_busy
        }

        fn send_command(&mut self, command: &Command) {
            self.commands.push(*command).unwrap();
        }

        fn send_data(&mut self, handle: ConnectionHandle, channel_id: u16, payload: &[u8]) {
            let mut pdu = [0u8; 3];
            pdu.copy_from_slice(payload);
            self.data.push((handle, channel_id, pdu)).unwrap();
        }
    }

    fn ready() -> Central<Recorder, ()> {
        let mut central = Central::new(Recorder::default(), (), ClientConfig::default());
        central.handle_packet(Packet::Stack(StackState::Working)).unwrap();
        central
    }

    fn scan_enable_complete() -> [u8; 6] {
        [event_code::COMMAND_COMPLETE, 4, 1, 0x0C, 0x20, 0x00]
    }

    const PEER: BdAddr = BdAddr::new([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x01]);

    #[test]
    fn starts_waiting_for_stack() {
        let central = Central::new(Recorder::default(), (), ClientConfig::default());
        assert_eq!(central.state(), DriverState::AwaitingStackReady);
        assert_eq!(ready().state(), DriverState::Idle);
    }

    #[test]
    fn scan_start_and_stop() {
        let mut central = ready();
        central.start_scan();
        assert_eq!(central.state(), DriverState::AwaitingScanActive);
        assert_eq!(
            central.transport().commands[0],
            Command::LeSetScanEnable {
                enable: true,
                filter_duplicates: false
            }
        );

        central.handle_packet(Packet::Hci(&scan_enable_complete())).unwrap();
        assert_eq!(central.state(), DriverState::ScanActive);

        central.stop_scan();
        assert_eq!(central.state(), DriverState::AwaitingScanStopped);
        central.handle_packet(Packet::Hci(&scan_enable_complete())).unwrap();
        assert_eq!(central.state(), DriverState::Idle);
        assert_eq!(central.transport().commands.len(), 2);
    }

    #[test]
    fn start_scan_outside_idle_is_ignored() {
        let mut central = Central::new(Recorder::default(), (), ClientConfig::default());
        central.start_scan();
        assert_eq!(central.state(), DriverState::AwaitingStackReady);
        assert!(central.transport().commands.is_empty());
    }

    #[test]
    fn busy_command_gate_defers_step() {
        let mut central = ready();
        central.transport_mut().command_busy = true;
        central.start_scan();
        assert_eq!(central.state(), DriverState::StartScan);
        assert!(central.transport().commands.is_empty());

        central.transport_mut().command_busy = false;
        central.run();
        assert_eq!(central.state(), DriverState::AwaitingScanActive);
    }

    #[test]
    fn busy_data_gate_also_defers_commands() {
        let mut central = ready();
        central.transport_mut().data_busy = true;
        central.start_scan();
        assert!(central.transport().commands.is_empty());
    }

    #[test]
    fn failed_scan_enable_returns_to_idle() {
        let mut central = ready();
        central.start_scan();
        let failed = [event_code::COMMAND_COMPLETE, 4, 1, 0x0C, 0x20, 0x0C];
        central.handle_packet(Packet::Hci(&failed)).unwrap();
        assert_eq!(central.state(), DriverState::Idle);
    }

    #[test]
    fn connect_issues_create_connection() {
        let mut central = ready();
        let id = central.connect(PEER, AddressType::Random).unwrap();
        assert_eq!(central.state(), DriverState::AwaitingConnection);
        assert_eq!(
            central.peripheral(id).unwrap().state(),
            PeripheralState::AwaitingConnected
        );
        match central.transport().commands[0] {
            Command::LeCreateConnection {
                peer_address,
                peer_address_type,
                ..
            } => {
                assert_eq!(peer_address, PEER);
                assert_eq!(peer_address_type, AddressType::Random);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn connect_same_address_twice_returns_same_record() {
        let mut central = ready();
        let a = central.connect(PEER, AddressType::Public).unwrap();
        let b = central.connect(PEER, AddressType::Public).unwrap();
        assert_eq!(a, b);
        assert_eq!(central.peripherals().count(), 1);
        assert_eq!(central.transport().commands.len(), 1);
    }

    #[test]
    fn cancel_before_send_touches_nothing() {
        let mut central = ready();
        central.transport_mut().command_busy = true;
        let id = central.connect(PEER, AddressType::Public).unwrap();
        central.cancel_connect(id);
        assert!(!central.is_registered(id));
        assert_eq!(central.state(), DriverState::Idle);

        central.transport_mut().command_busy = false;
        central.run();
        assert!(central.transport().commands.is_empty());
    }

    #[test]
    fn malformed_packet_still_runs_step() {
        let mut central = ready();
        central.transport_mut().command_busy = true;
        central.start_scan();
        central.transport_mut().command_busy = false;

        let err = central.handle_packet(Packet::Hci(&[0x0E])).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(central.state(), DriverState::AwaitingScanActive);
    }

    #[test]
    fn register_event_handler_replaces_previous() {
        let mut central: Central<Recorder, Option<()>> =
            Central::new(Recorder::default(), Some(()), ClientConfig::default());
        let previous = central.register_event_handler(None);
        assert_eq!(previous, Some(()));
        assert!(central.handler().is_none());
    }

    #[test]
    fn initialize_clears_everything() {
        let mut central = ready();
        central.connect(PEER, AddressType::Public).unwrap();
        central.initialize();
        assert_eq!(central.state(), DriverState::AwaitingStackReady);
        assert_eq!(central.peripherals().count(), 0);
    }
}
