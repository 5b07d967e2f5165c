//! Notification sink - where the central delivers its events.
//!
//! Handlers run synchronously inside dispatch, so they cannot touch the
//! central directly. Instead they push [`Request`]s into the [`Requests`]
//! queue they are handed; the central applies those at the start of its
//! next driver step.

use crate::ble::adv_report::AdvertisingReport;
use crate::ble::registry::PeripheralId;
use crate::ble::{AddressType, Advertisement, BdAddr, ConnectionEvent, Event};
use crate::config::MAX_DEFERRED_REQUESTS;
use crate::error::Error;
use heapless::Deque;

/// Client calls a handler may defer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    StartScan,
    StopScan,
    Connect {
        address: BdAddr,
        address_type: AddressType,
    },
    CancelConnect(PeripheralId),
}

/// Requests queued during dispatch.
#[derive(Default)]
pub struct Requests {
    queue: Deque<Request, MAX_DEFERRED_REQUESTS>,
}

impl Requests {
    pub const fn new() -> Self {
        Self { queue: Deque::new() }
    }

    pub fn push(&mut self, request: Request) -> Result<(), Error> {
        self.queue.push_back(request).map_err(|_| {
            warn!("deferred request queue full - dropping request");
            Error::RequestQueueFull
        })
    }

    pub fn start_scan(&mut self) -> Result<(), Error> {
        self.push(Request::StartScan)
    }

    pub fn stop_scan(&mut self) -> Result<(), Error> {
        self.push(Request::StopScan)
    }

    /// The record id is assigned when the request is applied and shows
    /// up in the resulting connection event.
    pub fn connect(&mut self, address: BdAddr, address_type: AddressType) -> Result<(), Error> {
        self.push(Request::Connect {
            address,
            address_type,
        })
    }

    pub fn cancel_connect(&mut self, id: PeripheralId) -> Result<(), Error> {
        self.push(Request::CancelConnect(id))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<Request> {
        self.queue.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}

/// Receives the central's events. Both methods default to doing nothing.
pub trait EventHandler {
    /// One call per advertising report, in the order they were packed.
    fn on_advertisement(&mut self, _report: &AdvertisingReport<'_>, _requests: &mut Requests) {}

    fn on_connection_event(&mut self, _event: &ConnectionEvent, _requests: &mut Requests) {}
}

/// The no-op handler.
impl EventHandler for () {}

/// `None` behaves like the no-op handler.
impl<H: EventHandler> EventHandler for Option<H> {
    fn on_advertisement(&mut self, report: &AdvertisingReport<'_>, requests: &mut Requests) {
        if let Some(h) = self {
            h.on_advertisement(report, requests);
        }
    }

    fn on_connection_event(&mut self, event: &ConnectionEvent, requests: &mut Requests) {
        if let Some(h) = self {
            h.on_connection_event(event, requests);
        }
    }
}

impl<H: EventHandler + ?Sized> EventHandler for &mut H {
    fn on_advertisement(&mut self, report: &AdvertisingReport<'_>, requests: &mut Requests) {
        (**self).on_advertisement(report, requests);
    }

    fn on_connection_event(&mut self, event: &ConnectionEvent, requests: &mut Requests) {
        (**self).on_connection_event(event, requests);
    }
}

/// Buffers owned events for the caller's own loop to drain.
///
/// When full, new events are dropped with a warning.
pub struct EventQueue<const N: usize> {
    events: Deque<Event, N>,
    dropped: usize,
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events lost because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn push(&mut self, event: Event) {
        if self.events.push_back(event).is_err() {
            self.dropped += 1;
            warn!("event queue full - dropping event");
        }
    }
}

impl<const N: usize> EventHandler for EventQueue<N> {
    fn on_advertisement(&mut self, report: &AdvertisingReport<'_>, _requests: &mut Requests) {
        self.push(Event::Advertisement(Advertisement::from(report)));
    }

    fn on_connection_event(&mut self, event: &ConnectionEvent, _requests: &mut Requests) {
        self.push(Event::Connection(*event));
    }
}

#[cfg(feature = "embassy")]
pub use channel::ChannelHandler;

#[cfg(feature = "embassy")]
mod channel {
    use super::{EventHandler, Requests};
    use crate::ble::adv_report::AdvertisingReport;
    use crate::ble::{Advertisement, ConnectionEvent, Event};
    use embassy_sync::blocking_mutex::raw::RawMutex;
    use embassy_sync::channel::Sender;

    /// Forwards events into an Embassy channel.
    ///
    /// `try_send` never blocks the dispatch path; if the consumer is
    /// behind, the event is dropped.
    pub struct ChannelHandler<'ch, M: RawMutex, const N: usize> {
        tx: Sender<'ch, M, Event, N>,
    }

    impl<'ch, M: RawMutex, const N: usize> ChannelHandler<'ch, M, N> {
        pub fn new(tx: Sender<'ch, M, Event, N>) -> Self {
            Self { tx }
        }

        fn send(&self, event: Event) {
            if self.tx.try_send(event).is_err() {
                warn!("event channel full - dropping event");
            }
        }
    }

    impl<M: RawMutex, const N: usize> EventHandler for ChannelHandler<'_, M, N> {
        fn on_advertisement(&mut self, report: &AdvertisingReport<'_>, _requests: &mut Requests) {
            self.send(Event::Advertisement(Advertisement::from(report)));
        }

        fn on_connection_event(&mut self, event: &ConnectionEvent, _requests: &mut Requests) {
            self.send(Event::Connection(*event));
        }
    }
}
