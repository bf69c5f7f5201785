use crate::config::LineConfig;
use crate::error::ParseRejected;
use crate::gate::GateState;
use crate::line::HardwareLine;
use crate::observer::{RejectCounter, RejectObserver};

/// Consumer of received bytes, usually the protocol engine's byte parser.
pub trait ReceiveHandler {
    fn handle_byte(&mut self, byte: u8) -> Result<(), ParseRejected>;
}

impl<F> ReceiveHandler for F
where
    F: FnMut(u8) -> Result<(), ParseRejected>,
{
    fn handle_byte(&mut self, byte: u8) -> Result<(), ParseRejected> {
        self(byte)
    }
}

/// Producer of bytes to send. `None` ends the current transmit burst.
pub trait TransmitSource {
    fn next_byte(&mut self) -> Option<u8>;
}

impl<F> TransmitSource for F
where
    F: FnMut() -> Option<u8>,
{
    fn next_byte(&mut self) -> Option<u8> {
        self()
    }
}

type BoxedReceive = Box<dyn ReceiveHandler + Send>;
type BoxedTransmit = Box<dyn TransmitSource + Send>;
type BoxedObserver = Box<dyn RejectObserver + Send + Sync>;

/// Callback registry for one serial line.
///
/// Callbacks can only be installed here, before [`init`](Self::init) arms
/// the line, so the dispatcher never runs against a half-built registry.
pub struct Transport<L> {
    line: L,
    receive: Option<BoxedReceive>,
    transmit: Option<BoxedTransmit>,
    observer: BoxedObserver,
}

impl<L> Transport<L>
where
    L: HardwareLine + Clone,
{
    pub fn new(line: L) -> Self {
        Self {
            line,
            receive: None,
            transmit: None,
            observer: Box::new(RejectCounter::new()),
        }
    }

    pub fn on_receive<H>(mut self, handler: H) -> Self
    where
        H: ReceiveHandler + Send + 'static,
    {
        self.receive = Some(Box::new(handler));
        self
    }

    pub fn on_transmit<S>(mut self, source: S) -> Self
    where
        S: TransmitSource + Send + 'static,
    {
        self.transmit = Some(Box::new(source));
        self
    }

    /// Replaces the default [`RejectCounter`].
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: RejectObserver + Send + Sync + 'static,
    {
        self.observer = Box::new(observer);
        self
    }

    /// Configures the line for the governor framing, arms the receive
    /// interrupt, leaves the transmit interrupt off and enables the
    /// peripheral last.
    ///
    /// The returned [`Dispatcher`] belongs in the interrupt vector; the
    /// [`SendControl`] goes to the protocol layer.
    pub fn init(self) -> (Dispatcher<L>, SendControl<L>) {
        let config = LineConfig::GOVERNOR;
        self.line.configure(&config);
        self.line.set_transmit_interrupt(false);
        self.line.set_receive_interrupt(true);
        self.line.enable();

        log::info!(
            "serial transport up at {config} (rx handler: {}, tx source: {})",
            self.receive.is_some(),
            self.transmit.is_some()
        );

        let control = SendControl {
            line: self.line.clone(),
            source_installed: self.transmit.is_some(),
        };
        let dispatcher = Dispatcher {
            line: self.line,
            receive: self.receive,
            transmit: self.transmit,
            observer: self.observer,
        };
        (dispatcher, control)
    }
}

/// What one dispatcher invocation did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Byte read from the receive holding register.
    pub received: Option<u8>,
    /// Set when the receive handler refused `received`.
    pub rejected: Option<ParseRejected>,
    /// Byte written to the transmit holding register.
    pub transmitted: Option<u8>,
    /// The transmit path went back to idle during this invocation.
    pub gate_closed: bool,
}

impl Dispatch {
    pub fn is_empty(&self) -> bool {
        self.received.is_none() && self.transmitted.is_none() && !self.gate_closed
    }
}

/// Interrupt entry point of an armed transport.
///
/// [`dispatch`](Self::dispatch) must run once per interrupt and must not be
/// re-entered. It handles each asserted condition at most once and never
/// blocks.
pub struct Dispatcher<L> {
    line: L,
    receive: Option<BoxedReceive>,
    transmit: Option<BoxedTransmit>,
    observer: BoxedObserver,
}

impl<L: HardwareLine> Dispatcher<L> {
    pub fn dispatch(&mut self) -> Dispatch {
        let mut outcome = Dispatch::default();

        if self.line.receive_ready() {
            // Always read: it clears the condition even with no handler.
            let byte = self.line.read_byte();
            outcome.received = Some(byte);
            match self.receive.as_mut() {
                Some(handler) => {
                    log::trace!("rx 0x{byte:02x}");
                    if let Err(rejected) = handler.handle_byte(byte) {
                        self.observer.parse_rejected(byte, rejected);
                        outcome.rejected = Some(rejected);
                    }
                }
                None => log::trace!("rx 0x{byte:02x} dropped, no handler"),
            }
        }

        if self.line.transmit_interrupt_enabled() && self.line.transmit_ready() {
            match self.transmit.as_mut().and_then(|source| source.next_byte()) {
                Some(byte) => {
                    log::trace!("tx 0x{byte:02x}");
                    self.line.write_byte(byte);
                    outcome.transmitted = Some(byte);
                }
                None => {
                    self.line.set_transmit_interrupt(false);
                    outcome.gate_closed = true;
                    log::debug!("transmit gate closed, source exhausted");
                }
            }
        }

        outcome
    }

    /// Whether the line asserts a condition whose interrupt is enabled, i.e.
    /// whether the hardware would enter the dispatcher now.
    pub fn interrupt_pending(&self) -> bool {
        (self.line.receive_interrupt_enabled() && self.line.receive_ready())
            || (self.line.transmit_interrupt_enabled() && self.line.transmit_ready())
    }

    pub fn gate(&self) -> GateState {
        gate_state(&self.line)
    }

    pub fn line(&self) -> &L {
        &self.line
    }
}

/// Handle the protocol layer uses to start and stop transmission.
///
/// Cheap to clone and usable from either execution context: both operations
/// are a single write of the transmit-interrupt enable bit.
#[derive(Clone)]
pub struct SendControl<L> {
    line: L,
    source_installed: bool,
}

impl<L: HardwareLine> SendControl<L> {
    /// Moves the transmit path to `Active`. Without a transmit source the
    /// gate stays `Idle`.
    pub fn enable_send(&self) -> GateState {
        if !self.source_installed {
            log::debug!("enable_send ignored, no transmit source installed");
            return GateState::Idle;
        }
        if !self.line.transmit_interrupt_enabled() {
            log::debug!("transmit gate opened");
        }
        self.line.set_transmit_interrupt(true);
        GateState::Active
    }

    pub fn disable_send(&self) -> GateState {
        if self.line.transmit_interrupt_enabled() {
            log::debug!("transmit gate closed by protocol layer");
        }
        self.line.set_transmit_interrupt(false);
        GateState::Idle
    }

    pub fn gate(&self) -> GateState {
        gate_state(&self.line)
    }
}

fn gate_state<L: HardwareLine>(line: &L) -> GateState {
    if line.transmit_interrupt_enabled() {
        GateState::Active
    } else {
        GateState::Idle
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::SimLine;

    fn reject(code: u8) -> ParseRejected {
        ParseRejected::from_status(code).unwrap()
    }

    #[test]
    fn init_arms_receive_only() {
        let line = Arc::new(SimLine::new());
        let (dispatcher, control) = Transport::new(line.clone())
            .on_transmit(|| -> Option<u8> { None })
            .init();

        assert_eq!(line.config(), Some(LineConfig::GOVERNOR));
        assert!(line.is_enabled());
        assert!(line.receive_interrupt_enabled());
        assert_eq!(control.gate(), GateState::Idle);
        assert_eq!(dispatcher.gate(), GateState::Idle);
        assert!(!dispatcher.interrupt_pending());
    }

    #[test]
    fn unhandled_byte_is_read_and_dropped() {
        let line = Arc::new(SimLine::new());
        let (mut dispatcher, _control) = Transport::new(line.clone()).init();

        line.inject(0x55);
        assert!(dispatcher.interrupt_pending());
        let outcome = dispatcher.dispatch();

        assert_eq!(outcome.received, Some(0x55));
        assert!(!line.receive_ready());
        assert!(!dispatcher.interrupt_pending());
    }

    #[test]
    fn rejection_reaches_observer_and_transport_keeps_going() {
        let line = Arc::new(SimLine::new());
        let counter = Arc::new(RejectCounter::new());
        let (mut dispatcher, _control) = Transport::new(line.clone())
            .on_receive(|byte: u8| -> Result<(), ParseRejected> {
                if byte == 0xff {
                    Err(reject(4))
                } else {
                    Ok(())
                }
            })
            .observer(counter.clone())
            .init();

        line.inject(0xff);
        let outcome = dispatcher.dispatch();
        assert_eq!(outcome.rejected, Some(reject(4)));

        line.inject(0x01);
        let outcome = dispatcher.dispatch();
        assert_eq!(outcome.received, Some(0x01));
        assert_eq!(outcome.rejected, None);

        assert_eq!(counter.count(), 1);
        assert_eq!(counter.last(), Some((0xff, reject(4))));
    }

    #[test]
    fn closure_observer_sees_rejections() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let line = Arc::new(SimLine::new());
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        let (mut dispatcher, _control) = Transport::new(line.clone())
            .on_receive(|_: u8| -> Result<(), ParseRejected> { Err(reject(2)) })
            .observer(move |byte: u8, rejected: ParseRejected| {
                assert_eq!((byte, rejected.code()), (0x3c, 2));
                h.fetch_add(1, Ordering::Relaxed);
            })
            .init();

        line.inject(0x3c);
        dispatcher.dispatch();
        line.inject(0x3c);
        dispatcher.dispatch();

        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn enable_send_without_source_is_refused() {
        let line = Arc::new(SimLine::new());
        let (_dispatcher, control) = Transport::new(line.clone()).init();

        assert_eq!(control.enable_send(), GateState::Idle);
        assert!(!line.transmit_interrupt_enabled());
    }

    #[test]
    fn both_conditions_handled_in_one_invocation() {
        let line = Arc::new(SimLine::new());
        let mut queue = vec![0x10u8].into_iter();
        let (mut dispatcher, control) = Transport::new(line.clone())
            .on_receive(|_: u8| -> Result<(), ParseRejected> { Ok(()) })
            .on_transmit(move || queue.next())
            .init();

        control.enable_send();
        line.inject(0x20);
        let outcome = dispatcher.dispatch();

        assert_eq!(outcome.received, Some(0x20));
        assert_eq!(outcome.transmitted, Some(0x10));
        assert_eq!(line.written(), vec![0x10]);
    }

    #[test]
    fn stalled_transmitter_is_not_fed() {
        let line = Arc::new(SimLine::new());
        let (mut dispatcher, control) = Transport::new(line.clone())
            .on_transmit(|| -> Option<u8> { Some(0x33) })
            .init();

        line.set_transmit_ready(false);
        control.enable_send();
        assert!(dispatcher.dispatch().is_empty());
        assert!(line.written().is_empty());
        assert_eq!(control.gate(), GateState::Active);
    }
}
