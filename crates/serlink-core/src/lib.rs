//! Interrupt-driven byte transport for one duplex serial line.
//!
//! The transport sits between a [`HardwareLine`] and a protocol engine. The
//! engine is reached only through two callbacks: a [`ReceiveHandler`] that
//! gets every received byte and a [`TransmitSource`] that is asked for the
//! next byte to send. [`Transport::init`] arms the line and splits into a
//! [`Dispatcher`], to be called from the interrupt vector, and a
//! [`SendControl`] the protocol layer uses to open and close the transmit
//! gate. [`DeferredEvent`] moves work out of interrupt context.

pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod host_line;
pub mod line;
pub mod observer;
pub mod sim;
pub mod transport;

pub use config::{DataBits, FlowControl, LineConfig, Parity, StopBits};
pub use error::{LineError, ParseRejected};
pub use event::DeferredEvent;
pub use gate::{GateState, TransmitGate};
pub use host_line::HostLine;
pub use line::HardwareLine;
pub use observer::{RejectCounter, RejectObserver};
pub use sim::SimLine;
pub use transport::{Dispatch, Dispatcher, ReceiveHandler, SendControl, TransmitSource, Transport};
