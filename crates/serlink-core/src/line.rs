use std::sync::Arc;

use crate::config::LineConfig;

/// Byte-level view of one duplex serial peripheral.
///
/// The peripheral holds at most one byte per direction. Reading the receive
/// holding register clears "receive ready" and writing the transmit holding
/// register clears "transmit ready"; a dispatcher that skips the read or
/// write on an asserted condition gets re-entered straight away.
///
/// All methods take `&self`: the line is shared between the interrupt
/// dispatcher and the mainline [`SendControl`](crate::SendControl), the way
/// memory-mapped registers are. Implementations must make
/// `set_transmit_interrupt` a single atomic read/modify/write (see
/// [`TransmitGate`](crate::TransmitGate)) or wrap it in a critical section.
pub trait HardwareLine {
    /// Applies framing. Called once, before `enable`.
    fn configure(&self, config: &LineConfig);

    /// Turns on the receiver and transmitter.
    fn enable(&self);

    fn set_receive_interrupt(&self, enabled: bool);

    fn receive_interrupt_enabled(&self) -> bool;

    fn set_transmit_interrupt(&self, enabled: bool);

    fn transmit_interrupt_enabled(&self) -> bool;

    fn receive_ready(&self) -> bool;

    fn transmit_ready(&self) -> bool;

    /// Precondition: `receive_ready()` was observed.
    fn read_byte(&self) -> u8;

    /// Precondition: `transmit_ready()` was observed.
    fn write_byte(&self, byte: u8);
}

macro_rules! forward_line {
    ($($ty:ty),*) => {$(
        impl<T: HardwareLine + ?Sized> HardwareLine for $ty {
            fn configure(&self, config: &LineConfig) {
                (**self).configure(config)
            }

            fn enable(&self) {
                (**self).enable()
            }

            fn set_receive_interrupt(&self, enabled: bool) {
                (**self).set_receive_interrupt(enabled)
            }

            fn receive_interrupt_enabled(&self) -> bool {
                (**self).receive_interrupt_enabled()
            }

            fn set_transmit_interrupt(&self, enabled: bool) {
                (**self).set_transmit_interrupt(enabled)
            }

            fn transmit_interrupt_enabled(&self) -> bool {
                (**self).transmit_interrupt_enabled()
            }

            fn receive_ready(&self) -> bool {
                (**self).receive_ready()
            }

            fn transmit_ready(&self) -> bool {
                (**self).transmit_ready()
            }

            fn read_byte(&self) -> u8 {
                (**self).read_byte()
            }

            fn write_byte(&self, byte: u8) {
                (**self).write_byte(byte)
            }
        }
    )*};
}

forward_line!(&T, Arc<T>);
