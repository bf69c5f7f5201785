//! In-memory serial peripheral.
//!
//! Behaves like a UART with one holding register per direction. A test or a
//! host runner plays the wire with [`SimLine::inject`] and
//! [`SimLine::take_written`] and plays the interrupt controller by calling
//! the dispatcher while [`Dispatcher::interrupt_pending`](crate::Dispatcher::interrupt_pending)
//! holds.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::config::LineConfig;
use crate::gate::TransmitGate;
use crate::line::HardwareLine;

#[derive(Debug, Default)]
struct Registers {
    config: Option<LineConfig>,
    rx_holding: Option<u8>,
    written: Vec<u8>,
}

#[derive(Debug)]
pub struct SimLine {
    regs: Mutex<Registers>,
    enabled: AtomicBool,
    rx_interrupt: AtomicBool,
    tx_interrupt: TransmitGate,
    tx_ready: AtomicBool,
    overruns: AtomicU32,
}

impl SimLine {
    pub fn new() -> Self {
        Self {
            regs: Mutex::new(Registers::default()),
            enabled: AtomicBool::new(false),
            rx_interrupt: AtomicBool::new(false),
            tx_interrupt: TransmitGate::new(),
            tx_ready: AtomicBool::new(true),
            overruns: AtomicU32::new(0),
        }
    }

    /// A byte arrives from the wire. If the previous byte was never read it
    /// is lost and counted as an overrun. Ignored while the line is disabled.
    pub fn inject(&self, byte: u8) {
        if !self.is_enabled() {
            log::trace!("sim line disabled, dropping 0x{byte:02x}");
            return;
        }
        let mut regs = self.regs.lock();
        if regs.rx_holding.replace(byte).is_some() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Whether the receive holding register is free for the next byte.
    pub fn can_accept(&self) -> bool {
        self.regs.lock().rx_holding.is_none()
    }

    /// Everything written to the wire so far.
    pub fn written(&self) -> Vec<u8> {
        self.regs.lock().written.clone()
    }

    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.regs.lock().written)
    }

    /// Holds the transmitter busy (`false`) or lets it drain (`true`).
    pub fn set_transmit_ready(&self, ready: bool) {
        self.tx_ready.store(ready, Ordering::Release);
    }

    pub fn config(&self) -> Option<LineConfig> {
        self.regs.lock().config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl Default for SimLine {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareLine for SimLine {
    fn configure(&self, config: &LineConfig) {
        self.regs.lock().config = Some(*config);
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    fn set_receive_interrupt(&self, enabled: bool) {
        self.rx_interrupt.store(enabled, Ordering::Release);
    }

    fn receive_interrupt_enabled(&self) -> bool {
        self.rx_interrupt.load(Ordering::Acquire)
    }

    fn set_transmit_interrupt(&self, enabled: bool) {
        self.tx_interrupt.set(enabled);
    }

    fn transmit_interrupt_enabled(&self) -> bool {
        self.tx_interrupt.is_open()
    }

    fn receive_ready(&self) -> bool {
        self.regs.lock().rx_holding.is_some()
    }

    fn transmit_ready(&self) -> bool {
        self.is_enabled() && self.tx_ready.load(Ordering::Acquire)
    }

    fn read_byte(&self) -> u8 {
        // An empty data register reads as zero.
        self.regs.lock().rx_holding.take().unwrap_or(0)
    }

    fn write_byte(&self, byte: u8) {
        self.regs.lock().written.push(byte);
    }
}
