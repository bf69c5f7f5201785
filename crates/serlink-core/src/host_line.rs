//! [`HardwareLine`] over a host serial port.
//!
//! A reader thread owns a clone of the port and forwards whatever arrives
//! through a channel. The mainline calls [`HostLine::poll_wire`] to move the
//! next byte into the receive holding register, then runs the dispatcher
//! while an interrupt is pending. The reader thread is only the wire; it
//! never touches the dispatcher.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serialport::SerialPort;

use crate::config::LineConfig;
use crate::error::LineError;
use crate::gate::TransmitGate;
use crate::line::HardwareLine;

enum WireEvent {
    Rx(Vec<u8>),
    Error(String),
    Closed,
}

enum Command {
    Close,
}

#[derive(Default)]
struct Registers {
    rx_holding: Option<u8>,
    backlog: VecDeque<u8>,
    fault: Option<LineError>,
    closed: bool,
}

pub struct HostLine {
    port_name: String,
    port: Mutex<Box<dyn SerialPort>>,
    regs: Mutex<Registers>,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<WireEvent>,
    enabled: AtomicBool,
    rx_interrupt: AtomicBool,
    tx_interrupt: TransmitGate,
}

impl HostLine {
    pub fn available_ports() -> Vec<String> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(|info| info.port_name)
            .collect()
    }

    pub fn open(port_name: &str, config: &LineConfig) -> Result<Self, LineError> {
        let data_bits = serialport::DataBits::try_from(config.data_bits)?;
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(data_bits)
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .flow_control(config.flow_control.into())
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|source| LineError::Open {
                port: port_name.to_string(),
                source,
            })?;
        let line = Self::from_port(port_name, port)?;
        log::info!("opened {port_name} at {config}");
        Ok(line)
    }

    /// Wraps a port that is already open and configured. Reads use the
    /// port's own timeout to notice [`close`](Self::close).
    pub fn from_port(port_name: &str, port: Box<dyn SerialPort>) -> Result<Self, LineError> {
        let reader = port.try_clone().map_err(|source| LineError::Open {
            port: port_name.to_string(),
            source,
        })?;

        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<WireEvent>();
        std::thread::spawn(move || read_wire(reader, rx_cmd, tx_evt));

        Ok(Self {
            port_name: port_name.to_string(),
            port: Mutex::new(port),
            regs: Mutex::new(Registers::default()),
            tx_cmd,
            rx_evt,
            enabled: AtomicBool::new(false),
            rx_interrupt: AtomicBool::new(false),
            tx_interrupt: TransmitGate::new(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Collects bytes from the reader thread and latches the next one into
    /// the receive holding register if it is free. Returns how many bytes
    /// are still waiting on the wire.
    pub fn poll_wire(&self) -> Result<usize, LineError> {
        let mut regs = self.regs.lock();
        while let Ok(event) = self.rx_evt.try_recv() {
            match event {
                WireEvent::Rx(data) => regs.backlog.extend(data),
                WireEvent::Error(e) => {
                    log::error!("{}: {e}", self.port_name);
                    regs.fault = Some(LineError::Io(std::io::Error::other(e)));
                }
                WireEvent::Closed => regs.closed = true,
            }
        }
        if let Some(fault) = regs.fault.take() {
            return Err(fault);
        }
        if regs.closed && regs.backlog.is_empty() && regs.rx_holding.is_none() {
            return Err(LineError::Disconnected);
        }
        if self.enabled.load(Ordering::Acquire) && regs.rx_holding.is_none() {
            regs.rx_holding = regs.backlog.pop_front();
        }
        Ok(regs.backlog.len())
    }

    pub fn close(&self) {
        let _ = self.tx_cmd.send(Command::Close);
        self.enabled.store(false, Ordering::Release);
        log::info!("closed {}", self.port_name);
    }
}

impl Drop for HostLine {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(Command::Close);
    }
}

fn read_wire(mut port: Box<dyn SerialPort>, rx_cmd: Receiver<Command>, tx_evt: Sender<WireEvent>) {
    let mut buf = [0u8; 256];
    loop {
        match port.read(&mut buf) {
            Ok(n) if n > 0 => {
                if tx_evt.send(WireEvent::Rx(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                let _ = tx_evt.send(WireEvent::Error(e.to_string()));
                let _ = tx_evt.send(WireEvent::Closed);
                return;
            }
        }
        if let Ok(Command::Close) = rx_cmd.try_recv() {
            let _ = tx_evt.send(WireEvent::Closed);
            return;
        }
    }
}

fn apply_config(port: &mut dyn SerialPort, config: &LineConfig) -> serialport::Result<()> {
    port.set_baud_rate(config.baud_rate)?;
    let data_bits = serialport::DataBits::try_from(config.data_bits)
        .map_err(|e| serialport::Error::new(serialport::ErrorKind::InvalidInput, e.to_string()))?;
    port.set_data_bits(data_bits)?;
    port.set_parity(config.parity.into())?;
    port.set_stop_bits(config.stop_bits.into())?;
    port.set_flow_control(config.flow_control.into())?;
    Ok(())
}

impl HardwareLine for HostLine {
    fn configure(&self, config: &LineConfig) {
        if let Err(e) = apply_config(self.port.lock().as_mut(), config) {
            log::error!("{}: cannot apply {config}: {e}", self.port_name);
        }
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
        // The OS driver buffers writes, so the holding register is always free.
        self.enabled.load(Ordering::Acquire)
    }

    fn read_byte(&self) -> u8 {
        self.regs.lock().rx_holding.take().unwrap_or(0)
    }

    fn write_byte(&self, byte: u8) {
        if let Err(e) = self.port.lock().write_all(&[byte]) {
            log::error!("{}: write failed: {e}", self.port_name);
            self.regs.lock().fault = Some(LineError::Io(e));
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use serialport::TTYPort;

    use super::*;
    use crate::config::DataBits;
    use crate::error::ParseRejected;
    use crate::gate::GateState;
    use crate::transport::Transport;

    const WAIT: Duration = Duration::from_secs(2);

    /// Line on one end of a pseudo terminal, the other end playing the wire.
    fn pty_line() -> (TTYPort, HostLine) {
        let (peer, port) = TTYPort::pair().unwrap();
        let line = HostLine::from_port("pty", Box::new(port)).unwrap();
        (peer, line)
    }

    /// Polls until `done` holds for the backlog count, or panics after `WAIT`.
    fn poll_until(line: &HostLine, mut done: impl FnMut(usize) -> bool) {
        let start = Instant::now();
        loop {
            let waiting = line.poll_wire().unwrap();
            if done(waiting) {
                return;
            }
            assert!(start.elapsed() < WAIT, "wire never settled");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn poll_latches_one_byte_at_a_time() {
        let (mut peer, line) = pty_line();
        line.enable();

        peer.write_all(b"abc").unwrap();
        poll_until(&line, |waiting| waiting == 2 && line.receive_ready());

        // Occupied holding register: nothing moves until it is read.
        assert_eq!(line.poll_wire().unwrap(), 2);
        assert_eq!(line.read_byte(), b'a');
        assert!(!line.receive_ready());

        assert_eq!(line.poll_wire().unwrap(), 1);
        assert_eq!(line.read_byte(), b'b');
        assert_eq!(line.poll_wire().unwrap(), 0);
        assert_eq!(line.read_byte(), b'c');
        assert!(!line.receive_ready());
    }

    #[test]
    fn disabled_line_leaves_bytes_on_the_wire() {
        let (mut peer, line) = pty_line();

        peer.write_all(b"q").unwrap();
        poll_until(&line, |waiting| waiting == 1);
        assert!(!line.receive_ready());

        line.enable();
        assert_eq!(line.poll_wire().unwrap(), 0);
        assert_eq!(line.read_byte(), b'q');
    }

    #[test]
    fn transport_runs_over_a_pty() {
        let (mut peer, line) = pty_line();
        let line = Arc::new(line);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut outgoing: VecDeque<u8> = b"xyz".iter().copied().collect();
        let (mut dispatcher, control) = Transport::new(line.clone())
            .on_receive(move |byte: u8| -> Result<(), ParseRejected> {
                sink.lock().push(byte);
                Ok(())
            })
            .on_transmit(move || -> Option<u8> { outgoing.pop_front() })
            .init();

        peer.write_all(b"abc").unwrap();
        let start = Instant::now();
        while seen.lock().len() < 3 {
            line.poll_wire().unwrap();
            while dispatcher.interrupt_pending() {
                dispatcher.dispatch();
            }
            assert!(start.elapsed() < WAIT, "rx stalled");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*seen.lock(), b"abc".to_vec());

        assert_eq!(control.enable_send(), GateState::Active);
        while dispatcher.interrupt_pending() {
            dispatcher.dispatch();
        }
        assert_eq!(control.gate(), GateState::Idle);

        let mut echoed = [0u8; 3];
        peer.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"xyz");
    }

    #[test]
    fn close_reports_disconnected() {
        let (_peer, line) = pty_line();
        line.enable();
        line.close();

        let start = Instant::now();
        loop {
            match line.poll_wire() {
                Err(LineError::Disconnected) => break,
                Ok(_) => {}
                Err(e) => panic!("unexpected fault: {e}"),
            }
            assert!(start.elapsed() < WAIT, "reader never stopped");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!line.transmit_ready());
    }

    #[test]
    fn write_to_a_hung_up_wire_is_a_fault() {
        let (peer, line) = pty_line();
        line.enable();
        drop(peer);

        line.write_byte(0x42);

        let start = Instant::now();
        loop {
            match line.poll_wire() {
                Err(LineError::Io(_)) => break,
                Ok(_) => {}
                Err(e) => panic!("expected an I/O fault, got {e}"),
            }
            assert!(start.elapsed() < WAIT, "fault never surfaced");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn nine_bit_line_is_refused_before_opening() {
        let config = LineConfig {
            data_bits: DataBits::Nine,
            ..LineConfig::GOVERNOR
        };
        let err = HostLine::open("/dev/serlink-does-not-exist", &config).err().unwrap();
        assert!(matches!(err, LineError::UnsupportedDataBits(DataBits::Nine)));
    }
}
