//! Stand-in governor protocol engine.
//!
//! One request per header byte: `op = header >> 5`, `addr = header & 0x1f`.
//!
//! | op | request                    | reply                   |
//! |----|----------------------------|-------------------------|
//! | 0  | read `addr`                | `[0x80 | addr, hi, lo]` |
//! | 1  | write `addr`, then hi, lo  | none                    |
//! | 2  | toggle monitoring of addr  | none                    |
//! | 7  | addr 0: get version        | via the version process |
//!
//! Strings go out as `[0xe0, len, bytes..]` chunks.

use std::collections::VecDeque;
use std::num::NonZeroU8;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serlink_core::{ParseRejected, ReceiveHandler, TransmitSource};

use crate::error::GovernorError;

pub const REGISTER_COUNT: usize = 32;

const OP_READ: u8 = 0;
const OP_WRITE: u8 = 1;
const OP_MONITOR: u8 = 2;
const OP_SPECIAL: u8 = 7;
const SPECIAL_GET_VERSION: u8 = 0;

const REPLY_REGISTER: u8 = 0x80;
const REPLY_STRING: u8 = 0xe0;
const MAX_STRING_CHUNK: usize = u8::MAX as usize;

const fn rejection(code: u8) -> ParseRejected {
    match NonZeroU8::new(code) {
        Some(code) => ParseRejected(code),
        None => panic!("status 0 means accepted"),
    }
}

/// Header carries an operation the engine does not know.
pub const REJECT_UNKNOWN_OP: ParseRejected = rejection(1);
/// Read, write or monitor aimed at an address with no register behind it.
pub const REJECT_UNREGISTERED: ParseRejected = rejection(2);
/// Byte arrived while the mainline held the engine. The byte is dropped.
pub const REJECT_BUSY: ParseRejected = rejection(3);

/// Shared 16-bit register value. The application keeps one clone and updates
/// it from the mainline; the engine reads it from interrupt context.
pub type RegisterCell = Arc<AtomicU16>;

pub fn register_cell(value: u16) -> RegisterCell {
    Arc::new(AtomicU16::new(value))
}

/// Callbacks the engine raises towards the application.
///
/// They run while the engine is locked, often in interrupt context: they
/// must stay short and must not call back into the engine.
pub trait GovernorHooks {
    /// The engine queued output; the application should enable sending.
    fn trigger_output(&self);

    /// A client wrote register `addr`.
    fn register_changed(&self, addr: u8);

    /// A client asked for the firmware version.
    fn get_version(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parse {
    Header,
    WriteHigh { addr: u8 },
    WriteLow { addr: u8, high: u8 },
}

pub struct GovernorEngine {
    registers: [Option<RegisterCell>; REGISTER_COUNT],
    monitored: u32,
    parse: Parse,
    outbox: VecDeque<u8>,
    hooks: Option<Arc<dyn GovernorHooks + Send + Sync>>,
}

impl GovernorEngine {
    pub fn new() -> Self {
        Self {
            registers: Default::default(),
            monitored: 0,
            parse: Parse::Header,
            outbox: VecDeque::new(),
            hooks: None,
        }
    }

    pub fn set_hooks(&mut self, hooks: Arc<dyn GovernorHooks + Send + Sync>) {
        self.hooks = Some(hooks);
    }

    /// Binds `cell` to `addr`, returning the cell it replaces.
    pub fn setup_reg(&mut self, addr: u8, cell: RegisterCell) -> Result<Option<RegisterCell>, GovernorError> {
        let slot = self
            .registers
            .get_mut(usize::from(addr))
            .ok_or(GovernorError::AddressOutOfRange(addr))?;
        Ok(slot.replace(cell))
    }

    pub fn register(&self, addr: u8) -> Option<&RegisterCell> {
        self.registers.get(usize::from(addr))?.as_ref()
    }

    pub fn is_monitored(&self, addr: u8) -> bool {
        addr < REGISTER_COUNT as u8 && self.monitored & (1 << addr) != 0
    }

    /// The application changed register `addr`; monitored registers are
    /// reported to the client.
    pub fn register_touched(&mut self, addr: u8) -> Result<(), GovernorError> {
        let value = self.read(addr).ok_or(GovernorError::NotRegistered(addr))?;
        if self.is_monitored(addr) {
            self.queue(&[REPLY_REGISTER | addr, (value >> 8) as u8, value as u8]);
        }
        Ok(())
    }

    pub fn send_string(&mut self, text: &[u8]) {
        for chunk in text.chunks(MAX_STRING_CHUNK) {
            let mut packet = Vec::with_capacity(chunk.len() + 2);
            packet.push(REPLY_STRING);
            packet.push(chunk.len() as u8);
            packet.extend_from_slice(chunk);
            self.queue(&packet);
        }
    }

    pub fn handle_byte(&mut self, byte: u8) -> Result<(), ParseRejected> {
        match self.parse {
            Parse::Header => self.handle_header(byte),
            Parse::WriteHigh { addr } => {
                self.parse = Parse::WriteLow { addr, high: byte };
                Ok(())
            }
            Parse::WriteLow { addr, high } => {
                self.parse = Parse::Header;
                if let Some(cell) = self.register(addr) {
                    cell.store(u16::from_be_bytes([high, byte]), Ordering::Release);
                }
                if let Some(hooks) = &self.hooks {
                    hooks.register_changed(addr);
                }
                Ok(())
            }
        }
    }

    pub fn pickup_byte(&mut self) -> Option<u8> {
        self.outbox.pop_front()
    }

    pub fn pending_output(&self) -> usize {
        self.outbox.len()
    }

    fn handle_header(&mut self, header: u8) -> Result<(), ParseRejected> {
        let (op, addr) = (header >> 5, header & 0x1f);
        match op {
            OP_READ => {
                let value = self.read(addr).ok_or(REJECT_UNREGISTERED)?;
                self.queue(&[REPLY_REGISTER | addr, (value >> 8) as u8, value as u8]);
            }
            OP_WRITE => {
                if self.register(addr).is_none() {
                    return Err(REJECT_UNREGISTERED);
                }
                self.parse = Parse::WriteHigh { addr };
            }
            OP_MONITOR => {
                if self.register(addr).is_none() {
                    return Err(REJECT_UNREGISTERED);
                }
                self.monitored ^= 1 << addr;
            }
            OP_SPECIAL if addr == SPECIAL_GET_VERSION => {
                if let Some(hooks) = &self.hooks {
                    hooks.get_version();
                }
            }
            _ => return Err(REJECT_UNKNOWN_OP),
        }
        Ok(())
    }

    fn read(&self, addr: u8) -> Option<u16> {
        self.register(addr).map(|cell| cell.load(Ordering::Acquire))
    }

    fn queue(&mut self, bytes: &[u8]) {
        self.outbox.extend(bytes);
        if let Some(hooks) = &self.hooks {
            hooks.trigger_output();
        }
    }
}

impl Default for GovernorEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine shared between the transport callbacks and the mainline.
///
/// The transport takes one clone as its receive handler and another as its
/// transmit source. The mainline locks it between dispatches.
///
/// The callbacks never wait for the lock: an interrupt can preempt the
/// mainline while it holds the engine, and waiting there would never end.
/// A byte received in that window is rejected with [`REJECT_BUSY`]. A
/// transmit request in that window yields nothing, which closes the gate;
/// the mainline re-opens it with `GovernorHarness::flush_output` once it
/// lets go.
#[derive(Clone, Default)]
pub struct SharedEngine(Arc<Mutex<GovernorEngine>>);

impl SharedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> parking_lot::MutexGuard<'_, GovernorEngine> {
        self.0.lock()
    }
}

impl ReceiveHandler for SharedEngine {
    fn handle_byte(&mut self, byte: u8) -> Result<(), ParseRejected> {
        match self.0.try_lock() {
            Some(mut engine) => engine.handle_byte(byte),
            None => Err(REJECT_BUSY),
        }
    }
}

impl TransmitSource for SharedEngine {
    fn next_byte(&mut self) -> Option<u8> {
        self.0.try_lock().and_then(|mut engine| engine.pickup_byte())
    }
}
