//! Governor test application: 32 test registers, the callback roles the
//! engine expects, and the mainline half of the version request.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serlink_core::{DeferredEvent, GateState, HardwareLine, SendControl};

use crate::engine::{register_cell, GovernorHooks, RegisterCell, SharedEngine, REGISTER_COUNT};
use crate::error::GovernorError;
use crate::firmware::FirmwareInfo;

/// Counters the harness keeps in place of the status LEDs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HarnessStats {
    pub output_triggers: u32,
    pub register_changes: u32,
    pub setup_faults: u32,
    pub versions_sent: u32,
}

struct Hooks<L> {
    send: SendControl<L>,
    version_requested: DeferredEvent,
    output_triggers: AtomicU32,
    register_changes: AtomicU32,
}

impl<L: HardwareLine> GovernorHooks for Hooks<L> {
    fn trigger_output(&self) {
        self.output_triggers.fetch_add(1, Ordering::Relaxed);
        self.send.enable_send();
    }

    fn register_changed(&self, addr: u8) {
        self.register_changes.fetch_add(1, Ordering::Relaxed);
        log::debug!("register {addr} changed");
    }

    fn get_version(&self) {
        self.version_requested.signal();
    }
}

pub struct GovernorHarness<L> {
    engine: SharedEngine,
    hooks: Arc<Hooks<L>>,
    firmware: FirmwareInfo,
    registers: Vec<RegisterCell>,
    setup_faults: u32,
    versions_sent: u32,
}

impl<L> GovernorHarness<L>
where
    L: HardwareLine + Send + Sync + 'static,
{
    /// Installs the callbacks into `engine` and registers the test
    /// registers, register `i` holding `i * 3`.
    pub fn new(engine: SharedEngine, send: SendControl<L>, firmware: FirmwareInfo) -> Self {
        let hooks = Arc::new(Hooks {
            send,
            version_requested: DeferredEvent::new(),
            output_triggers: AtomicU32::new(0),
            register_changes: AtomicU32::new(0),
        });

        let mut registers = Vec::with_capacity(REGISTER_COUNT);
        let mut setup_faults = 0;
        {
            let mut guard = engine.lock();
            guard.set_hooks(hooks.clone());
            for addr in 0..REGISTER_COUNT as u8 {
                let cell = register_cell(u16::from(addr) * 3);
                if let Err(e) = guard.setup_reg(addr, cell.clone()) {
                    log::warn!("test register {addr}: {e}");
                    setup_faults += 1;
                }
                registers.push(cell);
            }
        }

        Self {
            engine,
            hooks,
            firmware,
            registers,
            setup_faults,
            versions_sent: 0,
        }
    }

    /// Mainline half of the version request: if one arrived since the last
    /// call, send the version, copyright and license lines. Returns whether
    /// anything was sent.
    pub fn version_process(&mut self) -> bool {
        if !self.hooks.version_requested.take() {
            return false;
        }
        let lines = [
            self.firmware.version_line(),
            self.firmware.copyright_line(),
            self.firmware.license_line(),
        ];
        {
            let mut engine = self.engine.lock();
            for line in &lines {
                engine.send_string(line.as_bytes());
            }
        }
        self.flush_output();
        self.versions_sent += 1;
        log::debug!("sent version reply #{}", self.versions_sent);
        true
    }

    pub fn version_pending(&self) -> bool {
        self.hooks.version_requested.is_pending()
    }

    /// Rebinds `addr` to an application-owned cell.
    pub fn setup_reg(&mut self, addr: u8, cell: RegisterCell) -> Result<(), GovernorError> {
        self.engine.lock().setup_reg(addr, cell.clone())?;
        if let Some(slot) = self.registers.get_mut(usize::from(addr)) {
            *slot = cell;
        }
        Ok(())
    }

    pub fn register(&self, addr: u8) -> Option<&RegisterCell> {
        self.registers.get(usize::from(addr))
    }

    pub fn register_touched(&self, addr: u8) -> Result<(), GovernorError> {
        self.engine.lock().register_touched(addr)?;
        self.flush_output();
        Ok(())
    }

    /// Re-opens the transmit gate if output is still queued. A transmit
    /// interrupt that found the engine locked closes the gate with bytes
    /// left behind; call this with the engine unlocked to send them.
    pub fn flush_output(&self) -> bool {
        let pending = self.engine.lock().pending_output();
        if pending == 0 {
            return false;
        }
        if self.hooks.send.gate() == GateState::Idle {
            log::debug!("re-opening transmit gate for {pending} queued bytes");
        }
        self.hooks.send.enable_send() == GateState::Active
    }

    pub fn firmware(&self) -> &FirmwareInfo {
        &self.firmware
    }

    pub fn stats(&self) -> HarnessStats {
        HarnessStats {
            output_triggers: self.hooks.output_triggers.load(Ordering::Relaxed),
            register_changes: self.hooks.register_changes.load(Ordering::Relaxed),
            setup_faults: self.setup_faults,
            versions_sent: self.versions_sent,
        }
    }
}
