use std::sync::atomic::{AtomicBool, Ordering};

/// State of the transmit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Transmit interrupt disabled.
    Idle,
    /// Transmit interrupt enabled; every transmit-ready condition pulls a byte.
    Active,
}

/// Single-bit enable for the transmit interrupt.
///
/// Both the mainline and the interrupt context flip this bit. Every access is
/// one atomic instruction, so an `open` racing a `close` resolves to one of
/// the two writes and never to a torn value. A line implementation embeds a
/// gate in place of its transmit-interrupt enable bit, or mirrors its register
/// through one.
#[derive(Debug)]
pub struct TransmitGate {
    enabled: AtomicBool,
}

impl TransmitGate {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    /// Enables the gate and returns the state it was in before.
    pub fn open(&self) -> GateState {
        Self::state_of(self.enabled.swap(true, Ordering::AcqRel))
    }

    /// Disables the gate and returns the state it was in before.
    pub fn close(&self) -> GateState {
        Self::state_of(self.enabled.swap(false, Ordering::AcqRel))
    }

    pub fn set(&self, enabled: bool) -> GateState {
        if enabled {
            self.open()
        } else {
            self.close()
        }
    }

    pub fn is_open(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> GateState {
        Self::state_of(self.is_open())
    }

    fn state_of(enabled: bool) -> GateState {
        if enabled {
            GateState::Active
        } else {
            GateState::Idle
        }
    }
}

impl Default for TransmitGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(TransmitGate::new().state(), GateState::Idle);
    }

    #[test]
    fn open_and_close_are_idempotent() {
        let gate = TransmitGate::new();
        assert_eq!(gate.open(), GateState::Idle);
        assert_eq!(gate.open(), GateState::Active);
        assert_eq!(gate.state(), GateState::Active);

        assert_eq!(gate.close(), GateState::Active);
        assert_eq!(gate.close(), GateState::Idle);
        assert!(!gate.is_open());
    }
}
