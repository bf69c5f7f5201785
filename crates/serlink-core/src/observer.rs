use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::ParseRejected;

/// Receives parse rejections from the dispatcher.
///
/// Runs in interrupt context: implementations must not block and must finish
/// in bounded time. Counting, raising a flag or lighting a fault LED are
/// typical.
pub trait RejectObserver {
    fn parse_rejected(&self, byte: u8, rejected: ParseRejected);
}

impl<T: RejectObserver + ?Sized> RejectObserver for Arc<T> {
    fn parse_rejected(&self, byte: u8, rejected: ParseRejected) {
        (**self).parse_rejected(byte, rejected)
    }
}

impl<F> RejectObserver for F
where
    F: Fn(u8, ParseRejected),
{
    fn parse_rejected(&self, byte: u8, rejected: ParseRejected) {
        self(byte, rejected)
    }
}

/// Default observer: counts rejections and remembers the last one.
#[derive(Debug, Default)]
pub struct RejectCounter {
    count: AtomicU32,
    /// Status code in the high byte, rejected byte in the low byte. Zero
    /// until the first rejection.
    last: AtomicU16,
}

impl RejectCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            last: AtomicU16::new(0),
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// The most recent rejected byte and its status, if any rejection happened.
    pub fn last(&self) -> Option<(u8, ParseRejected)> {
        let [code, byte] = self.last.load(Ordering::Acquire).to_be_bytes();
        ParseRejected::from_status(code).map(|rejected| (byte, rejected))
    }
}

impl RejectObserver for RejectCounter {
    fn parse_rejected(&self, byte: u8, rejected: ParseRejected) {
        let total = self.count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.last
            .store(u16::from_be_bytes([rejected.code(), byte]), Ordering::Release);
        log::warn!("rejected byte 0x{byte:02x}: {rejected} ({total} so far)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_records_rejections() {
        let counter = RejectCounter::new();
        assert_eq!(counter.count(), 0);
        assert!(counter.last().is_none());

        counter.parse_rejected(0x41, ParseRejected::from_status(1).unwrap());
        counter.parse_rejected(0x42, ParseRejected::from_status(2).unwrap());

        assert_eq!(counter.count(), 2);
        let (byte, rejected) = counter.last().unwrap();
        assert_eq!(byte, 0x42);
        assert_eq!(rejected.code(), 2);
    }

    #[test]
    fn shared_counter_observes_through_arc() {
        let counter = Arc::new(RejectCounter::new());
        let observer: Box<dyn RejectObserver> = Box::new(counter.clone());
        observer.parse_rejected(7, ParseRejected::from_status(9).unwrap());
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn last_pairs_byte_with_its_own_status() {
        let counter = RejectCounter::new();
        counter.parse_rejected(0xff, ParseRejected::from_status(1).unwrap());
        counter.parse_rejected(0x00, ParseRejected::from_status(0xff).unwrap());

        let (byte, rejected) = counter.last().unwrap();
        assert_eq!((byte, rejected.code()), (0x00, 0xff));
    }

    #[test]
    fn closure_is_an_observer() {
        let seen = std::cell::Cell::new(None);
        let observer = |byte: u8, rejected: ParseRejected| seen.set(Some((byte, rejected.code())));
        observer.parse_rejected(0x13, ParseRejected::from_status(4).unwrap());
        assert_eq!(seen.get(), Some((0x13, 4)));
    }
}
