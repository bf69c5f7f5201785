use std::num::NonZeroU8;

use thiserror::Error;

use crate::config::DataBits;

/// Non-zero status returned by a receive callback for a byte it could not parse.
///
/// The transport keeps running after a rejection; the status only travels to
/// the installed [`RejectObserver`](crate::RejectObserver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("protocol engine rejected byte (status {0})")]
pub struct ParseRejected(pub NonZeroU8);

impl ParseRejected {
    /// Builds a rejection from a raw engine status. Zero means "accepted" and
    /// yields `None`.
    pub fn from_status(status: u8) -> Option<Self> {
        NonZeroU8::new(status).map(Self)
    }

    pub fn code(&self) -> u8 {
        self.0.get()
    }
}

#[derive(Debug, Error)]
pub enum LineError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial line disconnected")]
    Disconnected,
    #[error("host serial ports cannot carry {0:?} data bits")]
    UnsupportedDataBits(DataBits),
}
