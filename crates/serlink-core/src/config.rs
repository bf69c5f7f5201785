use crate::error::LineError;

/// Number of data bits per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Hardware,
}

/// Framing of the duplex line. Applied once by `Transport::init` and never
/// changed for the lifetime of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl LineConfig {
    /// The governor line: 57600 baud, 8N1, no flow control.
    pub const GOVERNOR: Self = Self {
        baud_rate: 57_600,
        data_bits: DataBits::Eight,
        stop_bits: StopBits::One,
        parity: Parity::None,
        flow_control: FlowControl::None,
    };
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::GOVERNOR
    }
}

impl std::fmt::Display for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
            DataBits::Nine => 9,
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{} {bits}{parity}{stop}", self.baud_rate)?;
        if self.flow_control == FlowControl::Hardware {
            f.write_str(" rts/cts")?;
        }
        Ok(())
    }
}

impl TryFrom<DataBits> for serialport::DataBits {
    type Error = LineError;

    /// Host serial ports have no 9-bit frames.
    fn try_from(bits: DataBits) -> Result<Self, Self::Error> {
        match bits {
            DataBits::Seven => Ok(serialport::DataBits::Seven),
            DataBits::Eight => Ok(serialport::DataBits::Eight),
            DataBits::Nine => Err(LineError::UnsupportedDataBits(bits)),
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_governor_line() {
        let cfg = LineConfig::default();
        assert_eq!(cfg.baud_rate, 57_600);
        assert_eq!(cfg.data_bits, DataBits::Eight);
        assert_eq!(cfg.stop_bits, StopBits::One);
        assert_eq!(cfg.parity, Parity::None);
        assert_eq!(cfg.flow_control, FlowControl::None);
        assert_eq!(cfg.to_string(), "57600 8N1");
    }

    #[test]
    fn converts_to_serialport_settings() {
        let cfg = LineConfig {
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            ..LineConfig::GOVERNOR
        };
        assert_eq!(serialport::Parity::from(cfg.parity), serialport::Parity::Even);
        assert_eq!(serialport::StopBits::from(cfg.stop_bits), serialport::StopBits::Two);
        assert_eq!(
            serialport::DataBits::try_from(cfg.data_bits).unwrap(),
            serialport::DataBits::Eight
        );
    }

    #[test]
    fn nine_bit_frames_do_not_convert() {
        let err = serialport::DataBits::try_from(DataBits::Nine).unwrap_err();
        assert!(matches!(err, LineError::UnsupportedDataBits(DataBits::Nine)));
        assert_eq!(err.to_string(), "host serial ports cannot carry Nine data bits");
    }
}
