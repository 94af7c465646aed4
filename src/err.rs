use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qca8kError {
    /// The underlying register or MDIO transport failed.
    Bus,
    /// A busy bit did not clear within the poll budget.
    Timeout,
    /// The hardware FDB table has no free record (load rejected).
    TableFull,
    /// Out-of-range port index, PHY address, register number or field value.
    InvalidArg,
    /// MASK_CTRL reports a device id this driver does not handle.
    UnsupportedDevice,
}

impl fmt::Display for Qca8kError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qca8kError::Bus => write!(f, "bus transfer failed"),
            Qca8kError::Timeout => write!(f, "busy wait timed out"),
            Qca8kError::TableFull => write!(f, "hardware table full"),
            Qca8kError::InvalidArg => write!(f, "argument out of range"),
            Qca8kError::UnsupportedDevice => write!(f, "unsupported switch id"),
        }
    }
}
