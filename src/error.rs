use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// An uplink is still waiting for its TX/RX windows to close
    RadioBusy,
    /// The device has not (yet) joined the network
    NotJoined,
    /// Reading from the GPS UART failed
    Uart,
    /// The radio driver or MAC reported a failure
    Radio,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::RadioBusy => "radio busy",
            Error::NotJoined => "not joined",
            Error::Uart => "uart error",
            Error::Radio => "radio error",
        };
        f.write_str(msg)
    }
}
