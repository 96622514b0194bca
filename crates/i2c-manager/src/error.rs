use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Outcome of a request, stamped once by the engine when the transaction
/// finishes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    /// The device (or a multiplexer on the route) did not acknowledge its
    /// address or a data byte.
    NegativeAcknowledge = 2,
    /// Bus-level failure: illegal start/stop sequencing or an unrecognised
    /// hardware status.
    TransmitError = 3,
    /// Queued or in progress.
    Pending = 253,
}

impl Status {
    /// Converts a finished status into a `Result`. A pending status reports
    /// [`Error::Busy`].
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            Status::Ok => Ok(()),
            Status::NegativeAcknowledge => Err(Error::NegativeAcknowledge),
            Status::TransmitError => Err(Error::TransmitError),
            Status::Pending => Err(Error::Busy),
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::NegativeAcknowledge => write!(f, "no acknowledge"),
            Status::TransmitError => write!(f, "transmit error"),
            Status::Pending => write!(f, "pending"),
        }
    }
}

/// Errors reported through `Result` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Address or data byte was not acknowledged.
    NegativeAcknowledge,
    /// Bus error; the bus was released and the queue carried on.
    TransmitError,
    /// The request is queued or in progress and cannot be touched.
    Busy,
    /// The requested operation sequence cannot be expressed as a single
    /// transaction.
    Unsupported,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NegativeAcknowledge => {
                write!(f, "device did not acknowledge")
            }
            Error::TransmitError => write!(f, "bus transmit error"),
            Error::Busy => write!(f, "request already in progress"),
            Error::Unsupported => {
                write!(f, "unsupported transaction shape")
            }
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            Error::NegativeAcknowledge => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            Error::TransmitError => ErrorKind::Bus,
            Error::Busy | Error::Unsupported => ErrorKind::Other,
        }
    }
}
