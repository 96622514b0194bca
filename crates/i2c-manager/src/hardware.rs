//! The boundary between the engine and the bus peripheral.
//!
//! The engine needs four register-style primitives: write the control bits,
//! write the data register, read the data register and read the status
//! code. Their encodings are peripheral specific; implementations translate
//! [`Control`] into their own control register and report status in the
//! [`StatusCode`] encoding.

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

use crate::clock::BitRate;

bitflags! {
    /// Control bits requested by the engine.
    ///
    /// Every control write also acknowledges the pending hardware event, which
    /// lets the peripheral carry out the requested action. An empty set
    /// disables the peripheral.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u8 {
        /// Peripheral enabled.
        const ENABLE = 0b0000_0001;
        /// Raise an interrupt when the requested action completes.
        const INTERRUPT = 0b0000_0010;
        /// Acknowledge the next received byte.
        const ACK = 0b0000_0100;
        /// Generate a (repeated) start condition.
        const START = 0b0000_1000;
        /// Generate a stop condition. Combined with `START`, the stop is sent
        /// first.
        const STOP = 0b0001_0000;
    }
}

/// Bus status codes, two-wire-interface encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StatusCode {
    /// Illegal start or stop condition.
    BusError = 0x00,
    Start = 0x08,
    RepeatedStart = 0x10,
    /// Address+write sent, acknowledged.
    AddressWriteAck = 0x18,
    /// Address+write sent, not acknowledged.
    AddressWriteNack = 0x20,
    DataWriteAck = 0x28,
    DataWriteNack = 0x30,
    ArbitrationLost = 0x38,
    /// Address+read sent, acknowledged.
    AddressReadAck = 0x40,
    /// Address+read sent, not acknowledged.
    AddressReadNack = 0x48,
    /// Byte received, acknowledge returned.
    DataReadAck = 0x50,
    /// Byte received, no-acknowledge returned.
    DataReadNack = 0x58,
    /// No relevant state information.
    NoState = 0xf8,
}

/// A decoded hardware event, carrying the received byte where there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    Start,
    RepeatedStart,
    AddressWriteAck,
    AddressWriteNack,
    DataWriteAck,
    DataWriteNack,
    AddressReadAck,
    AddressReadNack,
    /// Byte received and acknowledged; more are expected.
    DataReceived(u8),
    /// Final byte received, answered with no-acknowledge.
    LastDataReceived(u8),
    ArbitrationLost,
    BusError,
    Unrecognized(u8),
}

impl BusEvent {
    /// Decodes a raw status code. `data` is only called for codes that carry
    /// a received byte.
    pub fn decode(code: u8, data: impl FnOnce() -> u8) -> Self {
        match StatusCode::try_from(code) {
            Ok(StatusCode::Start) => BusEvent::Start,
            Ok(StatusCode::RepeatedStart) => BusEvent::RepeatedStart,
            Ok(StatusCode::AddressWriteAck) => BusEvent::AddressWriteAck,
            Ok(StatusCode::AddressWriteNack) => BusEvent::AddressWriteNack,
            Ok(StatusCode::DataWriteAck) => BusEvent::DataWriteAck,
            Ok(StatusCode::DataWriteNack) => BusEvent::DataWriteNack,
            Ok(StatusCode::AddressReadAck) => BusEvent::AddressReadAck,
            Ok(StatusCode::AddressReadNack) => BusEvent::AddressReadNack,
            Ok(StatusCode::DataReadAck) => BusEvent::DataReceived(data()),
            Ok(StatusCode::DataReadNack) => BusEvent::LastDataReceived(data()),
            Ok(StatusCode::ArbitrationLost) => BusEvent::ArbitrationLost,
            Ok(StatusCode::BusError) => BusEvent::BusError,
            Ok(StatusCode::NoState) | Err(_) => BusEvent::Unrecognized(code),
        }
    }
}

/// Register-level access to one bus peripheral.
pub trait BusHardware {
    /// True while a hardware event is waiting to be serviced.
    fn event_pending(&self) -> bool;

    /// Current status code, in [`StatusCode`] encoding with any prescaler
    /// bits masked off.
    fn status(&self) -> u8;

    fn read_data(&self) -> u8;

    fn write_data(&mut self, byte: u8);

    /// Writes the control bits, acknowledging the pending event.
    fn write_control(&mut self, control: Control);

    fn set_bit_rate(&mut self, rate: BitRate);
}
