//! Device addressing, optionally qualified by multiplexer routing.

use core::fmt;

/// Address of the first multiplexer; mux `n` answers at `MUX_BASE_ADDRESS + n`.
pub const MUX_BASE_ADDRESS: u8 = 0x70;

/// Device address that, combined with mux routing, selects a sub-bus and
/// performs no device transaction.
pub const MUX_ONLY_DEVICE: u8 = 0;

/// One of the eight multiplexer chips that may share a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MuxNumber {
    Mux0 = 0,
    Mux1 = 1,
    Mux2 = 2,
    Mux3 = 3,
    Mux4 = 4,
    Mux5 = 5,
    Mux6 = 6,
    Mux7 = 7,
}

impl MuxNumber {
    pub const ALL: [MuxNumber; 8] = [
        Self::Mux0,
        Self::Mux1,
        Self::Mux2,
        Self::Mux3,
        Self::Mux4,
        Self::Mux5,
        Self::Mux6,
        Self::Mux7,
    ];

    /// Bus address of this multiplexer.
    pub const fn address(self) -> u8 {
        MUX_BASE_ADDRESS + self as u8
    }
}

/// Sub-bus selection on a multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubBus {
    /// Every sub-bus disconnected.
    None,
    /// Every sub-bus connected.
    All,
    /// A single sub-bus, `0..=7`.
    Channel(u8),
}

impl SubBus {
    /// Control byte written to the multiplexer to make this selection.
    ///
    /// Channel indices above 7 select nothing.
    pub const fn mask(self) -> u8 {
        match self {
            SubBus::None => 0x00,
            SubBus::All => 0xff,
            SubBus::Channel(n) if n < 8 => 1 << n,
            SubBus::Channel(_) => 0x00,
        }
    }
}

/// A 7-bit device address with optional multiplexer routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cAddress {
    device: u8,
    route: Option<(MuxNumber, SubBus)>,
}

impl I2cAddress {
    /// A device directly on the main bus.
    pub const fn new(device: u8) -> Self {
        Self { device: device & 0x7f, route: None }
    }

    /// A device reached through `sub_bus` of multiplexer `mux`.
    pub const fn routed(mux: MuxNumber, sub_bus: SubBus, device: u8) -> Self {
        Self { device: device & 0x7f, route: Some((mux, sub_bus)) }
    }

    /// Selects `sub_bus` on `mux` and leaves it selected, without addressing
    /// any device behind it.
    pub const fn mux_only(mux: MuxNumber, sub_bus: SubBus) -> Self {
        Self::routed(mux, sub_bus, MUX_ONLY_DEVICE)
    }

    pub const fn device(&self) -> u8 {
        self.device
    }

    pub const fn route(&self) -> Option<(MuxNumber, SubBus)> {
        self.route
    }

    pub const fn mux(&self) -> Option<MuxNumber> {
        match self.route {
            Some((mux, _)) => Some(mux),
            None => None,
        }
    }

    pub const fn sub_bus(&self) -> Option<SubBus> {
        match self.route {
            Some((_, sub_bus)) => Some(sub_bus),
            None => None,
        }
    }

    pub const fn is_routed(&self) -> bool {
        self.route.is_some()
    }

    /// True for a routed address that only drives the multiplexer.
    pub const fn is_mux_only(&self) -> bool {
        self.route.is_some() && self.device == MUX_ONLY_DEVICE
    }
}

impl From<u8> for I2cAddress {
    fn from(device: u8) -> Self {
        Self::new(device)
    }
}

impl fmt::Display for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.route {
            None => write!(f, "{:#04x}", self.device),
            Some((mux, SubBus::Channel(n))) => {
                write!(f, "{}:{}:{:#04x}", mux as u8, n, self.device)
            }
            Some((mux, SubBus::All)) => {
                write!(f, "{}:all:{:#04x}", mux as u8, self.device)
            }
            Some((mux, SubBus::None)) => {
                write!(f, "{}:none:{:#04x}", mux as u8, self.device)
            }
        }
    }
}
