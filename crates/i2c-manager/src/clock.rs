//! Bus clock divisor computation.
//!
//! The bus clock is `reference / (16 + 2 * divisor * 4^prescaler)`, with an
//! 8-bit divisor and a 2-bit prescaler.

/// Divisor/prescaler pair programmed into the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitRate {
    pub divisor: u8,
    /// Prescaler selector `0..=3`, dividing by 1, 4, 16 or 64.
    pub prescaler: u8,
}

impl BitRate {
    /// Slowest rate the peripheral can produce.
    pub const SLOWEST: BitRate = BitRate { divisor: 255, prescaler: 3 };

    /// Smallest divisor/prescaler pair reaching at most `bus_hz` from
    /// `reference_hz`, or [`BitRate::SLOWEST`] when even that is too fast.
    pub const fn for_frequency(reference_hz: u32, bus_hz: u32) -> Self {
        if bus_hz == 0 {
            return Self::SLOWEST;
        }
        let mut divisor = (reference_hz / bus_hz).saturating_sub(16) / 2;
        let mut prescaler = 0;
        while prescaler <= 3 {
            if divisor <= 255 {
                return BitRate { divisor: divisor as u8, prescaler };
            }
            divisor /= 4;
            prescaler += 1;
        }
        Self::SLOWEST
    }

    /// Resulting bus frequency for `reference_hz`.
    pub const fn frequency(&self, reference_hz: u32) -> u32 {
        let scale = 1u32 << (2 * (self.prescaler as u32 & 0x3));
        reference_hz / (16 + 2 * self.divisor as u32 * scale)
    }
}
