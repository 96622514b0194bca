/// Bus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Peripheral reference clock in Hz.
    pub reference_clock: u32,
    /// Requested bus clock in Hz.
    pub bus_frequency: u32,
    /// The peripheral raises an interrupt that calls
    /// [`I2cManager::handle_event`](crate::I2cManager::handle_event). When
    /// false, waiters drive the engine by polling.
    pub interrupts: bool,
    /// Multiplexers on the bus. With more than one, every routed transaction
    /// deselects its mux afterwards.
    pub mux_count: u8,
}

impl Config {
    pub const DEFAULT_REFERENCE_CLOCK: u32 = 16_000_000;
    pub const DEFAULT_BUS_FREQUENCY: u32 = 100_000;

    pub const fn new(reference_clock: u32) -> Self {
        Self {
            reference_clock,
            bus_frequency: Self::DEFAULT_BUS_FREQUENCY,
            interrupts: true,
            mux_count: 0,
        }
    }

    pub const fn with_bus_frequency(mut self, hz: u32) -> Self {
        self.bus_frequency = hz;
        self
    }

    pub const fn with_interrupts(mut self, interrupts: bool) -> Self {
        self.interrupts = interrupts;
        self
    }

    pub const fn with_mux_count(mut self, mux_count: u8) -> Self {
        self.mux_count = mux_count;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REFERENCE_CLOCK)
    }
}
