use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c;

use crate::address::{I2cAddress, MuxNumber, SubBus};
use crate::error::Error;
use crate::hardware::BusHardware;
use crate::manager::I2cManager;
use crate::request::Request;

/// Blocking [`embedded_hal::i2c::I2c`] view of a manager, for device drivers.
///
/// Every transaction is queued behind whatever else is pending and waited
/// for. A routed handle tunnels each transaction through one sub-bus of a
/// multiplexer.
pub struct BusHandle<'m, 'a, M: RawMutex, H: BusHardware> {
    manager: &'m I2cManager<'a, M, H>,
    route: Option<(MuxNumber, SubBus)>,
}

impl<'m, 'a, M: RawMutex, H: BusHardware> BusHandle<'m, 'a, M, H> {
    pub fn route(&self) -> Option<(MuxNumber, SubBus)> {
        self.route
    }

    fn address(&self, device: u8) -> I2cAddress {
        match self.route {
            Some((mux, sub_bus)) => I2cAddress::routed(mux, sub_bus, device),
            None => I2cAddress::new(device),
        }
    }
}

impl<'a, M: RawMutex, H: BusHardware> I2cManager<'a, M, H> {
    /// Handle for devices on the main bus.
    pub fn handle(&self) -> BusHandle<'_, 'a, M, H> {
        BusHandle { manager: self, route: None }
    }

    /// Handle for devices behind `sub_bus` of multiplexer `mux`.
    pub fn routed_handle(
        &self,
        mux: MuxNumber,
        sub_bus: SubBus,
    ) -> BusHandle<'_, 'a, M, H> {
        BusHandle { manager: self, route: Some((mux, sub_bus)) }
    }
}

impl<M: RawMutex, H: BusHardware> i2c::ErrorType for BusHandle<'_, '_, M, H> {
    type Error = Error;
}

impl<M: RawMutex, H: BusHardware> i2c::I2c for BusHandle<'_, '_, M, H> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        let address = self.address(address);
        match operations {
            [] => self.manager.submit_and_wait(&Request::probe(address)),
            [i2c::Operation::Write(data)] => self.manager.write(address, data),
            [i2c::Operation::Read(buffer)] => self.manager.read(address, buffer),
            [i2c::Operation::Write(data), i2c::Operation::Read(buffer)] => {
                self.manager.write_read(address, data, buffer)
            }
            _ => {
                debug!(
                    "i2c: {} operations for {} not expressible",
                    operations.len(),
                    address
                );
                Err(Error::Unsupported)
            }
        }
    }
}
