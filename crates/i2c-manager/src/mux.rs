//! Multiplexer tunnelling.
//!
//! A routed transaction runs in three phases around the real device
//! transaction:
//!
//! - **prolog**: address the mux and write the sub-bus selector byte, then
//!   stop and start again towards the device;
//! - **passthrough**: the device transaction itself, handled by the primary
//!   transitions until nothing is left to send or receive;
//! - **epilog**: with more than one mux on the bus, address the mux again
//!   and deselect every sub-bus, so two muxes never bridge devices with the
//!   same address.
//!
//! A routed request to device address zero ends after the prolog, leaving
//! the sub-bus selected.

use crate::engine::{Action, Engine};
use crate::error::Status;
use crate::hardware::{BusEvent, Control};
use crate::request::Transfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MuxPhase {
    Off,
    Prolog,
    Passthru,
    Epilog,
}

/// Selector byte that disconnects every sub-bus.
const DESELECT_ALL: u8 = 0x00;

impl Engine {
    /// Multiplexer transitions. `None` hands the event to the primary
    /// transitions.
    pub(crate) fn mux_step(
        &mut self,
        transfer: &mut Transfer<'_>,
        event: BusEvent,
    ) -> Option<Action> {
        let address = transfer.address();
        let Some((mux, sub_bus)) = address.route() else {
            self.mux_phase = MuxPhase::Off;
            return None;
        };

        match (self.mux_phase, event) {
            (
                MuxPhase::Prolog | MuxPhase::Epilog,
                BusEvent::Start | BusEvent::RepeatedStart,
            ) => Some(Action::send(mux.address() << 1, self.proceed())),

            (MuxPhase::Prolog, BusEvent::AddressWriteAck) => {
                Some(Action::send(sub_bus.mask(), self.proceed()))
            }

            (MuxPhase::Prolog, BusEvent::DataWriteAck) => {
                if address.is_mux_only() {
                    Some(self.release_and_stop())
                } else {
                    self.mux_phase = MuxPhase::Passthru;
                    Some(Action::control(
                        self.proceed() | Control::STOP | Control::START,
                    ))
                }
            }

            (
                MuxPhase::Passthru,
                BusEvent::AddressWriteAck | BusEvent::DataWriteAck,
            ) if self.progress.bytes_to_send == 0
                && self.progress.bytes_to_receive == 0 =>
            {
                Some(self.leave_passthru())
            }

            (MuxPhase::Passthru, BusEvent::LastDataReceived(byte)) => {
                // The byte has to be taken before the bus moves on.
                self.receive(transfer, byte);
                Some(self.leave_passthru())
            }

            (
                MuxPhase::Passthru,
                BusEvent::AddressWriteNack
                | BusEvent::AddressReadNack
                | BusEvent::DataWriteNack,
            ) => {
                debug!("i2c: {} not acknowledged behind mux", address);
                self.rejected(event);
                self.status = Status::NegativeAcknowledge;
                // Still clear the mux down.
                self.mux_phase = MuxPhase::Epilog;
                Some(Action::control(
                    self.proceed() | Control::STOP | Control::START,
                ))
            }

            (MuxPhase::Epilog, BusEvent::AddressWriteAck) => {
                Some(Action::send(DESELECT_ALL, self.proceed()))
            }

            (MuxPhase::Epilog, BusEvent::DataWriteAck) => {
                Some(self.release_and_stop())
            }

            (
                MuxPhase::Prolog,
                BusEvent::AddressWriteNack | BusEvent::DataWriteNack,
            ) => {
                debug!("i2c: mux {} not acknowledged", mux.address());
                self.status = Status::NegativeAcknowledge;
                Some(self.stop())
            }

            (
                MuxPhase::Epilog,
                BusEvent::AddressWriteNack | BusEvent::DataWriteNack,
            ) => {
                debug!("i2c: mux {} refused deselect", mux.address());
                Some(self.stop())
            }

            // The device transaction is already done; repeat only the
            // deselect and keep its status.
            (MuxPhase::Epilog, BusEvent::ArbitrationLost) => {
                debug!("i2c: arbitration lost in deselect, restarting it");
                Some(Action::control(
                    self.proceed() | Control::ACK | Control::START,
                ))
            }

            _ => None,
        }
    }

    /// The device transaction is over: deselect when several muxes shared
    /// the bus as the transaction started, otherwise finish straight away.
    fn leave_passthru(&mut self) -> Action {
        if self.deselect_after {
            self.mux_phase = MuxPhase::Epilog;
            Action::control(self.proceed() | Control::STOP | Control::START)
        } else {
            self.stop()
        }
    }
}
