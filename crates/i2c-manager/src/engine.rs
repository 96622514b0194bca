//! The bus state machine.
//!
//! [`Engine::step`] is a pure transition function: given the current
//! transfer and one decoded [`BusEvent`] it updates the engine state and
//! returns the register writes ([`Action`]) that request the next hardware
//! step. It never touches hardware itself, so the whole transition table can
//! be driven with synthetic events.
//!
//! Multiplexer transitions are tried first while a routed transaction is in
//! its prolog, passthrough or epilog (see [`crate::mux`]); everything else
//! falls through to the primary transitions here.

use crate::error::Status;
use crate::hardware::{BusEvent, Control};
use crate::mux::MuxPhase;
use crate::request::{Operation, Transfer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    Idle,
    Active,
    /// The current transaction finished; its status is waiting to be
    /// dispatched.
    Completed,
}

/// Transfer progress counters. Only meaningful while a transaction is
/// active or just completed; reset for every new transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Progress {
    pub bytes_to_send: usize,
    pub bytes_to_receive: usize,
    /// Bytes written and acknowledged by the peer.
    pub tx_count: usize,
    pub rx_count: usize,
}

/// Register writes for one step: an optional data byte, written first, then
/// the control bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub data: Option<u8>,
    pub control: Control,
}

impl Action {
    pub const fn send(byte: u8, control: Control) -> Self {
        Self { data: Some(byte), control }
    }

    pub const fn control(control: Control) -> Self {
        Self { data: None, control }
    }
}

/// Data register contents that leave the data line released.
pub(crate) const RELEASED: u8 = 0xff;

pub struct Engine {
    state: EngineState,
    pub(crate) mux_phase: MuxPhase,
    pub(crate) mux_count: u8,
    /// Whether the current routed transaction ends with a deselect. Taken
    /// from `mux_count` when the transaction (re)starts.
    pub(crate) deselect_after: bool,
    interrupts: bool,
    pub(crate) progress: Progress,
    pub(crate) status: Status,
}

impl Engine {
    pub const fn new(interrupts: bool, mux_count: u8) -> Self {
        Self {
            state: EngineState::Idle,
            mux_phase: MuxPhase::Off,
            mux_count,
            deselect_after: false,
            interrupts,
            progress: Progress {
                bytes_to_send: 0,
                bytes_to_receive: 0,
                tx_count: 0,
                rx_count: 0,
            },
            status: Status::Ok,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == EngineState::Idle
    }

    pub fn mux_phase(&self) -> MuxPhase {
        self.mux_phase
    }

    pub fn mux_count(&self) -> u8 {
        self.mux_count
    }

    /// Takes effect from the next transaction; one already running keeps
    /// the epilog decision it started with.
    pub fn set_mux_count(&mut self, mux_count: u8) {
        self.mux_count = mux_count;
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Status staged for the current transaction.
    pub fn completion_status(&self) -> Status {
        self.status
    }

    /// Begins `transfer`: resets the counters, enters the mux prolog when the
    /// address is routed and requests a start condition.
    pub fn start(&mut self, transfer: &Transfer<'_>) -> Action {
        debug_assert!(self.state != EngineState::Active);
        self.state = EngineState::Active;
        self.status = Status::Ok;
        self.rewind(transfer);
        Action::control(self.proceed() | Control::ACK | Control::START)
    }

    /// Returns to idle after the completed transaction was dispatched.
    pub fn idle(&mut self) {
        self.state = EngineState::Idle;
        self.mux_phase = MuxPhase::Off;
    }

    /// Advances the active transaction by one hardware event.
    pub fn step(&mut self, transfer: &mut Transfer<'_>, event: BusEvent) -> Action {
        trace!("i2c: {} ({}, {})", event, self.state, self.mux_phase);

        if self.state != EngineState::Active {
            // Nothing to drive; leave the bus released.
            return Action::send(RELEASED, Control::ENABLE | Control::STOP);
        }

        if self.mux_phase != MuxPhase::Off {
            if let Some(action) = self.mux_step(transfer, event) {
                return action;
            }
        }

        match event {
            BusEvent::Start | BusEvent::RepeatedStart => {
                let read = match transfer.operation() {
                    Operation::Read => true,
                    Operation::WriteRead => self.progress.bytes_to_send == 0,
                    Operation::Write | Operation::WriteStatic => false,
                };
                let header = (transfer.address().device() << 1) | read as u8;
                Action::send(header, self.proceed() | Control::ACK)
            }

            BusEvent::AddressWriteAck | BusEvent::DataWriteAck => {
                if self.progress.bytes_to_send > 0 {
                    let byte = transfer.write_byte(self.progress.tx_count);
                    self.progress.tx_count += 1;
                    self.progress.bytes_to_send -= 1;
                    Action::send(byte, self.proceed())
                } else if self.progress.bytes_to_receive > 0 {
                    // Turn the bus around for the read phase.
                    Action::control(self.proceed() | Control::START)
                } else {
                    self.stop()
                }
            }

            BusEvent::DataReceived(byte) => {
                self.receive(transfer, byte);
                self.ack_policy()
            }

            BusEvent::AddressReadAck => self.ack_policy(),

            BusEvent::LastDataReceived(byte) => {
                self.receive(transfer, byte);
                self.stop()
            }

            BusEvent::AddressWriteNack
            | BusEvent::AddressReadNack
            | BusEvent::DataWriteNack => {
                debug!("i2c: {} not acknowledged", transfer.address());
                self.rejected(event);
                self.status = Status::NegativeAcknowledge;
                self.stop()
            }

            BusEvent::ArbitrationLost => {
                debug!("i2c: arbitration lost, restarting");
                self.status = Status::Ok;
                self.rewind(transfer);
                Action::control(self.proceed() | Control::ACK | Control::START)
            }

            BusEvent::BusError | BusEvent::Unrecognized(_) => {
                warn!("i2c: bus error ({}) on {}", event, transfer.address());
                self.status = Status::TransmitError;
                self.release_and_stop()
            }
        }
    }

    /// Control bits that keep the peripheral running and, when enabled,
    /// raise the interrupt for the next event.
    pub(crate) fn proceed(&self) -> Control {
        if self.interrupts {
            Control::ENABLE | Control::INTERRUPT
        } else {
            Control::ENABLE
        }
    }

    /// Finishes the transaction with the staged status.
    pub(crate) fn stop(&mut self) -> Action {
        self.state = EngineState::Completed;
        self.mux_phase = MuxPhase::Off;
        Action::control(Control::ENABLE | Control::ACK | Control::STOP)
    }

    /// As [`Engine::stop`], releasing the data line first.
    pub(crate) fn release_and_stop(&mut self) -> Action {
        Action { data: Some(RELEASED), ..self.stop() }
    }

    /// Stores a received byte if one is still expected.
    pub(crate) fn receive(&mut self, transfer: &mut Transfer<'_>, byte: u8) {
        if self.progress.bytes_to_receive > 0 {
            transfer.store(self.progress.rx_count, byte);
            self.progress.rx_count += 1;
            self.progress.bytes_to_receive -= 1;
        }
    }

    /// A rejected data byte was not delivered.
    pub(crate) fn rejected(&mut self, event: BusEvent) {
        if event == BusEvent::DataWriteNack && self.progress.tx_count > 0 {
            self.progress.tx_count -= 1;
            self.progress.bytes_to_send += 1;
        }
    }

    fn ack_policy(&self) -> Action {
        if self.progress.bytes_to_receive <= 1 {
            Action::control(self.proceed())
        } else {
            Action::control(self.proceed() | Control::ACK)
        }
    }

    fn rewind(&mut self, transfer: &Transfer<'_>) {
        self.progress = Progress {
            bytes_to_send: transfer.write_len(),
            bytes_to_receive: transfer.read_len(),
            tx_count: 0,
            rx_count: 0,
        };
        self.mux_phase = if transfer.address().is_routed() {
            MuxPhase::Prolog
        } else {
            MuxPhase::Off
        };
        self.deselect_after = self.mux_count > 1;
    }
}
