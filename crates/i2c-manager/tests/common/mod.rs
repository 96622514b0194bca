#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::RawMutex;
use i2c_manager::{BitRate, BusHardware, Control, I2cManager, StatusCode};

// ---------------------------------------------------------------------------
// Wire log
// ---------------------------------------------------------------------------

/// What a logic analyser on the bus would see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Start,
    RepeatedStart,
    Address { address: u8, read: bool },
    Write(u8),
    Read { byte: u8, ack: bool },
    Stop,
}

// ---------------------------------------------------------------------------
// Simulated targets
// ---------------------------------------------------------------------------

/// A device answering at one address, optionally behind a mux channel.
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub address: u8,
    /// Bytes returned by every read, from the first one on.
    pub responses: Vec<u8>,
    /// Data byte index (within one write) that gets no acknowledge.
    pub nack_at: Option<usize>,
    /// `(mux address, channel)` the device hangs off.
    pub behind: Option<(u8, u8)>,
    pub written: Vec<u8>,
}

impl SimDevice {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            responses: Vec::new(),
            nack_at: None,
            behind: None,
            written: Vec::new(),
        }
    }

    pub fn responding(mut self, bytes: &[u8]) -> Self {
        self.responses = bytes.to_vec();
        self
    }

    pub fn nacking_at(mut self, index: usize) -> Self {
        self.nack_at = Some(index);
        self
    }

    pub fn behind(mut self, mux: u8, channel: u8) -> Self {
        self.behind = Some((mux, channel));
        self
    }
}

#[derive(Debug, Clone)]
struct SimMux {
    address: u8,
    selected: u8,
    writes: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Device(usize),
    Mux(usize),
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Bus not owned, or owned but nothing addressed yet after a stop.
    Idle,
    /// A (repeated) start went out; the next byte is an address.
    Started,
    Writing { target: Target, index: usize },
    Reading { target: Target, index: usize },
    /// Address was not acknowledged; only a stop or start makes sense now.
    Rejected,
}

// ---------------------------------------------------------------------------
// Simulated peripheral
// ---------------------------------------------------------------------------

struct SimState {
    devices: Vec<SimDevice>,
    muxes: Vec<SimMux>,
    wire: Vec<Wire>,
    controls: Vec<Control>,
    pending: Option<u8>,
    data: u8,
    owned: bool,
    phase: Phase,
    bit_rate: Option<BitRate>,
}

/// Two-wire peripheral model reporting [`StatusCode`]s. Clones share state,
/// so a test keeps one clone for inspection and hands the other to the
/// manager.
#[derive(Clone)]
pub struct SimBus {
    state: Rc<RefCell<SimState>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                devices: Vec::new(),
                muxes: Vec::new(),
                wire: Vec::new(),
                controls: Vec::new(),
                pending: None,
                data: 0,
                owned: false,
                phase: Phase::Idle,
                bit_rate: None,
            })),
        }
    }

    pub fn add_device(&self, device: SimDevice) {
        self.state.borrow_mut().devices.push(device);
    }

    pub fn add_mux(&self, address: u8) {
        self.state.borrow_mut().muxes.push(SimMux {
            address,
            selected: 0,
            writes: Vec::new(),
        });
    }

    pub fn wire(&self) -> Vec<Wire> {
        self.state.borrow().wire.clone()
    }

    pub fn clear_wire(&self) {
        self.state.borrow_mut().wire.clear();
    }

    /// Addresses placed on the bus, in order.
    pub fn addresses(&self) -> Vec<u8> {
        self.state
            .borrow()
            .wire
            .iter()
            .filter_map(|w| match w {
                Wire::Address { address, .. } => Some(*address),
                _ => None,
            })
            .collect()
    }

    pub fn controls(&self) -> Vec<Control> {
        self.state.borrow().controls.clone()
    }

    pub fn last_control(&self) -> Option<Control> {
        self.state.borrow().controls.last().copied()
    }

    pub fn data_register(&self) -> u8 {
        self.state.borrow().data
    }

    pub fn bit_rate(&self) -> Option<BitRate> {
        self.state.borrow().bit_rate
    }

    pub fn written(&self, address: u8) -> Vec<u8> {
        let state = self.state.borrow();
        state
            .devices
            .iter()
            .find(|d| d.address == address)
            .map(|d| d.written.clone())
            .unwrap_or_default()
    }

    pub fn mux_selection(&self, address: u8) -> u8 {
        let state = self.state.borrow();
        state
            .muxes
            .iter()
            .find(|m| m.address == address)
            .map(|m| m.selected)
            .unwrap_or(0)
    }

    pub fn mux_writes(&self, address: u8) -> Vec<u8> {
        let state = self.state.borrow();
        state
            .muxes
            .iter()
            .find(|m| m.address == address)
            .map(|m| m.writes.clone())
            .unwrap_or_default()
    }

    /// Replaces the pending status code, as if the bus had reported `code`
    /// instead. Arbitration loss also drops bus ownership.
    pub fn inject(&self, code: StatusCode) {
        let mut state = self.state.borrow_mut();
        state.pending = Some(code as u8);
        if code == StatusCode::ArbitrationLost {
            state.owned = false;
            state.phase = Phase::Idle;
        }
    }

    /// Raises an event with a raw status code.
    pub fn inject_raw(&self, code: u8) {
        self.state.borrow_mut().pending = Some(code);
    }
}

impl SimState {
    fn find(&self, address: u8) -> Option<Target> {
        if let Some(i) = self.muxes.iter().position(|m| m.address == address) {
            return Some(Target::Mux(i));
        }
        self.devices
            .iter()
            .position(|d| d.address == address && self.reachable(d))
            .map(Target::Device)
    }

    fn reachable(&self, device: &SimDevice) -> bool {
        match device.behind {
            None => true,
            Some((mux, channel)) => self
                .muxes
                .iter()
                .any(|m| m.address == mux && m.selected & (1 << channel) != 0),
        }
    }

    fn send_address(&mut self) -> Option<u8> {
        let address = self.data >> 1;
        let read = self.data & 1 == 1;
        self.wire.push(Wire::Address { address, read });
        match (self.find(address), read) {
            (Some(target), false) => {
                self.phase = Phase::Writing { target, index: 0 };
                Some(StatusCode::AddressWriteAck as u8)
            }
            (Some(target), true) => {
                self.phase = Phase::Reading { target, index: 0 };
                Some(StatusCode::AddressReadAck as u8)
            }
            (None, false) => {
                self.phase = Phase::Rejected;
                Some(StatusCode::AddressWriteNack as u8)
            }
            (None, true) => {
                self.phase = Phase::Rejected;
                Some(StatusCode::AddressReadNack as u8)
            }
        }
    }

    fn send_byte(&mut self, target: Target, index: usize) -> Option<u8> {
        let byte = self.data;
        self.wire.push(Wire::Write(byte));
        self.phase = Phase::Writing { target, index: index + 1 };
        let accepted = match target {
            Target::Mux(i) => {
                self.muxes[i].selected = byte;
                self.muxes[i].writes.push(byte);
                true
            }
            Target::Device(i) => {
                let device = &mut self.devices[i];
                if device.nack_at == Some(index) {
                    false
                } else {
                    device.written.push(byte);
                    true
                }
            }
        };
        if accepted {
            Some(StatusCode::DataWriteAck as u8)
        } else {
            Some(StatusCode::DataWriteNack as u8)
        }
    }

    fn receive_byte(&mut self, target: Target, index: usize, ack: bool) -> Option<u8> {
        let byte = match target {
            Target::Mux(i) => self.muxes[i].selected,
            Target::Device(i) => {
                self.devices[i].responses.get(index).copied().unwrap_or(0xff)
            }
        };
        self.data = byte;
        self.wire.push(Wire::Read { byte, ack });
        self.phase = Phase::Reading { target, index: index + 1 };
        if ack {
            Some(StatusCode::DataReadAck as u8)
        } else {
            Some(StatusCode::DataReadNack as u8)
        }
    }
}

impl BusHardware for SimBus {
    fn event_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    fn status(&self) -> u8 {
        self.state.borrow().pending.unwrap_or(StatusCode::NoState as u8)
    }

    fn read_data(&self) -> u8 {
        self.state.borrow().data
    }

    fn write_data(&mut self, byte: u8) {
        self.state.borrow_mut().data = byte;
    }

    fn write_control(&mut self, control: Control) {
        let mut state = self.state.borrow_mut();
        state.controls.push(control);
        state.pending = None;

        if !control.contains(Control::ENABLE) {
            state.owned = false;
            state.phase = Phase::Idle;
            return;
        }

        if control.contains(Control::STOP) {
            if state.owned {
                state.wire.push(Wire::Stop);
            }
            state.owned = false;
            state.phase = Phase::Idle;
        }

        if control.contains(Control::START) {
            state.phase = Phase::Started;
            if state.owned {
                state.wire.push(Wire::RepeatedStart);
                state.pending = Some(StatusCode::RepeatedStart as u8);
            } else {
                state.owned = true;
                state.wire.push(Wire::Start);
                state.pending = Some(StatusCode::Start as u8);
            }
            return;
        }

        if control.contains(Control::STOP) {
            return;
        }

        let phase = state.phase;
        state.pending = match phase {
            Phase::Started => state.send_address(),
            Phase::Writing { target, index } => state.send_byte(target, index),
            Phase::Reading { target, index } => {
                state.receive_byte(target, index, control.contains(Control::ACK))
            }
            Phase::Idle | Phase::Rejected => None,
        };
    }

    fn set_bit_rate(&mut self, rate: BitRate) {
        self.state.borrow_mut().bit_rate = Some(rate);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Polls the manager until every queued request has finished.
pub fn drive<M: RawMutex>(manager: &I2cManager<'_, M, SimBus>) {
    for _ in 0..10_000 {
        if manager.is_idle() {
            return;
        }
        manager.poll();
    }
    panic!("bus never went idle");
}
