#![no_std]
//! Non-blocking, queued I2C transaction engine with multiplexer tunnelling.
//!
//! Callers describe each bus transaction in a [`Request`] and submit it to
//! an [`I2cManager`]. Requests run strictly in submission order, one at a
//! time, driven by the bus peripheral's events: the interrupt handler calls
//! [`I2cManager::handle_event`], or, in poll-driven builds, whoever waits for
//! a request polls the manager. Each request carries its own completion
//! [`Status`], which can be polled, awaited, or blocked on.
//!
//! Addresses may name a sub-bus of a multiplexer chip at `0x70..=0x77`. The
//! engine then selects the sub-bus before the device transaction and, when
//! several multiplexers share the bus, deselects it afterwards.
//!
//! The peripheral itself is reached through the [`BusHardware`] trait, so the
//! engine runs unchanged on any two-wire controller that reports
//! [`StatusCode`]s, and on the host against a simulated bus.

#[macro_use]
mod fmt;

mod address;
mod clock;
mod config;
mod engine;
mod error;
mod handle;
mod hardware;
mod manager;
mod mux;
mod queue;
mod request;

pub use address::{I2cAddress, MuxNumber, SubBus, MUX_BASE_ADDRESS, MUX_ONLY_DEVICE};
pub use clock::BitRate;
pub use config::Config;
pub use engine::{Action, Engine, EngineState, Progress};
pub use error::{Error, Status};
pub use handle::BusHandle;
pub use hardware::{BusEvent, BusHardware, Control, StatusCode};
pub use manager::I2cManager;
pub use mux::MuxPhase;
pub use request::{Operation, Request, Transfer};
