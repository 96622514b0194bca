//! Transaction descriptors.
//!
//! A [`Transfer`] holds what to do; a [`Request`] wraps it with the state the
//! engine needs while the transfer is queued or current: the completion
//! status, the completion signal and the queue link.
//!
//! Between submission and completion the engine is the only writer of a
//! request. The submitter may poll [`Request::status`] at any time and reads
//! the received bytes once the status is no longer [`Status::Pending`].

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicU8, Ordering};

use crate::address::I2cAddress;
use crate::error::{Error, Status};

/// Kind of bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    Write,
    /// Write from constant data placed in read-only memory.
    WriteStatic,
    Read,
    /// Write, then repeated start and read (register access).
    WriteRead,
}

/// Addressing, operation kind and caller-owned buffers of one transaction.
#[derive(Debug)]
pub struct Transfer<'a> {
    address: I2cAddress,
    operation: Operation,
    write: &'a [u8],
    read: &'a mut [u8],
}

impl<'a> Transfer<'a> {
    pub const fn write(address: I2cAddress, data: &'a [u8]) -> Self {
        Self { address, operation: Operation::Write, write: data, read: &mut [] }
    }

    pub const fn write_static(address: I2cAddress, data: &'static [u8]) -> Self {
        Self {
            address,
            operation: Operation::WriteStatic,
            write: data,
            read: &mut [],
        }
    }

    pub const fn read(address: I2cAddress, buffer: &'a mut [u8]) -> Self {
        Self { address, operation: Operation::Read, write: &[], read: buffer }
    }

    pub const fn write_read(
        address: I2cAddress,
        data: &'a [u8],
        buffer: &'a mut [u8],
    ) -> Self {
        Self {
            address,
            operation: Operation::WriteRead,
            write: data,
            read: buffer,
        }
    }

    /// Zero-length write: addresses the device and stops.
    pub const fn probe(address: I2cAddress) -> Self {
        Self::write(address, &[])
    }

    pub const fn address(&self) -> I2cAddress {
        self.address
    }

    pub const fn operation(&self) -> Operation {
        self.operation
    }

    pub const fn write_len(&self) -> usize {
        match self.operation {
            Operation::Read => 0,
            _ => self.write.len(),
        }
    }

    pub const fn read_len(&self) -> usize {
        match self.operation {
            Operation::Read | Operation::WriteRead => self.read.len(),
            _ => 0,
        }
    }

    pub fn read_buffer(&self) -> &[u8] {
        &*self.read
    }

    /// Byte `index` of the write payload.
    pub(crate) fn write_byte(&self, index: usize) -> u8 {
        self.write.get(index).copied().unwrap_or(0xff)
    }

    pub(crate) fn store(&mut self, index: usize, byte: u8) {
        if let Some(slot) = self.read.get_mut(index) {
            *slot = byte;
        }
    }
}

/// A [`Transfer`] ready for submission to an [`I2cManager`](crate::I2cManager).
pub struct Request<'a, M: RawMutex> {
    transfer: Mutex<M, RefCell<Transfer<'a>>>,
    next: Mutex<M, Cell<Option<&'a Request<'a, M>>>>,
    status: AtomicU8,
    done: Signal<M, Status>,
}

impl<'a, M: RawMutex> Request<'a, M> {
    pub const fn new(transfer: Transfer<'a>) -> Self {
        Self {
            transfer: Mutex::new(RefCell::new(transfer)),
            next: Mutex::new(Cell::new(None)),
            status: AtomicU8::new(Status::Ok as u8),
            done: Signal::new(),
        }
    }

    pub const fn write(address: I2cAddress, data: &'a [u8]) -> Self {
        Self::new(Transfer::write(address, data))
    }

    pub const fn write_static(address: I2cAddress, data: &'static [u8]) -> Self {
        Self::new(Transfer::write_static(address, data))
    }

    pub const fn read(address: I2cAddress, buffer: &'a mut [u8]) -> Self {
        Self::new(Transfer::read(address, buffer))
    }

    pub const fn write_read(
        address: I2cAddress,
        data: &'a [u8],
        buffer: &'a mut [u8],
    ) -> Self {
        Self::new(Transfer::write_read(address, data, buffer))
    }

    pub const fn probe(address: I2cAddress) -> Self {
        Self::new(Transfer::probe(address))
    }

    /// Status of the last submission; [`Status::Ok`] before the first one.
    pub fn status(&self) -> Status {
        Status::try_from(self.status.load(Ordering::Acquire))
            .unwrap_or(Status::TransmitError)
    }

    pub fn is_busy(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn address(&self) -> I2cAddress {
        self.with_transfer(|t| t.address())
    }

    pub fn operation(&self) -> Operation {
        self.with_transfer(|t| t.operation())
    }

    /// Runs `f` over the read buffer.
    pub fn with_read_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.with_transfer(|t| f(t.read_buffer()))
    }

    /// Replaces the transfer of an idle request.
    pub fn reconfigure(&self, transfer: Transfer<'a>) -> Result<(), Error> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        self.with_transfer(|t| *t = transfer);
        Ok(())
    }

    /// Waits until the engine stamps this request.
    ///
    /// The engine must be driven by the hardware interrupt, or by another
    /// task polling the manager, for this to return.
    pub async fn wait(&self) -> Status {
        if !self.is_busy() {
            return self.status();
        }
        self.done.wait().await
    }

    pub(crate) fn with_transfer<R>(
        &self,
        f: impl FnOnce(&mut Transfer<'a>) -> R,
    ) -> R {
        self.transfer.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub(crate) fn mark_pending(&self) {
        self.done.reset();
        self.status.store(Status::Pending as u8, Ordering::Release);
    }

    pub(crate) fn complete(&self, status: Status) {
        self.status.store(status as u8, Ordering::Release);
        self.done.signal(status);
    }

    pub(crate) fn set_next(&self, next: Option<&'a Request<'a, M>>) {
        self.next.lock(|cell| cell.set(next));
    }

    pub(crate) fn next(&self) -> Option<&'a Request<'a, M>> {
        self.next.lock(|cell| cell.get())
    }

    pub(crate) fn take_next(&self) -> Option<&'a Request<'a, M>> {
        self.next.lock(|cell| cell.take())
    }
}
