use core::cell::RefCell;

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::address::{I2cAddress, MuxNumber, SubBus};
use crate::clock::BitRate;
use crate::config::Config;
use crate::engine::{Action, Engine, EngineState, Progress, RELEASED};
use crate::error::Error;
use crate::hardware::{BusEvent, BusHardware, Control};
use crate::queue::RequestQueue;
use crate::request::Request;

/// Queued, non-blocking transaction manager for one bus.
///
/// Requests are executed one at a time in submission order. The engine
/// advances one step per hardware event, delivered either by the
/// peripheral's interrupt handler calling [`handle_event`](Self::handle_event)
/// or, without interrupts, by whoever waits calling [`poll`](Self::poll).
///
/// Each step runs with the manager's mutex held. With
/// `CriticalSectionRawMutex` a step therefore cannot be interrupted by the
/// next bus event.
pub struct I2cManager<'a, M: RawMutex, H: BusHardware> {
    inner: Mutex<M, RefCell<Inner<'a, M, H>>>,
}

struct Inner<'a, M: RawMutex, H: BusHardware> {
    hardware: H,
    engine: Engine,
    queue: RequestQueue<'a, M>,
    current: Option<&'a Request<'a, M>>,
    config: Config,
    /// Set by `force_clock`; later `set_clock` calls are ignored.
    clock_pinned: bool,
}

impl<'a, M: RawMutex, H: BusHardware> I2cManager<'a, M, H> {
    pub const fn new(hardware: H, config: Config) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                hardware,
                engine: Engine::new(config.interrupts, config.mux_count),
                queue: RequestQueue::new(),
                current: None,
                config,
                clock_pinned: false,
            })),
        }
    }

    /// Programs the bit rate and leaves the peripheral disabled with the data
    /// line released. The first submission enables it.
    pub fn begin(&self) {
        self.with_inner(|inner| {
            let rate = inner.bit_rate();
            info!(
                "i2c: {} Hz bus (divisor {}, prescaler {})",
                rate.frequency(inner.config.reference_clock),
                rate.divisor,
                rate.prescaler
            );
            inner.hardware.set_bit_rate(rate);
            inner.hardware.write_data(RELEASED);
            inner.hardware.write_control(Control::empty());
        })
    }

    /// Disables the peripheral.
    pub fn close(&self) {
        self.with_inner(|inner| inner.hardware.write_control(Control::empty()))
    }

    /// Requests a bus clock of at most `hz`. The bus runs at the slowest
    /// speed asked for, so requests faster than the current clock are
    /// ignored, as are all requests after [`force_clock`](Self::force_clock).
    pub fn set_clock(&self, hz: u32) {
        self.with_inner(|inner| {
            if !inner.clock_pinned && hz < inner.config.bus_frequency {
                inner.apply_clock(hz);
            }
        })
    }

    /// Sets the bus clock unconditionally and pins it.
    pub fn force_clock(&self, hz: u32) {
        self.with_inner(|inner| {
            inner.clock_pinned = true;
            inner.apply_clock(hz);
        })
    }

    pub fn bus_frequency(&self) -> u32 {
        self.with_inner(|inner| inner.config.bus_frequency)
    }

    pub fn mux_count(&self) -> u8 {
        self.with_inner(|inner| inner.engine.mux_count())
    }

    /// Applies from the next transaction.
    pub fn set_mux_count(&self, mux_count: u8) {
        self.with_inner(|inner| inner.engine.set_mux_count(mux_count))
    }

    pub fn is_idle(&self) -> bool {
        self.with_inner(|inner| inner.engine.is_idle())
    }

    /// Requests waiting behind the current one.
    pub fn queued(&self) -> usize {
        self.with_inner(|inner| inner.queue.len())
    }

    /// Counters of the current (or last finished) transaction.
    pub fn progress(&self) -> Progress {
        self.with_inner(|inner| inner.engine.progress())
    }

    /// Queues `request` and returns immediately. When the bus is idle the
    /// request starts at once.
    ///
    /// Fails with [`Error::Busy`] if the request is still queued or current.
    pub fn submit(&self, request: &'a Request<'a, M>) -> Result<(), Error> {
        self.with_inner(|inner| inner.submit(request))
    }

    /// Queues `request` and blocks until it completes, polling the engine
    /// while waiting.
    pub fn submit_and_wait(&self, request: &Request<'_, M>) -> Result<(), Error> {
        // SAFETY: the queue and `current` hold `&'a` references, but this
        // request is only borrowed for the call. `Release` does not return
        // (not even while unwinding) until the engine has completed the
        // request, and completion unlinks it from the queue and clears
        // `current` under the same lock. No reference outlives the borrow.
        let request = unsafe {
            core::mem::transmute::<&Request<'_, M>, &'a Request<'a, M>>(request)
        };
        self.submit(request)?;
        drop(Release { manager: self, request });
        request.status().into_result()
    }

    /// Queues `request` and waits for it asynchronously.
    ///
    /// With interrupts the waiter sleeps on the request's completion signal;
    /// otherwise it polls the engine and yields between steps.
    pub async fn transfer(&self, request: &'a Request<'a, M>) -> Result<(), Error> {
        self.submit(request)?;
        if self.with_inner(|inner| inner.config.interrupts) {
            return request.wait().await.into_result();
        }
        while self.holds(request) {
            self.handle_event();
            yield_now().await;
        }
        request.status().into_result()
    }

    /// Runs one state-machine step if the hardware has an event pending;
    /// otherwise does nothing. Call from the bus interrupt handler.
    pub fn handle_event(&self) {
        self.with_inner(Inner::service)
    }

    /// Main-loop entry point for builds without bus interrupts.
    pub fn poll(&self) {
        self.handle_event()
    }

    pub fn write(
        &self,
        address: impl Into<I2cAddress>,
        data: &[u8],
    ) -> Result<(), Error> {
        self.submit_and_wait(&Request::write(address.into(), data))
    }

    pub fn write_static(
        &self,
        address: impl Into<I2cAddress>,
        data: &'static [u8],
    ) -> Result<(), Error> {
        self.submit_and_wait(&Request::write_static(address.into(), data))
    }

    pub fn read(
        &self,
        address: impl Into<I2cAddress>,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.submit_and_wait(&Request::read(address.into(), buffer))
    }

    pub fn write_read(
        &self,
        address: impl Into<I2cAddress>,
        data: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.submit_and_wait(&Request::write_read(address.into(), data, buffer))
    }

    /// True if a device acknowledges `address`.
    pub fn probe(&self, address: impl Into<I2cAddress>) -> bool {
        self.submit_and_wait(&Request::probe(address.into())).is_ok()
    }

    /// Probes the eight multiplexer addresses, deselects every sub-bus on
    /// each mux that answers and records how many were found.
    pub fn discover_muxes(&self) -> u8 {
        let mut found = 0;
        for mux in MuxNumber::ALL {
            if !self.probe(mux.address()) {
                continue;
            }
            found += 1;
            let deselect = I2cAddress::mux_only(mux, SubBus::None);
            if let Err(_e) = self.write(deselect, &[]) {
                warn!("i2c: deselecting mux {} failed: {}", mux, _e);
            }
        }
        info!("i2c: {} multiplexer(s)", found);
        self.set_mux_count(found);
        found
    }

    /// True while the engine may still touch `request`.
    fn holds(&self, request: &Request<'_, M>) -> bool {
        self.with_inner(|_| request.is_busy())
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<'a, M, H>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Blocks in `drop` until the engine has released the request.
struct Release<'m, 'a, M: RawMutex, H: BusHardware> {
    manager: &'m I2cManager<'a, M, H>,
    request: &'a Request<'a, M>,
}

impl<M: RawMutex, H: BusHardware> Drop for Release<'_, '_, M, H> {
    fn drop(&mut self) {
        while self.manager.holds(self.request) {
            self.manager.handle_event();
            core::hint::spin_loop();
        }
    }
}

impl<'a, M: RawMutex, H: BusHardware> Inner<'a, M, H> {
    fn bit_rate(&self) -> BitRate {
        BitRate::for_frequency(
            self.config.reference_clock,
            self.config.bus_frequency,
        )
    }

    fn apply_clock(&mut self, hz: u32) {
        self.config.bus_frequency = hz;
        let rate = self.bit_rate();
        debug!("i2c: clock {} Hz", rate.frequency(self.config.reference_clock));
        self.hardware.set_bit_rate(rate);
    }

    fn submit(&mut self, request: &'a Request<'a, M>) -> Result<(), Error> {
        if request.is_busy() {
            return Err(Error::Busy);
        }
        request.mark_pending();
        trace!("i2c: queue {}", request.address());
        self.queue.enqueue(request);
        if self.engine.is_idle() {
            self.start_next();
        }
        Ok(())
    }

    /// Promotes the head of the queue and issues its start condition, or
    /// goes idle when the queue is empty.
    fn start_next(&mut self) {
        let Some(request) = self.queue.dequeue() else {
            self.engine.idle();
            return;
        };
        trace!("i2c: start {}", request.address());
        self.current = Some(request);
        let action = request.with_transfer(|transfer| self.engine.start(transfer));
        self.apply(action);
    }

    fn service(&mut self) {
        if !self.hardware.event_pending() {
            return;
        }
        let Some(request) = self.current else {
            trace!("i2c: event with no request in flight");
            return;
        };

        let code = self.hardware.status();
        let hardware = &self.hardware;
        let event = BusEvent::decode(code, || hardware.read_data());
        let action =
            request.with_transfer(|transfer| self.engine.step(transfer, event));
        self.apply(action);

        if self.engine.state() == EngineState::Completed {
            self.complete();
        }
    }

    /// Stamps the finished request, wakes its waiter and moves on to the
    /// next one.
    fn complete(&mut self) {
        let status = self.engine.completion_status();
        if let Some(request) = self.current.take() {
            debug!("i2c: {} finished: {}", request.address(), status);
            request.complete(status);
        }
        self.start_next();
    }

    fn apply(&mut self, action: Action) {
        if let Some(byte) = action.data {
            self.hardware.write_data(byte);
        }
        self.hardware.write_control(action.control);
    }
}
