//! Hardware state poller — fixed-cadence controller fact fetching.
//!
//! One spawned task per started poller, driven by the screen's
//! `edge_executor::LocalExecutor` and `async-io-mini` reactor timers.
//!
//! ```text
//!   start() ──▶ ┌─────────────────────────── poll loop (gen N) ───────┐
//!               │ cycle: zip(count, pe, busy, timeout)  each ≤ fetch_timeout
//!               │   all Ok  ──▶ sink.publish(snapshot)                │
//!               │   any Err ──▶ warn (token bucket), keep previous    │
//!               │ cadence: wait for next due tick, skip missed ticks  │
//!               │ or(stop signal, timer) ──▶ exit on stop             │
//!               └─────────────────────────────────────────────────────┘
//!   stop()  ──▶ generation += 1, signal; a stale cycle never publishes
//! ```
//!
//! A cycle that is still awaiting its fetches when the next tick comes due
//! simply makes the loop late; the missed tick is dropped, never queued.
//! A manual [`poll_cycle`](HardwareStatePoller::poll_cycle) while a cycle
//! is in flight returns [`CycleOutcome::Skipped`] without touching the
//! controller.

use core::cell::{Cell, RefCell};
use core::future::Future;
use core::time::Duration;
use std::rc::Rc;
use std::time::Instant;

use burster::Limiter;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, error, info, warn};

use crate::app::ports::ControllerPort;
use crate::config::KioskConfig;
use crate::error::ControllerError;
use crate::model::{HardwareFact, HardwareSnapshot};

// ── Configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between cycle starts.
    pub interval: Duration,
    /// Upper bound on each individual fetch.
    pub fetch_timeout: Duration,
    /// Consecutive failed cycles before a one-shot `error!`.
    pub failure_warn_cycles: u16,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::from(&KioskConfig::default())
    }
}

impl From<&KioskConfig> for PollerConfig {
    fn from(cfg: &KioskConfig) -> Self {
        Self {
            interval: cfg.poll_interval(),
            fetch_timeout: cfg.fetch_timeout(),
            failure_warn_cycles: cfg.failure_warn_cycles,
        }
    }
}

// ── Sink + outcomes ──────────────────────────────────────────

/// Receiver of complete snapshots.
pub trait SnapshotSink {
    fn publish(&self, snapshot: HardwareSnapshot);
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// All four facts fetched; snapshot handed to the sink.
    Published(HardwareSnapshot),
    /// At least one fetch failed; `failed` is a [`HardwareFact`] mask.
    /// The previous snapshot stays in effect.
    Retained { failed: u8 },
    /// Another cycle was already in flight.
    Skipped,
    /// The poller was stopped or restarted while fetching.
    Stopped,
}

/// Running counters, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub published: u64,
    pub failed_cycles: u64,
    /// Manual cycles refused by the in-flight guard.
    pub skipped_cycles: u64,
    /// Cadence ticks dropped because a cycle ran long.
    pub missed_ticks: u64,
    /// Cycles that finished fetching after a stop or restart and were
    /// thrown away unpublished.
    pub discarded_cycles: u64,
    pub consecutive_failures: u16,
    pub suppressed_warnings: u64,
}

// ── Cadence ──────────────────────────────────────────────────

/// Tick schedule relative to the loop's start.  Ticks that elapse while
/// a cycle is running are skipped, never bunched up.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval: Duration,
    next_due: Duration,
}

impl Cadence {
    /// First tick is due one interval after `start`.
    pub fn new(start: Duration, interval: Duration) -> Self {
        Self {
            interval,
            next_due: start + interval,
        }
    }

    /// Consume the next tick as of `now`.  Returns its deadline and the
    /// number of ticks whose deadline had already passed.
    pub fn advance(&mut self, now: Duration) -> (Duration, u32) {
        let mut missed = 0u32;
        if now > self.next_due {
            let behind = (now - self.next_due).as_nanos();
            let step = self.interval.as_nanos().max(1);
            missed = u32::try_from(behind.div_ceil(step)).unwrap_or(u32::MAX);
            self.next_due += self.interval.saturating_mul(missed);
        }
        let due = self.next_due;
        self.next_due += self.interval;
        (due, missed)
    }
}

// ── Poller ───────────────────────────────────────────────────

/// Cells shared by every handle and the spawned loop.
struct PollerShared {
    running: Cell<bool>,
    generation: Cell<u32>,
    in_flight: Cell<bool>,
    stop: RefCell<Option<Rc<Signal<NoopRawMutex, ()>>>>,
    stats: Cell<PollStats>,
    warn_limiter: RefCell<burster::TokenBucket<fn() -> Duration>>,
}

/// Clears the in-flight flag even if the cycle future is dropped.
struct InFlight<'a>(&'a Cell<bool>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct HardwareStatePoller<C> {
    controller: Rc<C>,
    config: PollerConfig,
    shared: Rc<PollerShared>,
}

impl<C> Clone for HardwareStatePoller<C> {
    fn clone(&self) -> Self {
        Self {
            controller: Rc::clone(&self.controller),
            config: self.config,
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<C: ControllerPort> HardwareStatePoller<C> {
    pub fn new(controller: Rc<C>, config: PollerConfig) -> Self {
        Self {
            controller,
            config,
            shared: Rc::new(PollerShared {
                running: Cell::new(false),
                generation: Cell::new(0),
                in_flight: Cell::new(false),
                stop: RefCell::new(None),
                stats: Cell::new(PollStats::default()),
                warn_limiter: RefCell::new(burster::TokenBucket::new_with_time_provider(
                    1,
                    4, // 1 warning per second, burst of 4 (one per fact)
                    monotonic_now as fn() -> Duration,
                )),
            }),
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.get()
    }

    pub fn stats(&self) -> PollStats {
        self.shared.stats.get()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Spawn the poll loop on `executor`.  The first cycle runs right
    /// away.  No-op if a loop is already running.
    pub fn start<'a, const N: usize, S>(
        &self,
        executor: &edge_executor::LocalExecutor<'a, N>,
        sink: Rc<S>,
    ) where
        C: 'a,
        S: SnapshotSink + ?Sized + 'a,
    {
        if self.shared.running.get() {
            warn!("poller: start ignored, already running");
            return;
        }
        let generation = self.shared.generation.get().wrapping_add(1);
        self.shared.generation.set(generation);
        let stop = Rc::new(Signal::new());
        self.shared.stop.replace(Some(Rc::clone(&stop)));
        self.shared.running.set(true);

        executor
            .spawn(self.clone().run_loop(sink, generation, stop))
            .detach();

        info!(
            "poller: started gen={} interval={}ms timeout={}ms",
            generation,
            self.config.interval.as_millis(),
            self.config.fetch_timeout.as_millis()
        );
    }

    /// Cancel the loop.  After this returns no cycle that is already
    /// running will publish.
    pub fn stop(&self) {
        if !self.shared.running.replace(false) {
            return;
        }
        self.shared
            .generation
            .set(self.shared.generation.get().wrapping_add(1));
        if let Some(signal) = self.shared.stop.take() {
            signal.signal(());
        }
        info!("poller: stopped");
    }

    // ── Cycles ────────────────────────────────────────────────

    /// Run one cycle now, outside the cadence.
    pub async fn poll_cycle<S: SnapshotSink + ?Sized>(&self, sink: &S) -> CycleOutcome {
        self.run_cycle(sink, self.shared.generation.get()).await
    }

    async fn run_loop<S: SnapshotSink + ?Sized>(
        self,
        sink: Rc<S>,
        generation: u32,
        stop: Rc<Signal<NoopRawMutex, ()>>,
    ) {
        let origin = Instant::now();
        let mut cadence = Cadence::new(Duration::ZERO, self.config.interval);

        while self.is_current(generation) {
            self.run_cycle(&*sink, generation).await;

            let (due, missed) = cadence.advance(origin.elapsed());
            if missed > 0 {
                debug!("poller: cycle overran, {} tick(s) skipped", missed);
                self.update_stats(|s| s.missed_ticks += u64::from(missed));
            }

            let wait = due.saturating_sub(origin.elapsed());
            let stopped = future::or(
                async {
                    stop.wait().await;
                    true
                },
                async {
                    async_io_mini::Timer::after(wait).await;
                    false
                },
            )
            .await;
            if stopped {
                break;
            }
        }
        debug!("poller: loop gen={} exited", generation);
    }

    async fn run_cycle<S: SnapshotSink + ?Sized>(&self, sink: &S, generation: u32) -> CycleOutcome {
        if self.shared.in_flight.get() {
            self.update_stats(|s| s.skipped_cycles += 1);
            debug!("poller: cycle skipped, previous still in flight");
            return CycleOutcome::Skipped;
        }

        let (count, pe, busy, timed_out) = {
            self.shared.in_flight.set(true);
            let _guard = InFlight(&self.shared.in_flight);
            let limit = self.config.fetch_timeout;
            let c = &*self.controller;
            let (count, (pe, (busy, timed_out))) = future::zip(
                with_timeout(limit, c.get_dispense_count()),
                future::zip(
                    with_timeout(limit, c.get_pe_blocked()),
                    future::zip(
                        with_timeout(limit, c.dispenser_is_busy()),
                        with_timeout(limit, c.dispenser_has_timed_out()),
                    ),
                ),
            )
            .await;
            (count, pe, busy, timed_out)
        };

        if !self.is_current(generation) {
            self.update_stats(|s| s.discarded_cycles += 1);
            debug!("poller: discarding cycle from stale gen={}", generation);
            return CycleOutcome::Stopped;
        }

        let mut failed = 0u8;
        let dispense_count = self.check(HardwareFact::DispenseCount, count, &mut failed);
        let bowl_present = self.check(HardwareFact::BowlPresence, pe, &mut failed);
        let dispenser_busy = self.check(HardwareFact::DispenserBusy, busy, &mut failed);
        let hopper_empty = self.check(HardwareFact::HopperTimeout, timed_out, &mut failed);

        match (dispense_count, bowl_present, dispenser_busy, hopper_empty) {
            (Some(dispense_count), Some(bowl_present), Some(dispenser_busy), Some(hopper_empty)) => {
                let snapshot = HardwareSnapshot {
                    bowl_present,
                    dispenser_busy,
                    hopper_empty,
                    dispense_count,
                };
                self.record_success();
                sink.publish(snapshot);
                CycleOutcome::Published(snapshot)
            }
            _ => {
                self.record_failure();
                CycleOutcome::Retained { failed }
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn is_current(&self, generation: u32) -> bool {
        self.shared.generation.get() == generation
    }

    fn update_stats(&self, f: impl FnOnce(&mut PollStats)) {
        let mut stats = self.shared.stats.get();
        f(&mut stats);
        self.shared.stats.set(stats);
    }

    fn check<T>(
        &self,
        fact: HardwareFact,
        result: Result<T, ControllerError>,
        failed: &mut u8,
    ) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                *failed |= fact.mask();
                if self.shared.warn_limiter.borrow_mut().try_consume(1).is_ok() {
                    warn!("poller: {} fetch failed: {}", fact.name(), e);
                } else {
                    self.update_stats(|s| s.suppressed_warnings += 1);
                }
                None
            }
        }
    }

    fn record_success(&self) {
        let previous = self.shared.stats.get().consecutive_failures;
        if previous >= self.config.failure_warn_cycles {
            info!("poller: controller recovered after {} failed cycles", previous);
        }
        self.update_stats(|s| {
            s.cycles += 1;
            s.published += 1;
            s.consecutive_failures = 0;
        });
    }

    fn record_failure(&self) {
        self.update_stats(|s| {
            s.cycles += 1;
            s.failed_cycles += 1;
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
        });
        let streak = self.shared.stats.get().consecutive_failures;
        if streak == self.config.failure_warn_cycles {
            error!(
                "poller: {} consecutive cycles failed, showing last known state",
                streak
            );
        }
    }
}

/// Bound a controller call; an elapsed timer counts as a transient failure.
pub async fn with_timeout<T>(
    limit: Duration,
    fetch: impl Future<Output = Result<T, ControllerError>>,
) -> Result<T, ControllerError> {
    future::or(fetch, async {
        async_io_mini::Timer::after(limit).await;
        Err(ControllerError::Timeout)
    })
    .await
}

pub(crate) fn monotonic_now() -> Duration {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
