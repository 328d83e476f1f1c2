//! Frame-driven animation sessions
//!
//! An [`AnimationDriver`] keeps exactly one tick in flight on a
//! [`FrameScheduler`] and turns each due tick into a [`DriverEvent`] with
//! timing information. Handling a tick is split in two so the owner can
//! mutate itself (and the scheduler) between the steps:
//!
//! ```text
//! let event = driver.begin(tick)?;   // timing for this frame
//! owner.react(&event, &mut stop);    // may call stop.stop()
//! driver.finish(scheduler, &stop);   // schedules the next frame
//! ```

use crate::scheduler::{FrameScheduler, Tick, TickHandle, Timestamp};

/// Delta reported on the first tick of a session, one frame at 60Hz
pub const FIRST_FRAME_DELTA_MS: f64 = 17.0;

/// Timing for one animation frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInfo {
    /// Timestamp of this tick
    pub current: Timestamp,
    /// Timestamp of the previous tick (equal to `start` on the first tick)
    pub previous: Timestamp,
    /// Timestamp of the first tick of the session
    pub start: Timestamp,
    /// Milliseconds since the previous tick
    pub delta: f64,
    /// Milliseconds since the session started
    pub elapsed: f64,
    pub duration_reached: bool,
    first: bool,
}

impl TickInfo {
    pub fn is_first(&self) -> bool {
        self.first
    }
}

/// What a due tick means for the session owner
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverEvent {
    /// Regular frame
    Tick(TickInfo),
    /// Final frame of an auto-stopping session
    End(TickInfo),
}

impl DriverEvent {
    pub fn info(&self) -> &TickInfo {
        match self {
            DriverEvent::Tick(info) | DriverEvent::End(info) => info,
        }
    }
}

/// Stop request raised from inside a tick handler
#[derive(Debug, Default, Clone, Copy)]
pub struct Stop {
    requested: bool,
}

impl Stop {
    /// Cancel further ticks; calling it again has no further effect
    pub fn stop(&mut self) {
        self.requested = true;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }
}

/// One animation session
#[derive(Debug, Clone)]
pub struct AnimationDriver {
    duration_ms: f64,
    auto_stop: bool,
    start: Option<Timestamp>,
    previous: Timestamp,
    pending: Option<TickHandle>,
    active: bool,
}

impl AnimationDriver {
    /// Create an active session without scheduling anything yet
    pub fn new(duration_ms: f64, auto_stop: bool) -> Self {
        Self {
            duration_ms,
            auto_stop,
            start: None,
            previous: 0.0,
            pending: None,
            active: true,
        }
    }

    /// Create a session and request its first tick
    pub fn launch(scheduler: &mut FrameScheduler, duration_ms: f64, auto_stop: bool) -> Self {
        let mut driver = Self::new(duration_ms, auto_stop);
        driver.pending = Some(scheduler.request_tick());
        driver
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether `handle` is the tick this session is waiting for
    pub fn owns(&self, handle: TickHandle) -> bool {
        self.pending == Some(handle)
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Compute the event for a due tick
    ///
    /// Returns `None` for ticks this session does not own, including a
    /// tick that was already scheduled when the session was stopped.
    pub fn begin(&mut self, tick: Tick) -> Option<DriverEvent> {
        if !self.active || !self.owns(tick.handle) {
            return None;
        }
        self.pending = None;
        Some(self.event_at(tick.timestamp))
    }

    /// Process one tick synchronously at the scheduler's current time
    ///
    /// The tick already in flight is cancelled; `finish` schedules a fresh one.
    pub fn begin_now(&mut self, scheduler: &mut FrameScheduler) -> Option<DriverEvent> {
        if !self.active {
            return None;
        }
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_tick(handle);
        }
        Some(self.event_at(scheduler.now()))
    }

    /// Close out a tick started with `begin` or `begin_now`
    pub fn finish(&mut self, scheduler: &mut FrameScheduler, stop: &Stop) {
        if stop.is_requested() {
            self.stop(scheduler);
            return;
        }
        if self.active && self.pending.is_none() {
            self.pending = Some(scheduler.request_tick());
        }
    }

    /// Run a due tick through a closure handler
    ///
    /// Returns whether the tick belonged to this session.
    pub fn fire<F>(&mut self, scheduler: &mut FrameScheduler, tick: Tick, handler: F) -> bool
    where
        F: FnOnce(DriverEvent, &mut Stop),
    {
        let Some(event) = self.begin(tick) else {
            return false;
        };
        let mut stop = Stop::default();
        handler(event, &mut stop);
        self.finish(scheduler, &stop);
        true
    }

    /// Stop the session. Idempotent.
    pub fn stop(&mut self, scheduler: &mut FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_tick(handle);
        }
        self.active = false;
    }

    fn event_at(&mut self, timestamp: Timestamp) -> DriverEvent {
        let first = self.start.is_none();
        let start = *self.start.get_or_insert(timestamp);
        let previous = if first { start } else { self.previous };
        let delta = if first {
            FIRST_FRAME_DELTA_MS
        } else {
            timestamp - previous
        };
        let elapsed = timestamp - start;
        let info = TickInfo {
            current: timestamp,
            previous,
            start,
            delta,
            elapsed,
            duration_reached: elapsed >= self.duration_ms,
            first,
        };
        self.previous = timestamp;

        if self.auto_stop && info.duration_reached {
            self.active = false;
            DriverEvent::End(info)
        } else {
            DriverEvent::Tick(info)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{FrameSource, ManualClock};

    fn due(clock: &ManualClock, scheduler: &mut FrameScheduler) -> Tick {
        let deadline = scheduler.next_deadline().expect("a tick should be pending");
        clock.set(deadline);
        scheduler.take_due().expect("tick should be due")
    }

    #[test]
    fn test_first_tick_uses_one_frame_delta() {
        let clock = ManualClock::new();
        let mut scheduler = FrameScheduler::manual(&clock, FrameSource::Timer);
        let mut driver = AnimationDriver::launch(&mut scheduler, 1000.0, true);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let tick = due(&clock, &mut scheduler);
            assert!(driver.fire(&mut scheduler, tick, |event, _| seen.push(*event.info())));
        }

        assert_eq!(seen[0].delta, FIRST_FRAME_DELTA_MS);
        assert!(seen[0].is_first());
        assert!((seen[1].delta - seen[1].current + seen[0].current).abs() < 1e-9);
        assert!(seen[2].elapsed > seen[1].elapsed);
        assert!(!seen[2].duration_reached);
    }

    #[test]
    fn test_auto_stop_emits_end_once() {
        let clock = ManualClock::new();
        let mut scheduler = FrameScheduler::manual(&clock, FrameSource::Timer);
        let mut driver = AnimationDriver::launch(&mut scheduler, 50.0, true);

        let mut ticks = 0;
        let mut ends = 0;
        while scheduler.next_deadline().is_some() {
            let tick = due(&clock, &mut scheduler);
            driver.fire(&mut scheduler, tick, |event, _| match event {
                DriverEvent::Tick(_) => ticks += 1,
                DriverEvent::End(info) => {
                    assert!(info.duration_reached);
                    ends += 1;
                }
            });
        }

        assert_eq!(ends, 1);
        assert!(ticks >= 3);
        assert!(!driver.is_active());
    }

    #[test]
    fn test_manual_session_runs_until_stopped() {
        let clock = ManualClock::new();
        let mut scheduler = FrameScheduler::manual(&clock, FrameSource::Timer);
        let mut driver = AnimationDriver::launch(&mut scheduler, 20.0, false);

        let mut count = 0;
        for _ in 0..10 {
            let tick = due(&clock, &mut scheduler);
            driver.fire(&mut scheduler, tick, |event, stop| {
                assert!(matches!(event, DriverEvent::Tick(_)));
                count += 1;
                if count == 10 {
                    stop.stop();
                    stop.stop();
                }
            });
            assert!(scheduler.pending_count() <= 1);
        }

        assert_eq!(count, 10);
        assert!(!driver.is_active());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_stale_tick_after_stop_is_ignored() {
        let clock = ManualClock::new();
        let mut scheduler = FrameScheduler::manual(&clock, FrameSource::Timer);
        let mut driver = AnimationDriver::launch(&mut scheduler, 100.0, false);

        clock.advance(20.0);
        let stale = scheduler.take_due().unwrap();
        driver.stop(&mut scheduler);
        driver.stop(&mut scheduler);

        assert!(!driver.fire(&mut scheduler, stale, |_, _| panic!("stopped session fired")));
    }

    #[test]
    fn test_begin_now_replaces_tick_in_flight() {
        let clock = ManualClock::new();
        let mut scheduler = FrameScheduler::manual(&clock, FrameSource::Timer);
        let mut driver = AnimationDriver::launch(&mut scheduler, 100.0, false);
        assert_eq!(scheduler.pending_count(), 1);

        clock.advance(5.0);
        let event = driver.begin_now(&mut scheduler).unwrap();
        assert!(event.info().is_first());
        assert_eq!(scheduler.pending_count(), 0);

        driver.finish(&mut scheduler, &Stop::default());
        assert_eq!(scheduler.pending_count(), 1);
    }
}
