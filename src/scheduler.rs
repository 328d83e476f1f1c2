//! Frame scheduling for the progress engine
//!
//! This module provides:
//! - A monotonic millisecond clock abstraction (real and manual)
//! - Frame ticks paced at roughly 60Hz, either aligned to the render loop's
//!   frame grid or driven by a fixed-delay timer
//! - One-shot fixed-delay timers for intervals and deadlines
//!
//! Ticks are not pushed to callbacks. The host loop pulls due ticks with
//! [`FrameScheduler::take_due`] and routes them by [`TickHandle`].

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic timestamp in milliseconds
pub type Timestamp = f64;

/// Duration of one display frame at 60Hz
pub const FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

/// Source of monotonic time
pub trait Clock {
    fn now_ms(&self) -> Timestamp;
}

/// Wall clock measured from the moment it was created
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Settable clock shared between a scheduler and whoever drives it
///
/// Clones observe the same time, so a test (or the virtual-time runner)
/// can hold one handle while the scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Timestamp>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: Timestamp) -> Self {
        let clock = Self::new();
        clock.set(ms);
        clock
    }

    /// Move the clock forward. Negative steps are ignored.
    pub fn advance(&self, ms: f64) {
        if ms > 0.0 {
            self.now.set(self.now.get() + ms);
        }
    }

    /// Jump to an absolute time; the clock never runs backwards
    pub fn set(&self, ms: Timestamp) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.get()
    }
}

/// How frame ticks are paced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSource {
    /// Pick `Native` when a renderer paces frames, `Timer` otherwise
    #[default]
    Auto,
    /// Align ticks to the renderer's 60Hz frame grid
    Native,
    /// Fire a fixed frame interval after each request
    Timer,
}

impl FrameSource {
    /// Resolve `Auto` into a concrete source
    pub fn resolve(self, renderer_attached: bool) -> Self {
        match self {
            FrameSource::Auto if renderer_attached => FrameSource::Native,
            FrameSource::Auto => FrameSource::Timer,
            other => other,
        }
    }
}

impl fmt::Display for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSource::Auto => write!(f, "auto"),
            FrameSource::Native => write!(f, "native"),
            FrameSource::Timer => write!(f, "timer"),
        }
    }
}

impl std::str::FromStr for FrameSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(FrameSource::Auto),
            "native" => Ok(FrameSource::Native),
            "timer" => Ok(FrameSource::Timer),
            other => Err(format!("unknown frame source: {}", other)),
        }
    }
}

/// Identifies one scheduled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A tick that has come due
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub handle: TickHandle,
    pub timestamp: Timestamp,
}

/// Single-threaded tick queue
pub struct FrameScheduler {
    clock: Box<dyn Clock>,
    source: FrameSource,
    origin: Timestamp,
    pending: BTreeMap<TickHandle, Timestamp>,
    next_id: u64,
}

impl FrameScheduler {
    /// Create a scheduler; `Auto` sources resolve to `Timer` here
    pub fn new(clock: Box<dyn Clock>, source: FrameSource) -> Self {
        let origin = clock.now_ms();
        Self {
            clock,
            source: source.resolve(false),
            origin,
            pending: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Scheduler on the wall clock
    pub fn system(source: FrameSource) -> Self {
        Self::new(Box::new(SystemClock::new()), source)
    }

    /// Scheduler on a shared manual clock
    pub fn manual(clock: &ManualClock, source: FrameSource) -> Self {
        Self::new(Box::new(clock.clone()), source)
    }

    pub fn source(&self) -> FrameSource {
        self.source
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    /// Schedule one tick roughly one display frame from now
    pub fn request_tick(&mut self) -> TickHandle {
        let now = self.now();
        let deadline = match self.source {
            FrameSource::Native => self.next_frame_boundary(now),
            FrameSource::Auto | FrameSource::Timer => now + FRAME_INTERVAL_MS,
        };
        self.insert(deadline)
    }

    /// Schedule one tick `delay_ms` from now
    pub fn request_timer(&mut self, delay_ms: f64) -> TickHandle {
        let deadline = self.now() + delay_ms.max(1.0);
        self.insert(deadline)
    }

    /// Cancel a scheduled tick. Unknown or already fired handles are ignored.
    pub fn cancel_tick(&mut self, handle: TickHandle) {
        self.pending.remove(&handle);
    }

    pub fn is_pending(&self, handle: TickHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest deadline among pending ticks
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.pending.values().copied().reduce(f64::min)
    }

    /// Remove and return the earliest due tick
    ///
    /// Among equal deadlines the oldest request wins.
    pub fn take_due(&mut self) -> Option<Tick> {
        let now = self.now();
        let (handle, _) = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .min_by(|a, b| a.1.total_cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(handle, deadline)| (*handle, *deadline))?;
        self.pending.remove(&handle);
        Some(Tick {
            handle,
            timestamp: now,
        })
    }

    fn insert(&mut self, deadline: Timestamp) -> TickHandle {
        let handle = TickHandle(self.next_id);
        self.next_id += 1;
        self.pending.insert(handle, deadline);
        handle
    }

    fn next_frame_boundary(&self, now: Timestamp) -> Timestamp {
        let frames = ((now - self.origin) / FRAME_INTERVAL_MS).floor() + 1.0;
        let boundary = self.origin + frames * FRAME_INTERVAL_MS;
        // float rounding can land exactly on `now`
        if boundary <= now + 1e-9 {
            boundary + FRAME_INTERVAL_MS
        } else {
            boundary
        }
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("source", &self.source)
            .field("origin", &self.origin)
            .field("pending", &self.pending.len())
            .finish()
    }
}
