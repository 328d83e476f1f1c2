//! The simulated progress bar
//!
//! [`ProgressBar`] owns the current percentage and animates it along a
//! three-phase curve: a fast start, a slow middle, and either a crawl that
//! waits for an explicit finish or a sprint to 100 once the finish has been
//! forced. Every public operation is routed through a [`LifecycleGate`], so
//! calls made before the mount point exists are replayed once it appears.
//!
//! The widget is single-threaded and never blocks. The host drives it by
//! feeding due scheduler ticks into [`ProgressBar::pump`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, info, trace, warn};

use super::callbacks::{Callbacks, Completion};
use super::command::Command;
use super::gate::LifecycleGate;
use super::phase::{PhaseThresholds, CRAWL_INTERVAL_MS};
use crate::animation::{AnimationDriver, DriverEvent, Stop, TickInfo};
use crate::config::{ProgressOptions, DEFAULT_FADE_MS};
use crate::scheduler::{FrameScheduler, ManualClock, Tick, TickHandle, Timestamp};
use crate::stage::{Display, Element, ElementId, NodeId, Stage};

/// How often a missing mount point is looked up again
pub const READINESS_POLL_MS: f64 = 10.0;

/// Where a run currently is on the simulated curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No run yet, or destroyed
    Idle,
    /// Fast or slow phase
    Running,
    /// Waiting for a forced finish
    SlowCrawl,
    /// Forced finish, heading to 100
    Sprint,
    /// Aborted by the timeout
    TimedOut,
    /// Reached 100
    Done,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::SlowCrawl => "waiting",
            RunStatus::Sprint => "finishing",
            RunStatus::TimedOut => "timed out",
            RunStatus::Done => "done",
        };
        f.write_str(label)
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy)]
struct RunState {
    thresholds: PhaseThresholds,
    started_at: Timestamp,
    timeout_ms: Option<f64>,
    duration_ms: f64,
    /// A forced finish already kicked this run
    finish_kicked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeDirection {
    In,
    Out,
}

struct Fade {
    driver: AnimationDriver,
    direction: FadeDirection,
    duration_ms: f64,
    opacity: f64,
    callback: Option<Completion>,
}

pub struct ProgressBar {
    options: ProgressOptions,
    callbacks: Callbacks,
    scheduler: FrameScheduler,
    stage: Stage,
    rng: StdRng,
    gate: LifecycleGate<Command>,
    container: Option<NodeId>,
    readiness_poll: Option<TickHandle>,
    element: Option<ElementId>,

    value: f64,
    running: bool,
    ended: bool,
    status: RunStatus,
    run: Option<RunState>,

    session: Option<AnimationDriver>,
    crawl: Option<TickHandle>,
    deadline: Option<TickHandle>,
    fade: Option<Fade>,
    destroyed: bool,
}

impl ProgressBar {
    /// Build a widget and mount it as soon as its container exists
    pub fn new(
        options: ProgressOptions,
        callbacks: Callbacks,
        stage: Stage,
        scheduler: FrameScheduler,
    ) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let container = stage.resolve(&options.container);
        let gate = if container.is_some() {
            LifecycleGate::opened()
        } else {
            LifecycleGate::new()
        };

        let mut bar = Self {
            options,
            callbacks,
            scheduler,
            stage,
            rng,
            gate,
            container,
            readiness_poll: None,
            element: None,
            value: 0.0,
            running: false,
            ended: false,
            status: RunStatus::Idle,
            run: None,
            session: None,
            crawl: None,
            deadline: None,
            fade: None,
            destroyed: false,
        };

        if bar.container.is_none() {
            debug!(
                "Container {} not available yet, deferring commands",
                bar.options.container
            );
            bar.readiness_poll = Some(bar.scheduler.request_timer(READINESS_POLL_MS));
        }
        bar.dispatch(Command::Init);
        bar
    }

    // Public operations. Each one becomes a `Command` and goes through the gate.

    /// Mount the element; also re-initializes after `destroy`
    pub fn init(&mut self) -> &mut Self {
        self.dispatch(Command::Init)
    }

    /// Set the displayed value, clamped to `[0, 100]`
    pub fn set_progress(&mut self, value: f64) -> &mut Self {
        self.dispatch(Command::SetProgress(value))
    }

    /// Start a simulated run; ignored while one is running
    pub fn start(&mut self, duration_ms: Option<u64>) -> &mut Self {
        self.dispatch(Command::Start(duration_ms))
    }

    /// Signal that the real work finished so the bar sprints to 100
    pub fn force_finish(&mut self) -> &mut Self {
        self.dispatch(Command::ForceFinish)
    }

    pub fn show(&mut self) -> &mut Self {
        self.dispatch(Command::Show)
    }

    pub fn hide(&mut self) -> &mut Self {
        self.dispatch(Command::Hide)
    }

    /// Fade a hidden element in over `duration_ms` (750 by default)
    pub fn fade_in(&mut self, duration_ms: Option<u64>) -> &mut Self {
        self.dispatch(Command::FadeIn {
            duration: duration_ms,
            callback: None,
        })
    }

    pub fn fade_in_then(
        &mut self,
        duration_ms: Option<u64>,
        callback: impl FnOnce() + 'static,
    ) -> &mut Self {
        self.dispatch(Command::FadeIn {
            duration: duration_ms,
            callback: Some(Box::new(callback)),
        })
    }

    /// Fade a visible element out over `duration_ms` (750 by default)
    pub fn fade_out(&mut self, duration_ms: Option<u64>) -> &mut Self {
        self.dispatch(Command::FadeOut {
            duration: duration_ms,
            callback: None,
        })
    }

    pub fn fade_out_then(
        &mut self,
        duration_ms: Option<u64>,
        callback: impl FnOnce() + 'static,
    ) -> &mut Self {
        self.dispatch(Command::FadeOut {
            duration: duration_ms,
            callback: Some(Box::new(callback)),
        })
    }

    /// Unmount the element and reset all state; the widget stays inert
    /// until `init` is called again
    pub fn destroy(&mut self) -> &mut Self {
        self.dispatch(Command::Destroy)
    }

    // Driving

    /// Route one due tick to whatever owns it
    pub fn handle_tick(&mut self, tick: Tick) {
        let handle = tick.handle;
        if self.readiness_poll == Some(handle) {
            self.readiness_poll = None;
            self.poll_container();
        } else if self.session.as_ref().is_some_and(|s| s.owns(handle)) {
            self.progress_frame(tick);
        } else if self.crawl == Some(handle) {
            self.crawl = None;
            self.crawl_step();
        } else if self.deadline == Some(handle) {
            self.deadline = None;
            self.deadline_reached();
        } else if self.fade.as_ref().is_some_and(|f| f.driver.owns(handle)) {
            self.fade_frame(tick);
        } else {
            trace!("Ignoring stale tick {}", handle.id());
        }
    }

    /// Handle every tick that is due now; returns how many fired
    pub fn pump(&mut self) -> usize {
        let mut fired = 0;
        while let Some(tick) = self.scheduler.take_due() {
            self.handle_tick(tick);
            fired += 1;
        }
        fired
    }

    /// Step a manual clock through `duration_ms`, firing ticks on their deadlines
    pub fn run_virtual(&mut self, clock: &ManualClock, duration_ms: f64) -> usize {
        let end = clock.now() + duration_ms.max(0.0);
        let mut fired = 0;
        while let Some(deadline) = self.scheduler.next_deadline() {
            if deadline > end {
                break;
            }
            clock.set(deadline);
            fired += self.pump();
        }
        clock.set(end);
        fired + self.pump()
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.scheduler.next_deadline()
    }

    pub fn now(&self) -> Timestamp {
        self.scheduler.now()
    }

    // Observation

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Thresholds of the current run
    pub fn thresholds(&self) -> Option<PhaseThresholds> {
        self.run.map(|run| run.thresholds)
    }

    /// Commands waiting for the mount point
    pub fn pending_commands(&self) -> usize {
        self.gate.pending()
    }

    /// Progress sessions alive: the frame driver or the crawl, never both
    pub fn active_sessions(&self) -> usize {
        usize::from(self.session.is_some()) + usize::from(self.crawl.is_some())
    }

    pub fn element_id(&self) -> Option<ElementId> {
        self.element
    }

    /// Snapshot of the mounted element
    pub fn element(&self) -> Option<Element> {
        self.element.and_then(|id| self.stage.element(id))
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn options(&self) -> &ProgressOptions {
        &self.options
    }

    // Dispatch

    fn dispatch(&mut self, command: Command) -> &mut Self {
        let name = command.name();
        match self.gate.admit(command) {
            Some(command) => self.execute(command),
            None => trace!("Queued {} until the container is ready", name),
        }
        self
    }

    fn execute(&mut self, command: Command) {
        if self.destroyed && !matches!(command, Command::Init) {
            debug!("Ignoring {} on a destroyed progress bar", command.name());
            return;
        }
        match command {
            Command::Init => self.mount(),
            Command::SetProgress(value) => self.apply_progress(value),
            Command::Start(duration) => self.begin_run(duration),
            Command::ForceFinish => self.finish_run(),
            Command::Show => self.set_visible(true),
            Command::Hide => self.set_visible(false),
            Command::FadeIn { duration, callback } => {
                self.begin_fade(FadeDirection::In, duration, callback)
            }
            Command::FadeOut { duration, callback } => {
                self.begin_fade(FadeDirection::Out, duration, callback)
            }
            Command::Destroy => self.teardown(),
        }
    }

    fn poll_container(&mut self) {
        match self.stage.resolve(&self.options.container) {
            Some(node) => {
                self.container = Some(node);
                self.callbacks.ready();
                let queued = self.gate.open();
                info!(
                    "Container {} ready, replaying {} queued commands",
                    self.options.container,
                    queued.len()
                );
                for command in queued {
                    self.execute(command);
                }
            }
            None => {
                self.readiness_poll = Some(self.scheduler.request_timer(READINESS_POLL_MS));
            }
        }
    }

    // Element

    fn mount(&mut self) {
        self.destroyed = false;
        if self.element.is_some() {
            return;
        }
        let Some(container) = self
            .container
            .or_else(|| self.stage.resolve(&self.options.container))
        else {
            warn!("Container {} disappeared before mounting", self.options.container);
            return;
        };

        let element = Element::from_options(&self.options);
        self.element = self.stage.insert_first(container, element);
        if self.element.is_some() {
            self.container = Some(container);
            self.callbacks.inited();
        }
    }

    fn apply_progress(&mut self, value: f64) {
        let value = clamp_percent(value);
        let previous = self.value.trunc();
        if let Some(id) = self.element {
            self.stage.update(id, |element| {
                if let Some(bar) = element.bar_mut() {
                    bar.offset = value - 100.0;
                    if value.trunc() != previous {
                        bar.label.text = format!("{}%", value.trunc() as u32);
                    }
                }
            });
        }
        self.value = value;
        self.callbacks.progress(value);
    }

    fn set_visible(&mut self, visible: bool) {
        let Some(id) = self.element else {
            return;
        };
        self.stage.update(id, |element| {
            if visible {
                element.opacity = 1.0;
                element.display = Display::Block;
            } else {
                element.opacity = 0.0;
                element.display = Display::None;
            }
        });
    }

    // Simulated run

    fn begin_run(&mut self, requested: Option<u64>) {
        if self.running {
            debug!("Start ignored, a run is already in progress");
            return;
        }

        let duration = self.options.effective_duration(requested);
        let thresholds = PhaseThresholds::draw(
            &mut self.rng,
            self.options.slow_range,
            self.options.effective_stop_at(),
            duration,
        );
        self.run = Some(RunState {
            thresholds,
            started_at: self.scheduler.now(),
            timeout_ms: self.options.timeout_ms(),
            duration_ms: duration as f64,
            finish_kicked: false,
        });
        info!(
            "Starting run: {}ms, fast to {} in {}ms, slow to {} in {}ms",
            duration,
            thresholds.fast_ceiling,
            thresholds.fast_ms,
            thresholds.slow_ceiling,
            thresholds.slow_ms
        );

        self.callbacks.start();
        self.running = true;
        self.status = RunStatus::Running;
        self.session = Some(AnimationDriver::launch(
            &mut self.scheduler,
            duration as f64,
            false,
        ));
    }

    fn finish_run(&mut self) {
        self.ended = true;
        if !self.running {
            debug!("Finish recorded with no run in progress");
            return;
        }
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.finish_kicked {
            debug!("Finish already in progress at {:.2}%", self.value);
            return;
        }
        run.finish_kicked = true;
        let duration_ms = run.duration_ms;

        // Resume a stalled run with a fresh frame session
        let mut driver = match self.session.take() {
            Some(driver) => driver,
            None => {
                if let Some(handle) = self.crawl.take() {
                    self.scheduler.cancel_tick(handle);
                }
                if let Some(handle) = self.deadline.take() {
                    self.scheduler.cancel_tick(handle);
                }
                AnimationDriver::new(duration_ms, false)
            }
        };
        info!("Finish forced at {:.2}%", self.value);
        if let Some(event) = driver.begin_now(&mut self.scheduler) {
            self.advance_run(event, driver);
        }
    }

    fn progress_frame(&mut self, tick: Tick) {
        let Some(mut driver) = self.session.take() else {
            return;
        };
        match driver.begin(tick) {
            Some(event) => self.advance_run(event, driver),
            None => self.session = Some(driver),
        }
    }

    fn advance_run(&mut self, event: DriverEvent, mut driver: AnimationDriver) {
        let mut stop = Stop::default();
        self.on_progress_frame(event.info(), &mut stop);
        driver.finish(&mut self.scheduler, &stop);
        if driver.is_active() {
            self.session = Some(driver);
        }
    }

    fn on_progress_frame(&mut self, info: &TickInfo, stop: &mut Stop) {
        let Some(run) = self.run else {
            stop.stop();
            return;
        };
        if self.timeout_elapsed(&run) {
            stop.stop();
            self.trip_timeout();
            return;
        }

        let thresholds = run.thresholds;
        if self.value >= thresholds.slow_ceiling {
            if !self.ended {
                stop.stop();
                self.enter_crawl();
                return;
            }
            self.status = RunStatus::Sprint;
        }

        let next = thresholds.advance(self.value, info.delta, self.ended);
        self.apply_progress(next);

        if self.value >= 100.0 {
            stop.stop();
            self.complete();
        }
    }

    fn enter_crawl(&mut self) {
        debug!("Entering slow crawl at {:.2}%", self.value);
        self.status = RunStatus::SlowCrawl;
        self.crawl = Some(self.scheduler.request_timer(CRAWL_INTERVAL_MS));
    }

    fn crawl_step(&mut self) {
        let Some(run) = self.run else {
            return;
        };
        if self.timeout_elapsed(&run) {
            self.trip_timeout();
            return;
        }

        let stop_at = run.thresholds.stop_at;
        if self.value < stop_at {
            let next = run.thresholds.crawl(self.value);
            self.apply_progress(next);
        }
        if self.value >= stop_at {
            self.park(&run);
        } else {
            self.crawl = Some(self.scheduler.request_timer(CRAWL_INTERVAL_MS));
        }
    }

    /// The crawl reached its ceiling and stops; only a forced finish or the
    /// timeout moves the run on from here
    fn park(&mut self, run: &RunState) {
        debug!("Slow crawl parked at {:.2}%", self.value);
        if let Some(timeout) = run.timeout_ms {
            let remaining = run.started_at + timeout - self.scheduler.now();
            self.deadline = Some(self.scheduler.request_timer(remaining));
        }
    }

    fn deadline_reached(&mut self) {
        let Some(run) = self.run else {
            return;
        };
        if self.timeout_elapsed(&run) {
            self.trip_timeout();
        } else {
            self.park(&run);
        }
    }

    fn timeout_elapsed(&self, run: &RunState) -> bool {
        run.timeout_ms
            .is_some_and(|timeout| self.scheduler.now() - run.started_at >= timeout)
    }

    fn trip_timeout(&mut self) {
        warn!("Progress run timed out at {:.2}%", self.value);
        self.halt_run();
        self.status = RunStatus::TimedOut;
        self.callbacks.timeout();
    }

    fn complete(&mut self) {
        info!("Progress run complete");
        self.halt_run();
        self.status = RunStatus::Done;
        self.callbacks.end();
    }

    fn halt_run(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop(&mut self.scheduler);
        }
        if let Some(handle) = self.crawl.take() {
            self.scheduler.cancel_tick(handle);
        }
        if let Some(handle) = self.deadline.take() {
            self.scheduler.cancel_tick(handle);
        }
        self.run = None;
        self.running = false;
    }

    // Fades

    fn begin_fade(
        &mut self,
        direction: FadeDirection,
        duration: Option<u64>,
        callback: Option<Completion>,
    ) {
        let Some(id) = self.element else {
            return;
        };
        let Some(hidden) = self.stage.element(id).map(|element| element.is_hidden()) else {
            return;
        };
        match direction {
            FadeDirection::In if !hidden => return,
            FadeDirection::Out if hidden => return,
            _ => {}
        }

        let duration_ms = duration.filter(|ms| *ms > 0).unwrap_or(DEFAULT_FADE_MS) as f64;
        let opacity = match direction {
            FadeDirection::In => 0.0,
            FadeDirection::Out => 1.0,
        };
        self.stage.update(id, |element| {
            element.opacity = opacity;
            element.display = Display::Block;
        });

        if let Some(mut previous) = self.fade.take() {
            previous.driver.stop(&mut self.scheduler);
        }
        self.fade = Some(Fade {
            driver: AnimationDriver::launch(&mut self.scheduler, duration_ms, true),
            direction,
            duration_ms,
            opacity,
            callback,
        });
    }

    fn fade_frame(&mut self, tick: Tick) {
        let Some(mut fade) = self.fade.take() else {
            return;
        };
        let Some(event) = fade.driver.begin(tick) else {
            self.fade = Some(fade);
            return;
        };
        let Some(id) = self.element else {
            return;
        };

        match event {
            DriverEvent::Tick(info) => {
                let step = info.delta / fade.duration_ms;
                fade.opacity = match fade.direction {
                    FadeDirection::In => fade.opacity + step,
                    FadeDirection::Out => fade.opacity - step,
                }
                .clamp(0.0, 1.0);
                let opacity = fade.opacity;
                self.stage.update(id, |element| element.opacity = opacity);
                fade.driver.finish(&mut self.scheduler, &Stop::default());
                self.fade = Some(fade);
            }
            DriverEvent::End(_) => {
                let (opacity, display) = match fade.direction {
                    FadeDirection::In => (1.0, Display::Block),
                    FadeDirection::Out => (0.0, Display::None),
                };
                self.stage.update(id, |element| {
                    element.opacity = opacity;
                    element.display = display;
                });
                if let Some(callback) = fade.callback.take() {
                    callback();
                }
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(id) = self.element.take() {
            self.stage.remove(id);
        }
        self.halt_run();
        if let Some(mut fade) = self.fade.take() {
            fade.driver.stop(&mut self.scheduler);
        }
        if let Some(handle) = self.readiness_poll.take() {
            self.scheduler.cancel_tick(handle);
        }
        self.value = 0.0;
        self.ended = false;
        self.status = RunStatus::Idle;
        self.gate.clear();
        self.destroyed = true;
        debug!("Progress bar destroyed");
    }
}

impl fmt::Debug for ProgressBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBar")
            .field("value", &self.value)
            .field("status", &self.status)
            .field("running", &self.running)
            .field("ended", &self.ended)
            .field("ready", &self.gate.is_ready())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
