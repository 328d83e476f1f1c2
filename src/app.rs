//! Runtimes for the `loadbar` binary
//!
//! All three modes share a [`Scenario`]: a stage, a progress bar that is
//! started immediately, and the host events the command line asks for
//! (adding the mount container late, forcing the finish). They differ only
//! in where time comes from and what they draw.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Serialize;
use std::io;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::ProgressOptions;
use crate::error::LoadbarError;
use crate::progress::{Callbacks, ProgressBar, RunStatus};
use crate::scheduler::{FrameScheduler, ManualClock, Timestamp};
use crate::stage::{ContainerSpec, Stage};
use crate::ui::ProgressScreen;

/// Longest the interactive loop waits for input between redraws
const INPUT_POLL_MS: f64 = 50.0;

/// Host-side events layered on top of the widget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSettings {
    /// Delay before the mount container is added to the stage
    pub mount_delay_ms: u64,
    /// Force the finish this long after start
    pub finish_after_ms: Option<u64>,
}

impl From<&Cli> for RunSettings {
    fn from(cli: &Cli) -> Self {
        Self {
            mount_delay_ms: cli.mount_delay,
            finish_after_ms: cli.finish_after,
        }
    }
}

/// One point of a recorded trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time_ms: f64,
    pub value: f64,
    pub status: RunStatus,
}

/// A started progress bar plus the host events still to come
pub struct Scenario {
    bar: ProgressBar,
    stage: Stage,
    mount: Option<(String, Timestamp)>,
    finish_at: Option<Timestamp>,
}

impl Scenario {
    pub fn new(
        options: ProgressOptions,
        callbacks: Callbacks,
        scheduler: FrameScheduler,
        settings: RunSettings,
    ) -> Self {
        let stage = Stage::new();
        let origin = scheduler.now();

        let mut mount = match &options.container {
            ContainerSpec::Selector(name) => Some((name.clone(), origin + settings.mount_delay_ms as f64)),
            _ => None,
        };
        if settings.mount_delay_ms == 0 {
            if let Some((name, _)) = mount.take() {
                stage.add_container(&name);
            }
        }

        let mut bar = ProgressBar::new(options, callbacks, stage.clone(), scheduler);
        bar.start(None);

        Self {
            bar,
            stage,
            mount,
            finish_at: settings.finish_after_ms.map(|ms| origin + ms as f64),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    pub fn bar_mut(&mut self) -> &mut ProgressBar {
        &mut self.bar
    }

    /// Fire host events that are due, then every due widget tick
    pub fn step(&mut self) -> usize {
        let now = self.bar.now();
        if self.mount.as_ref().is_some_and(|(_, at)| now >= *at) {
            if let Some((name, _)) = self.mount.take() {
                info!("Adding container {} to the stage", name);
                self.stage.add_container(&name);
            }
        }
        if self.finish_at.is_some_and(|at| now >= at) {
            self.finish_at = None;
            self.bar.force_finish();
        }
        self.bar.pump()
    }

    /// Earliest time anything is scheduled to happen
    pub fn next_event(&self) -> Option<Timestamp> {
        [
            self.bar.next_deadline(),
            self.mount.as_ref().map(|(_, at)| *at),
            self.finish_at,
        ]
        .into_iter()
        .flatten()
        .reduce(f64::min)
    }

    /// Whether the run reached a terminal state
    pub fn is_settled(&self) -> bool {
        matches!(self.bar.status(), RunStatus::Done | RunStatus::TimedOut)
    }

    /// Step a manual clock from event to event up to `target`
    pub fn advance_to(&mut self, clock: &ManualClock, target: Timestamp) {
        while let Some(next) = self.next_event() {
            if next > target {
                break;
            }
            clock.set(next);
            self.step();
        }
        clock.set(target);
        self.step();
    }
}

fn logging_callbacks() -> Callbacks {
    Callbacks::new()
        .on_ready(|| info!("Mount point ready"))
        .on_end(|| info!("Loading finished"))
        .on_timeout(|| warn!("Loading timed out"))
}

/// Run a scenario in virtual time and sample its trajectory
pub fn simulate(
    options: ProgressOptions,
    settings: RunSettings,
    until_ms: u64,
    every_ms: u64,
) -> Vec<Sample> {
    let clock = ManualClock::new();
    let source = options.frame_source.resolve(false);
    let scheduler = FrameScheduler::manual(&clock, source);
    let mut scenario = Scenario::new(options, logging_callbacks(), scheduler, settings);

    let every = every_ms.max(1) as f64;
    let until = until_ms as f64;
    let mut samples = Vec::new();
    let mut time = 0.0;
    loop {
        scenario.advance_to(&clock, time);
        samples.push(Sample {
            time_ms: time,
            value: scenario.bar().value(),
            status: scenario.bar().status(),
        });
        if scenario.is_settled() || time >= until {
            break;
        }
        time = (time + every).min(until);
    }
    samples
}

/// Entry point of the binary once logging is set up
pub async fn run(cli: Cli) -> Result<()> {
    let mut options = ProgressOptions::load(cli.config.as_deref()).await?;
    cli.apply(&mut options);
    let settings = RunSettings::from(&cli);

    match cli.command() {
        Commands::Tui => run_tui(options, settings).await,
        Commands::Headless => run_headless(options, settings).await,
        Commands::Simulate { until, every, json } => {
            for sample in simulate(options, settings, until, every) {
                if json {
                    println!("{}", serde_json::to_string(&sample)?);
                } else {
                    println!(
                        "{:>8.0}ms {:>7.2}% {}",
                        sample.time_ms, sample.value, sample.status
                    );
                }
            }
            Ok(())
        }
    }
}

async fn run_headless(options: ProgressOptions, settings: RunSettings) -> Result<()> {
    let scheduler = FrameScheduler::system(options.frame_source.resolve(false));
    let mut scenario = Scenario::new(options, logging_callbacks(), scheduler, settings);
    let mut last_percent = None;

    loop {
        scenario.step();

        let percent = scenario.bar().value().trunc() as u32;
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            println!("{:>3}% {}", percent, scenario.bar().status());
        }
        if scenario.is_settled() {
            println!("{}", scenario.bar().status());
            return Ok(());
        }

        let Some(next) = scenario.next_event() else {
            info!("Nothing left to schedule");
            return Ok(());
        };
        let wait = (next - scenario.bar().now()).max(0.0);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(wait / 1000.0)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted at {:.2}%", scenario.bar().value());
                return Ok(());
            }
        }
    }
}

async fn run_tui(options: ProgressOptions, settings: RunSettings) -> Result<()> {
    let mut terminal = setup_terminal()?;

    let scheduler = FrameScheduler::system(options.frame_source.resolve(true));
    let mut scenario = Scenario::new(options, logging_callbacks(), scheduler, settings);
    let result = tui_loop(&mut terminal, &mut scenario);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Refuse to draw when stdout is not a terminal
fn require_terminal(is_tty: bool) -> crate::Result<()> {
    if is_tty {
        return Ok(());
    }
    Err(LoadbarError::Terminal(io::Error::new(
        io::ErrorKind::Unsupported,
        "the interactive bar needs a terminal; try `loadbar headless` or `loadbar simulate`",
    )))
}

fn setup_terminal() -> crate::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    require_terminal(io::stdout().is_tty())?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    scenario: &mut Scenario,
) -> Result<()> {
    let mut screen = ProgressScreen::new();

    loop {
        scenario.step();
        terminal.draw(|frame| {
            let area = frame.size();
            screen.render(frame, area, scenario.bar());
        })?;

        let wait = scenario
            .next_event()
            .map(|next| (next - scenario.bar().now()).clamp(0.0, INPUT_POLL_MS))
            .unwrap_or(INPUT_POLL_MS);

        if event::poll(Duration::from_secs_f64(wait / 1000.0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let bar = scenario.bar_mut();
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('s') => {
                        bar.start(None);
                    }
                    KeyCode::Char('f') => {
                        bar.force_finish();
                    }
                    KeyCode::Char('i') => {
                        bar.fade_in(None);
                    }
                    KeyCode::Char('o') => {
                        bar.fade_out(None);
                    }
                    KeyCode::Char('r') => {
                        bar.destroy().init();
                    }
                    KeyCode::Char('h') => screen.toggle_help(),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::FrameSource;

    fn options() -> ProgressOptions {
        ProgressOptions {
            seed: Some(3),
            frame_source: FrameSource::Timer,
            ..ProgressOptions::default()
        }
    }

    #[test]
    fn test_simulate_finishes_when_forced() {
        let settings = RunSettings {
            mount_delay_ms: 0,
            finish_after_ms: Some(3000),
        };
        let samples = simulate(options(), settings, 20_000, 100);

        let last = samples.last().unwrap();
        assert_eq!(last.status, RunStatus::Done);
        assert_eq!(last.value, 100.0);
        assert!(last.time_ms < 20_000.0);
        assert!(samples.windows(2).all(|w| w[0].value <= w[1].value));
    }

    #[test]
    fn test_simulate_waits_for_late_container() {
        let settings = RunSettings {
            mount_delay_ms: 500,
            finish_after_ms: None,
        };
        let options = ProgressOptions {
            container: ContainerSpec::from("#app"),
            ..options()
        };
        let samples = simulate(options, settings, 1000, 100);

        let before: Vec<_> = samples.iter().filter(|s| s.time_ms < 500.0).collect();
        assert!(before.iter().all(|s| s.value == 0.0 && s.status == RunStatus::Idle));
        let last = samples.last().unwrap();
        assert!(last.value > 0.0);
        assert_eq!(last.time_ms, 1000.0);
    }

    #[test]
    fn test_simulate_reports_timeout() {
        let options = ProgressOptions {
            timeout: 700,
            ..options()
        };
        let samples = simulate(options, RunSettings::default(), 5000, 100);
        let last = samples.last().unwrap();
        assert_eq!(last.status, RunStatus::TimedOut);
        assert!(last.time_ms >= 700.0 && last.time_ms < 1000.0);
    }

    #[test]
    fn test_missing_terminal_is_a_terminal_error() {
        assert!(require_terminal(true).is_ok());

        let error = require_terminal(false).unwrap_err();
        assert!(matches!(error, LoadbarError::Terminal(_)));
        assert!(!error.is_config());
        assert!(error.to_string().contains("loadbar headless"));
    }

    #[test]
    fn test_sample_serializes_status_label() {
        let sample = Sample {
            time_ms: 100.0,
            value: 12.5,
            status: RunStatus::SlowCrawl,
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"time_ms":100.0,"value":12.5,"status":"waiting"}"#);
    }
}
