use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ProgressOptions, SlowRange};
use crate::scheduler::FrameSource;
use crate::stage::ContainerSpec;

/// loadbar - simulated loading bar for the terminal
#[derive(Parser, Debug)]
#[command(name = "loadbar")]
#[command(about = "A simulated loading bar that runs fast, waits, then finishes on demand")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to ~/.config/loadbar/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Total animation duration in milliseconds
    #[arg(long, global = true)]
    pub duration: Option<u64>,

    /// Abort a run after this many milliseconds (0 disables)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Range the slow-phase ceiling is drawn from, e.g. 85-96
    #[arg(long, global = true, value_parser = parse_slow_range)]
    pub slow_range: Option<SlowRange>,

    /// Ceiling of the slow crawl
    #[arg(long, global = true)]
    pub stop_at: Option<f64>,

    /// Seed for the threshold draws
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Frame pacing: auto, native or timer
    #[arg(long, global = true)]
    pub frame_source: Option<FrameSource>,

    /// Container to mount into instead of the body, e.g. #app
    #[arg(long, global = true)]
    pub mount: Option<String>,

    /// Add the --mount container only after this many milliseconds
    #[arg(long, global = true, default_value_t = 0)]
    pub mount_delay: u64,

    /// Force the finish this many milliseconds after start
    #[arg(long, global = true)]
    pub finish_after: Option<u64>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Full-screen interactive bar (default)
    Tui,
    /// Run in real time without a terminal UI, logging each percent
    Headless,
    /// Run in virtual time and print the trajectory
    Simulate {
        /// Virtual milliseconds to simulate
        #[arg(long, default_value_t = 10_000)]
        until: u64,

        /// Sample interval of the printed trajectory in milliseconds
        #[arg(long, default_value_t = 100)]
        every: u64,

        /// Print samples as JSON lines
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Tui)
    }

    /// Layer command-line overrides on top of file options
    pub fn apply(&self, options: &mut ProgressOptions) {
        if let Some(duration) = self.duration {
            options.duration = duration;
        }
        if let Some(timeout) = self.timeout {
            options.timeout = timeout;
        }
        if let Some(range) = self.slow_range {
            options.slow_range = range;
        }
        if let Some(stop_at) = self.stop_at {
            options.stop_at = stop_at;
        }
        if let Some(seed) = self.seed {
            options.seed = Some(seed);
        }
        if let Some(source) = self.frame_source {
            options.frame_source = source;
        }
        if let Some(mount) = &self.mount {
            options.container = ContainerSpec::from(mount.as_str());
        }
    }
}

fn parse_slow_range(value: &str) -> Result<SlowRange, String> {
    SlowRange::parse(value).ok_or_else(|| format!("expected MIN-MAX, got '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_tui() {
        let cli = Cli::parse_from(["loadbar"]);
        assert_eq!(cli.command(), Commands::Tui);
        assert_eq!(cli.mount_delay, 0);
    }

    #[test]
    fn test_overrides_apply_to_options() {
        let cli = Cli::parse_from([
            "loadbar",
            "simulate",
            "--duration",
            "800",
            "--slow-range",
            "90-80",
            "--frame-source",
            "timer",
            "--mount",
            "#app",
            "--json",
        ]);
        let mut options = ProgressOptions::default();
        cli.apply(&mut options);

        assert_eq!(options.duration, 800);
        assert_eq!(options.slow_range, SlowRange { min: 80.0, max: 90.0 });
        assert_eq!(options.frame_source, FrameSource::Timer);
        assert_eq!(options.container, ContainerSpec::Selector("#app".to_string()));
        assert_eq!(
            cli.command(),
            Commands::Simulate {
                until: 10_000,
                every: 100,
                json: true
            }
        );
    }

    #[test]
    fn test_bad_slow_range_is_rejected() {
        assert!(Cli::try_parse_from(["loadbar", "--slow-range", "fast"]).is_err());
    }
}
