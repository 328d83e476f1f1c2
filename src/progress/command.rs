use std::fmt;

use super::callbacks::Completion;

/// One public widget operation with its arguments
///
/// Every public call on [`ProgressBar`](super::ProgressBar) is turned into a
/// `Command` and routed through the lifecycle gate, so calls made before
/// the mount point exists replay later exactly as issued.
pub enum Command {
    Init,
    SetProgress(f64),
    Start(Option<u64>),
    ForceFinish,
    Show,
    Hide,
    FadeIn {
        duration: Option<u64>,
        callback: Option<Completion>,
    },
    FadeOut {
        duration: Option<u64>,
        callback: Option<Completion>,
    },
    Destroy,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::SetProgress(_) => "set_progress",
            Command::Start(_) => "start",
            Command::ForceFinish => "force_finish",
            Command::Show => "show",
            Command::Hide => "hide",
            Command::FadeIn { .. } => "fade_in",
            Command::FadeOut { .. } => "fade_out",
            Command::Destroy => "destroy",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetProgress(value) => write!(f, "SetProgress({})", value),
            Command::Start(duration) => write!(f, "Start({:?})", duration),
            Command::FadeIn { duration, callback } | Command::FadeOut { duration, callback } => {
                f.debug_struct(self.name())
                    .field("duration", duration)
                    .field("callback", &callback.is_some())
                    .finish()
            }
            other => write!(f, "{}", other.name()),
        }
    }
}
