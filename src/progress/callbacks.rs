//! Lifecycle callbacks of the progress widget

use std::fmt;

type Hook = Box<dyn FnMut()>;
type ProgressHook = Box<dyn FnMut(f64)>;

/// Completion callback for fades
pub type Completion = Box<dyn FnOnce()>;

/// Optional hooks fired at each lifecycle step
///
/// ```
/// use loadbar::progress::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .on_progress(|value| println!("{value:.0}%"))
///     .on_end(|| println!("done"));
/// ```
#[derive(Default)]
pub struct Callbacks {
    ready: Option<Hook>,
    inited: Option<Hook>,
    start: Option<Hook>,
    progress: Option<ProgressHook>,
    end: Option<Hook>,
    timeout: Option<Hook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mount point appeared after construction
    pub fn on_ready(mut self, f: impl FnMut() + 'static) -> Self {
        self.ready = Some(Box::new(f));
        self
    }

    /// The element was mounted
    pub fn on_inited(mut self, f: impl FnMut() + 'static) -> Self {
        self.inited = Some(Box::new(f));
        self
    }

    pub fn on_start(mut self, f: impl FnMut() + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    /// Receives every clamped value set on the widget
    pub fn on_progress(mut self, f: impl FnMut(f64) + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl FnMut() + 'static) -> Self {
        self.end = Some(Box::new(f));
        self
    }

    pub fn on_timeout(mut self, f: impl FnMut() + 'static) -> Self {
        self.timeout = Some(Box::new(f));
        self
    }

    pub(crate) fn ready(&mut self) {
        fire(&mut self.ready);
    }

    pub(crate) fn inited(&mut self) {
        fire(&mut self.inited);
    }

    pub(crate) fn start(&mut self) {
        fire(&mut self.start);
    }

    pub(crate) fn progress(&mut self, value: f64) {
        if let Some(hook) = self.progress.as_mut() {
            hook(value);
        }
    }

    pub(crate) fn end(&mut self) {
        fire(&mut self.end);
    }

    pub(crate) fn timeout(&mut self) {
        fire(&mut self.timeout);
    }
}

fn fire(hook: &mut Option<Hook>) {
    if let Some(hook) = hook.as_mut() {
        hook();
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_ready", &self.ready.is_some())
            .field("on_inited", &self.inited.is_some())
            .field("on_start", &self.start.is_some())
            .field("on_progress", &self.progress.is_some())
            .field("on_end", &self.end.is_some())
            .field("on_timeout", &self.timeout.is_some())
            .finish()
    }
}
