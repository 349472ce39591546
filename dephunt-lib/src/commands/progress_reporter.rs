use crate::harvest::{Progress, StatusFn, Tally, TallyFn};
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Refresh rate for progress updates (10 Hz).
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

const DETERMINATE_TEMPLATE: &str = "{prefix:>18.bold.cyan} [{bar:30}] {msg}";
const DETERMINATE_TEMPLATE_NO_COLOR: &str = "{prefix:>18} [{bar:30}] {msg}";
const INDETERMINATE_TEMPLATE: &str = "{prefix:>18.bold.cyan} {spinner} {msg}";
const INDETERMINATE_TEMPLATE_NO_COLOR: &str = "{prefix:>18} {spinner} {msg}";
const SPINNER: &[&str] = &["|", "/", "-", "\\", " "];

#[derive(Debug)]
struct VisibilityState {
    visible_after: Instant,
    visible: AtomicBool,
}

/// A progress bar on stderr that stays hidden for short operations.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    state: Arc<VisibilityState>,
    callback: Arc<Mutex<TallyFn>>,
    refresh_task: Arc<JoinHandle<()>>,
    use_colors: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter.
    ///
    /// The bar only appears once `delay` has elapsed. Must be called within a tokio runtime.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::hidden();

        let state = Arc::new(VisibilityState {
            visible_after: Instant::now() + delay,
            visible: AtomicBool::new(false),
        });

        let callback = Arc::new(Mutex::new(Box::new(Tally::default) as TallyFn));

        Self {
            refresh_task: Arc::new(tokio::spawn(refresh_task(bar.clone(), Arc::clone(&state), Arc::clone(&callback)))),
            bar,
            state,
            callback,
            use_colors,
        }
    }

    fn style(&self, template: &str, no_color_template: &str, base: ProgressStyle) -> ProgressStyle {
        base.template(if self.use_colors { template } else { no_color_template })
            .expect("progress templates are valid")
    }
}

impl Progress for ProgressReporter {
    fn set_phase(&self, phase: &str) {
        self.bar.set_prefix(phase.to_string());
    }

    fn set_determinate(&self, tally: TallyFn) {
        *self.callback.lock().expect("lock poisoned") = tally;
        self.bar.disable_steady_tick();
        self.bar.set_length(0);
        self.bar.set_position(0);
        self.bar.set_style(
            self.style(DETERMINATE_TEMPLATE, DETERMINATE_TEMPLATE_NO_COLOR, ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
    }

    fn set_indeterminate(&self, status: StatusFn) {
        *self.callback.lock().expect("lock poisoned") = Box::new(move || Tally {
            message: status(),
            ..Tally::default()
        });
        self.bar.enable_steady_tick(REFRESH_INTERVAL);
        self.bar.set_style(
            self.style(INDETERMINATE_TEMPLATE, INDETERMINATE_TEMPLATE_NO_COLOR, ProgressStyle::default_spinner())
                .tick_strings(SPINNER),
        );
    }

    fn done(&self) {
        self.refresh_task.abort();
        if self.state.visible.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("state", &self.state)
            .field("callback", &"<callback>")
            .field("refresh_task", &"<task>")
            .field("use_colors", &self.use_colors)
            .finish()
    }
}

/// Background task that reveals the bar after the delay and keeps it current.
async fn refresh_task(bar: ProgressBar, state: Arc<VisibilityState>, callback: Arc<Mutex<TallyFn>>) {
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        _ = interval.tick().await;

        if !state.visible.load(Ordering::Relaxed) && Instant::now() >= state.visible_after {
            state.visible.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        if state.visible.load(Ordering::Relaxed) {
            let tally = {
                let guard = callback.lock().expect("lock poisoned");
                guard()
            };

            if tally.total > 0 {
                bar.set_length(tally.total);
                bar.set_position(tally.done);
            }
            bar.set_message(tally.message);
        }
    }
}
