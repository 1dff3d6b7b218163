//! Shared test helpers: tracing initialisation and log capture.

use std::sync::{Arc, Mutex, Once};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let env = std::env::var("RUST_LOG").ok();
        let filter = match env {
            Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            None => EnvFilter::new("info"),
        };
        // Another harness may have installed a global subscriber already.
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Number of events observed per level while a closure ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub error: usize,
    pub warn: usize,
    pub info: usize,
    pub debug: usize,
    pub trace: usize,
}

struct CountingLayer {
    counts: Arc<Mutex<LevelCounts>>,
}

impl<S: Subscriber> Layer<S> for CountingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut counts = self
            .counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match *event.metadata().level() {
            Level::ERROR => counts.error += 1,
            Level::WARN => counts.warn += 1,
            Level::INFO => counts.info += 1,
            Level::DEBUG => counts.debug += 1,
            Level::TRACE => counts.trace += 1,
        }
    }
}

/// Run `f` with a thread-local subscriber that counts events per level.
///
/// Only events emitted on the calling thread are observed.
pub fn capture_log_levels<R>(f: impl FnOnce() -> R) -> (R, LevelCounts) {
    let counts = Arc::new(Mutex::new(LevelCounts::default()));
    let subscriber = tracing_subscriber::registry().with(CountingLayer {
        counts: Arc::clone(&counts),
    });
    let out = tracing::subscriber::with_default(subscriber, f);
    let snapshot = *counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    (out, snapshot)
}

#[cfg(feature = "auto-init")]
mod auto {
    // Use ctor to run at binary init time to avoid having to call init in every test.
    use ctor::ctor;

    #[ctor]
    fn init() {
        super::init_tracing_for_tests();
    }
}
