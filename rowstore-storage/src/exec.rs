//! Execution context: table creation and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rowstore_result::{Error, Result};

use crate::container::{ContainerOptions, RowContainer};
use crate::types::TableSpec;

/// Calls between two cancellation polls of a [`CancelChecker`].
pub const DEFAULT_CANCEL_CHECK_INTERVAL: u32 = 1024;

/// Environment of a long-running operation.
pub trait ExecutionContext: Send + Sync {
    /// A new container for output rows of `spec`.
    fn create_container(&self, spec: TableSpec) -> RowContainer;

    fn is_canceled(&self) -> bool;

    /// [`Error::Canceled`] once cancellation was requested.
    fn check_canceled(&self) -> Result<()> {
        if self.is_canceled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DefaultExecutionContext {
    options: ContainerOptions,
    cancel: CancelToken,
}

impl DefaultExecutionContext {
    pub fn new(options: ContainerOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn container_options(&self) -> &ContainerOptions {
        &self.options
    }
}

impl ExecutionContext for DefaultExecutionContext {
    fn create_container(&self, spec: TableSpec) -> RowContainer {
        RowContainer::new(spec, self.options.clone())
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}

/// Polls a context for cancellation on the first call and then only every
/// `interval` calls, so it can sit on a per-row path.
pub struct CancelChecker<'a> {
    ctx: &'a dyn ExecutionContext,
    interval: u32,
    calls: u32,
}

impl<'a> CancelChecker<'a> {
    pub fn periodic(ctx: &'a dyn ExecutionContext) -> Self {
        Self::with_interval(ctx, DEFAULT_CANCEL_CHECK_INTERVAL)
    }

    pub fn with_interval(ctx: &'a dyn ExecutionContext, interval: u32) -> Self {
        Self {
            ctx,
            interval: interval.max(1),
            calls: 0,
        }
    }

    pub fn check(&mut self) -> Result<()> {
        let poll = self.calls == 0;
        self.calls += 1;
        if self.calls >= self.interval {
            self.calls = 0;
        }
        if poll {
            self.ctx.check_canceled()?;
        }
        Ok(())
    }
}
