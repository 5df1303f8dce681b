use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{Error, Result};

/// Analysis phase reported alongside progress updates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Comparing,
    Searching,
    Done,
}

/// A progress update. `fraction` is the completed share of the current stage, in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Progress {
    pub stage: Stage,
    pub fraction: f32,
}

/// Cloneable handle used to cancel a running analysis from another thread or task.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counter-based yield point shared by the long-running phases of an analysis.
///
/// Every `interval` calls to [Checkpoint::tick], the checkpoint checks for cancellation and
/// hands control to the host through the `on_yield` hook. Progress is forwarded on every
/// tick. The checkpoint does not depend on any scheduler, so the same loop runs unchanged
/// on a thread pool, inside an event loop, or as a plain blocking call.
pub struct Checkpoint<'a> {
    interval: usize,
    counter: usize,
    cancel: Option<&'a CancellationToken>,
    on_progress: Option<&'a mut dyn FnMut(Progress)>,
    on_yield: Option<&'a mut dyn FnMut()>,
}

impl<'a> Checkpoint<'a> {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
            cancel: None,
            on_progress: None,
            on_yield: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, on_progress: &'a mut dyn FnMut(Progress)) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn with_yield(mut self, on_yield: &'a mut dyn FnMut()) -> Self {
        self.on_yield = Some(on_yield);
        self
    }

    /// Reports progress without counting towards the yield interval.
    pub fn report(&mut self, stage: Stage, fraction: f32) {
        if let Some(on_progress) = self.on_progress.as_deref_mut() {
            on_progress(Progress {
                stage,
                fraction: fraction.clamp(0.0, 1.0),
            });
        }
    }

    /// Fails with [Error::Cancelled] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Records one unit of work. This is the yield point of the extraction and matrix loops.
    pub fn tick(&mut self, stage: Stage, fraction: f32) -> Result<()> {
        self.report(stage, fraction);

        let at_yield_point = self.counter % self.interval == 0;
        self.counter += 1;
        if !at_yield_point {
            return Ok(());
        }

        self.check()?;
        if let Some(on_yield) = self.on_yield.as_deref_mut() {
            on_yield();
        }
        Ok(())
    }
}
