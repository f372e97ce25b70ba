//! General-purpose leaf stages.

use super::Stage;
use crate::context::StageContext;
use crate::core::{Event, EventOutcome};
use crate::errors::Result;
use crate::options::RunOptions;
use std::fmt::Debug;

/// A closure-backed stage.
///
/// `init` and `terminate` do nothing; every event goes through the closure.
pub struct FnStage<F>
where
    F: FnMut(Event, &mut StageContext<'_>) -> Result<EventOutcome> + Send,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: FnMut(Event, &mut StageContext<'_>) -> Result<EventOutcome> + Send,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: FnMut(Event, &mut StageContext<'_>) -> Result<EventOutcome> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

impl<F> Stage for FnStage<F>
where
    F: FnMut(Event, &mut StageContext<'_>) -> Result<EventOutcome> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }

    fn exec(&mut self, event: Event, ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        (self.func)(event, ctx)
    }

    fn terminate(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// A stage that passes every event through unchanged.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }

    fn exec(&mut self, event: Event, _ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        Ok(EventOutcome::Pass(event))
    }

    fn terminate(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Writes every event it receives to the nearest enclosing output.
#[derive(Debug, Clone)]
pub struct WriteEventStage {
    name: String,
    written: u64,
}

impl WriteEventStage {
    /// Creates a writer stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    /// Number of events written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Default for WriteEventStage {
    fn default() -> Self {
        Self::new("write")
    }
}

impl Stage for WriteEventStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        self.written = 0;
        Ok(())
    }

    fn exec(&mut self, event: Event, ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        ctx.write(&event)?;
        self.written += 1;
        Ok(EventOutcome::Pass(event))
    }

    fn terminate(&mut self, ctx: &mut StageContext<'_>) -> Result<()> {
        ctx.statistics_mut()
            .add(&format!("{}.written", self.name), self.written as f64);
        Ok(())
    }
}
