//! Mock stages for testing.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::context::StageContext;
use crate::core::{Event, EventOutcome};
use crate::errors::{EventflowError, Result, StageExecError, StageInitError};
use crate::options::RunOptions;
use crate::stages::Stage;

/// Shared, ordered record of lifecycle calls (`"a.init"`, `"a.exec:3"`, ...).
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Creates an empty call log.
#[must_use]
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: Option<&CallLog>, entry: String) {
    if let Some(log) = log {
        log.lock().push(entry);
    }
}

/// A stage that records every lifecycle call and passes events through.
#[derive(Debug, Clone)]
pub struct RecordingStage {
    name: String,
    log: CallLog,
}

impl RecordingStage {
    /// Creates a recording stage writing into `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        record(Some(&self.log), format!("{}.init", self.name));
        Ok(())
    }

    fn exec(&mut self, event: Event, _ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        record(Some(&self.log), format!("{}.exec:{}", self.name, event.number));
        Ok(EventOutcome::Pass(event))
    }

    fn terminate(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        record(Some(&self.log), format!("{}.terminate", self.name));
        Ok(())
    }
}

/// The lifecycle phase at which a [`FailingStage`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPhase {
    /// `init` returns a [`StageInitError`].
    Init,
    /// `exec` aborts with a [`StageExecError`] on the given event number.
    Exec(u64),
    /// `terminate` returns an error.
    Terminate,
}

/// A stage that fails at a chosen phase.
#[derive(Debug, Clone)]
pub struct FailingStage {
    name: String,
    phase: FailPhase,
    log: Option<CallLog>,
}

impl FailingStage {
    /// Creates a stage failing at `phase`.
    #[must_use]
    pub fn new(name: impl Into<String>, phase: FailPhase) -> Self {
        Self {
            name: name.into(),
            phase,
            log: None,
        }
    }

    /// Records lifecycle calls into `log`.
    #[must_use]
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        record(self.log.as_ref(), format!("{}.init", self.name));
        if self.phase == FailPhase::Init {
            return Err(StageInitError::new(self.name.clone(), "intentional init failure").into());
        }
        Ok(())
    }

    fn exec(&mut self, event: Event, _ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        record(self.log.as_ref(), format!("{}.exec:{}", self.name, event.number));
        match self.phase {
            FailPhase::Exec(at) if at == event.number => Err(StageExecError::new(
                self.name.clone(),
                event.number,
                "intentional abort",
            )
            .into()),
            _ => Ok(EventOutcome::Pass(event)),
        }
    }

    fn terminate(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        record(self.log.as_ref(), format!("{}.terminate", self.name));
        if self.phase == FailPhase::Terminate {
            return Err(EventflowError::Internal("intentional terminate failure".into()));
        }
        Ok(())
    }
}

/// A stage that skips a fixed set of event numbers.
#[derive(Debug, Clone)]
pub struct SkipNumbersStage {
    name: String,
    skip: BTreeSet<u64>,
}

impl SkipNumbersStage {
    /// Creates a stage skipping every event whose number is in `skip`.
    #[must_use]
    pub fn new(name: impl Into<String>, skip: impl IntoIterator<Item = u64>) -> Self {
        Self {
            name: name.into(),
            skip: skip.into_iter().collect(),
        }
    }
}

impl Stage for SkipNumbersStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }

    fn exec(&mut self, event: Event, _ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        if self.skip.contains(&event.number) {
            return Ok(EventOutcome::skip(
                self.name.clone(),
                event.number,
                "flagged by test",
            ));
        }
        Ok(EventOutcome::Pass(event))
    }

    fn terminate(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// A stage that cancels a token when it sees a given event.
#[derive(Debug, Clone)]
pub struct CancelAtStage {
    name: String,
    token: CancellationToken,
    at: u64,
    run: Option<String>,
}

impl CancelAtStage {
    /// Creates a stage cancelling `token` on event `at`.
    #[must_use]
    pub fn new(name: impl Into<String>, token: CancellationToken, at: u64) -> Self {
        Self {
            name: name.into(),
            token,
            at,
            run: None,
        }
    }

    /// Only fires inside the run labelled `label`.
    #[must_use]
    pub fn for_run(mut self, label: impl Into<String>) -> Self {
        self.run = Some(label.into());
        self
    }
}

impl Stage for CancelAtStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }

    fn exec(&mut self, event: Event, ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        let in_run = self
            .run
            .as_deref()
            .map_or(true, |label| ctx.identity().label == label);
        if in_run && event.number == self.at {
            self.token.cancel(format!("requested by '{}'", self.name));
        }
        Ok(EventOutcome::Pass(event))
    }

    fn terminate(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// A stage that counts events into a named statistics counter.
#[derive(Debug, Clone)]
pub struct CountingStage {
    name: String,
    counter: String,
}

impl CountingStage {
    /// Creates a stage incrementing `counter` once per event.
    #[must_use]
    pub fn new(name: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counter: counter.into(),
        }
    }
}

impl Stage for CountingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _options: &RunOptions, ctx: &mut StageContext<'_>) -> Result<()> {
        ctx.statistics_mut().create_counter(&self.counter);
        Ok(())
    }

    fn exec(&mut self, event: Event, ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        ctx.statistics_mut().increment(&self.counter);
        Ok(EventOutcome::Pass(event))
    }

    fn terminate(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunIdentity;
    use crate::statistics::Statistics;

    #[test]
    fn test_recording_stage_logs_calls() {
        let log = call_log();
        let identity = RunIdentity::new("pos1", 0);
        let mut stats = Statistics::new();
        let mut ctx = StageContext::new(&identity, &mut stats);

        let mut stage = RecordingStage::new("a", log.clone());
        stage.init(&RunOptions::new("in"), &mut ctx).unwrap();
        stage
            .exec(Event::new(5, serde_json::Value::Null), &mut ctx)
            .unwrap();
        stage.terminate(&mut ctx).unwrap();

        assert_eq!(log.lock().clone(), vec!["a.init", "a.exec:5", "a.terminate"]);
    }

    #[test]
    fn test_failing_stage_phases() {
        let identity = RunIdentity::new("pos1", 0);
        let mut stats = Statistics::new();
        let mut ctx = StageContext::new(&identity, &mut stats);
        let options = RunOptions::new("in");

        let mut init = FailingStage::new("i", FailPhase::Init);
        assert_eq!(init.init(&options, &mut ctx).unwrap_err().kind(), "StageInitError");

        let mut exec = FailingStage::new("e", FailPhase::Exec(2));
        assert!(exec.exec(Event::new(1, serde_json::Value::Null), &mut ctx).is_ok());
        assert_eq!(
            exec.exec(Event::new(2, serde_json::Value::Null), &mut ctx)
                .unwrap_err()
                .kind(),
            "StageExecError"
        );

        let mut term = FailingStage::new("t", FailPhase::Terminate);
        assert!(term.terminate(&mut ctx).is_err());
    }
}
