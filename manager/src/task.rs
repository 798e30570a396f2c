// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Transaction tasks.
//!
//! A [`TxTask`] runs inside one transaction. When the transaction commits, the task
//! gets a chance to submit background work with [`TxTask::on_success`].
//!
//! A [`CompositeTxTask`] runs a step per input, in input order, within the same
//! transaction. The first failing step aborts the whole task and the transaction.
//! The results are returned in input order, so that callers can zip them with
//! the inputs.

use crate::errors::VtnResult;
use crate::flow::{FlowRemovalSpec, FlowRemover};
use crate::txn::TxContext;
use std::fmt::Display;
use tracing::{debug, warn};

/// An operation run in one transaction
pub trait TxTask {
    type Output;

    /// Name of the task, for logs
    fn name(&self) -> &str;

    fn execute(&mut self, ctx: &mut TxContext<'_>) -> VtnResult<Self::Output>;

    /// Called once the transaction is committed
    fn on_success(&self, _remover: &dyn FlowRemover, _output: &Self::Output) {}
}

/// A task running a closure
pub struct FnTask<F> {
    name: &'static str,
    run: F,
}

impl<F> FnTask<F> {
    pub fn new<T>(name: &'static str, run: F) -> Self
    where
        F: FnMut(&mut TxContext<'_>) -> VtnResult<T>,
    {
        Self { name, run }
    }
}

impl<F, T> TxTask for FnTask<F>
where
    F: FnMut(&mut TxContext<'_>) -> VtnResult<T>,
{
    type Output = T;

    fn name(&self) -> &str {
        self.name
    }

    fn execute(&mut self, ctx: &mut TxContext<'_>) -> VtnResult<T> {
        (self.run)(ctx)
    }
}

/// What a step did to its target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VtnUpdateType {
    Created,
    Changed,
    Removed,
}

impl Display for VtnUpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VtnUpdateType::Created => write!(f, "CREATED"),
            VtnUpdateType::Changed => write!(f, "CHANGED"),
            VtnUpdateType::Removed => write!(f, "REMOVED"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeState {
    Created,
    Started,
    Running,
    Completed,
    Failed,
}

type StartHook<'t> = Box<dyn FnMut(&mut TxContext<'_>) -> VtnResult<()> + 't>;
type Step<'t, I, R> = Box<dyn FnMut(&mut TxContext<'_>, &I) -> VtnResult<Option<R>> + 't>;
type CompleteHook<'t, R> = Box<dyn FnMut(&mut TxContext<'_>, &[Option<R>]) -> VtnResult<()> + 't>;
type FlowSpecs<'t, I, R> = Box<dyn Fn(&[I], &[Option<R>]) -> Vec<FlowRemovalSpec> + 't>;

/// Runs `step` on each input, in order, in one transaction.
///
/// A step returns `None` when it changed nothing.
pub struct CompositeTxTask<'t, I, R> {
    name: &'static str,
    inputs: Vec<I>,
    state: CompositeState,
    on_started: Option<StartHook<'t>>,
    step: Step<'t, I, R>,
    on_completed: Option<CompleteHook<'t, R>>,
    flows: Option<FlowSpecs<'t, I, R>>,
}

impl<'t, I, R> CompositeTxTask<'t, I, R> {
    pub fn new(
        name: &'static str,
        inputs: Vec<I>,
        step: impl FnMut(&mut TxContext<'_>, &I) -> VtnResult<Option<R>> + 't,
    ) -> Self {
        Self {
            name,
            inputs,
            state: CompositeState::Created,
            on_started: None,
            step: Box::new(step),
            on_completed: None,
            flows: None,
        }
    }

    /// Run `hook` once, before the first step
    #[must_use]
    pub fn on_started(mut self, hook: impl FnMut(&mut TxContext<'_>) -> VtnResult<()> + 't) -> Self {
        self.on_started = Some(Box::new(hook));
        self
    }

    /// Run `hook` once, after the last step, with the results
    #[must_use]
    pub fn on_completed(
        mut self,
        hook: impl FnMut(&mut TxContext<'_>, &[Option<R>]) -> VtnResult<()> + 't,
    ) -> Self {
        self.on_completed = Some(Box::new(hook));
        self
    }

    /// After commit, remove the flows given by `specs` if any step changed something
    #[must_use]
    pub fn remove_flows_on_success(
        mut self,
        specs: impl Fn(&[I], &[Option<R>]) -> Vec<FlowRemovalSpec> + 't,
    ) -> Self {
        self.flows = Some(Box::new(specs));
        self
    }

    #[must_use]
    pub fn state(&self) -> CompositeState {
        self.state
    }

    #[must_use]
    pub fn inputs(&self) -> &[I] {
        &self.inputs
    }

    fn run(&mut self, ctx: &mut TxContext<'_>) -> VtnResult<Vec<Option<R>>> {
        self.state = CompositeState::Started;
        if let Some(hook) = self.on_started.as_mut() {
            hook(ctx)?;
        }
        self.state = CompositeState::Running;
        let mut results = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            results.push((self.step)(ctx, input)?);
        }
        if let Some(hook) = self.on_completed.as_mut() {
            hook(ctx, &results)?;
        }
        self.state = CompositeState::Completed;
        Ok(results)
    }
}

impl<I, R> TxTask for CompositeTxTask<'_, I, R> {
    type Output = Vec<Option<R>>;

    fn name(&self) -> &str {
        self.name
    }

    fn execute(&mut self, ctx: &mut TxContext<'_>) -> VtnResult<Self::Output> {
        let results = self.run(ctx);
        match &results {
            Ok(results) => debug!(
                "{}: {} of {} steps changed something",
                self.name,
                results.iter().filter(|r| r.is_some()).count(),
                results.len()
            ),
            Err(e) => {
                warn!("{} failed: {e}", self.name);
                self.state = CompositeState::Failed;
            }
        }
        results
    }

    fn on_success(&self, remover: &dyn FlowRemover, output: &Self::Output) {
        let Some(flows) = self.flows.as_ref() else {
            return;
        };
        if output.iter().all(Option::is_none) {
            return;
        }
        let specs = flows(&self.inputs, output);
        if !specs.is_empty() {
            let handle = remover.remove_flows(specs);
            debug!("{}: submitted flow removal {}", self.name, handle.0);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{CompositeState, CompositeTxTask, FnTask, TxTask, VtnUpdateType};
    use crate::config::VtnConfig;
    use crate::errors::VtnError;
    use crate::flow::{FlowRemovalHandle, FlowRemovalSpec, FlowRemover};
    use crate::ident::VnodeName;
    use crate::model::Node;
    use crate::txn::TxContext;
    use std::sync::Mutex;
    use store::DataStore;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Vec<FlowRemovalSpec>>>);

    impl FlowRemover for Recorder {
        fn remove_flows(&self, specs: Vec<FlowRemovalSpec>) -> FlowRemovalHandle {
            let mut jobs = self.0.lock().unwrap();
            jobs.push(specs);
            FlowRemovalHandle(jobs.len() as u64)
        }
    }

    fn tenant_flows(inputs: &[u32], results: &[Option<VtnUpdateType>]) -> Vec<FlowRemovalSpec> {
        inputs
            .iter()
            .zip(results)
            .filter(|(_, r)| r.is_some())
            .map(|(i, _)| FlowRemovalSpec::Tenant(VnodeName::new(format!("t{i}")).unwrap()))
            .collect()
    }

    #[test]
    fn results_follow_input_order() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let mut events = Vec::new();
        let mut completed = Vec::new();
        let mut task = CompositeTxTask::new("test", vec![3, 0, 2, 1], |_, input: &u32| {
            Ok(match input {
                0 => None,
                1 => Some(VtnUpdateType::Created),
                _ => Some(VtnUpdateType::Removed),
            })
        })
        .on_started(|_| {
            events.push("started");
            Ok(())
        })
        .on_completed(|_, results| {
            completed.extend_from_slice(results);
            Ok(())
        })
        .remove_flows_on_success(tenant_flows);
        assert_eq!(task.state(), CompositeState::Created);

        let results = task.execute(&mut ctx).unwrap();
        assert_eq!(task.state(), CompositeState::Completed);
        assert_eq!(
            results,
            vec![
                Some(VtnUpdateType::Removed),
                None,
                Some(VtnUpdateType::Removed),
                Some(VtnUpdateType::Created)
            ]
        );

        let recorder = Recorder::default();
        task.on_success(&recorder, &results);
        let jobs = recorder.0.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].len(), 3);
        assert_eq!(jobs[0][0], FlowRemovalSpec::Tenant(VnodeName::new("t3").unwrap()));
        drop(jobs);
        drop(task);
        assert_eq!(events, vec!["started"]);
        assert_eq!(completed, results);
    }

    #[test]
    fn first_failure_aborts() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let mut seen = Vec::new();
        let mut task = CompositeTxTask::new("test", vec![1, 2, 3], |_, input: &u32| {
            seen.push(*input);
            if *input == 2 {
                Err(VtnError::NotFound(format!("input {input}")))
            } else {
                Ok(Some(VtnUpdateType::Changed))
            }
        });
        assert_eq!(
            task.execute(&mut ctx),
            Err(VtnError::NotFound("input 2".to_string()))
        );
        assert_eq!(task.state(), CompositeState::Failed);
        drop(task);
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn no_flow_removal_without_changes() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let mut task = CompositeTxTask::new("test", vec![1, 2], |_, _: &u32| {
            Ok(None::<VtnUpdateType>)
        })
        .remove_flows_on_success(tenant_flows);
        let results = task.execute(&mut ctx).unwrap();
        let recorder = Recorder::default();
        task.on_success(&recorder, &results);
        assert!(recorder.0.lock().unwrap().is_empty());

        let mut simple = FnTask::new("simple", |_| Ok(7));
        assert_eq!(simple.name(), "simple");
        assert_eq!(simple.execute(&mut ctx), Ok(7));
    }
}
