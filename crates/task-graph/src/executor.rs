//! The TaskGraphExecutor runs a validated graph to completion.
//!
//! Steps are spawned onto the tokio runtime as soon as their last
//! dependency succeeds. The run loop is the only writer of the
//! [`ResultSet`]; steps only ever see immutable views of it.
//!
//! In-flight steps belong to the run's `JoinSet`, so dropping a `run`
//! future aborts them rather than leaving them detached.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::anyhow;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

use crate::error::GraphError;
use crate::graph::{Step, TaskGraph};
use crate::result_set::{ResultSet, StepValue};

/// Steps currently running, keyed by the task that runs them.
struct InFlight {
    tasks: JoinSet<anyhow::Result<StepValue>>,
    steps: HashMap<Id, String>,
}

/// Runs task graphs. Holds no per-run state, so one executor can serve
/// any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct TaskGraphExecutor {
    name: String,
}

impl TaskGraphExecutor {
    /// Create an executor; `name` only labels log output.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Run every step of `graph` and return the value each one produced.
    ///
    /// ## Algorithm
    /// 1. Validate the graph; a malformed graph fails before anything runs
    /// 2. Launch every step without dependencies
    /// 3. When a step succeeds, record its value and launch each dependent
    ///    whose dependencies have now all succeeded
    /// 4. After the first failure, launch nothing new; wait for in-flight
    ///    steps to settle, then report that first failure
    ///
    /// # Returns
    /// * `Ok(ResultSet)` - One entry per step
    /// * `Err(GraphError)` - Definition error, or the first step failure
    pub async fn run(&self, graph: TaskGraph) -> Result<ResultSet, GraphError> {
        let start_time = Instant::now();
        let order = graph.validate()?;
        debug!("[{}] Execution order: {:?}", self.name, order);

        let mut remaining: HashMap<String, usize> = HashMap::with_capacity(order.len());
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut waiting: HashMap<String, Step> = HashMap::with_capacity(order.len());
        for mut step in graph.into_steps() {
            step.dependencies.sort_unstable();
            step.dependencies.dedup();
            remaining.insert(step.id.clone(), step.dependencies.len());
            for dependency in &step.dependencies {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .push(step.id.clone());
            }
            waiting.insert(step.id.clone(), step);
        }

        let mut results = ResultSet::new();
        let mut in_flight = InFlight {
            tasks: JoinSet::new(),
            steps: HashMap::with_capacity(order.len()),
        };
        let mut failure: Option<GraphError> = None;

        for id in order.iter().filter(|id| remaining[id.as_str()] == 0) {
            if let Some(step) = waiting.remove(id) {
                self.launch(step, &results, &mut in_flight);
            }
        }

        while let Some(joined) = in_flight.tasks.join_next_with_id().await {
            // A panicking step surfaces as a JoinError carrying its task id.
            let (task_id, outcome) = match joined {
                Ok((task_id, outcome)) => (task_id, outcome),
                Err(join_error) => (join_error.id(), Err(anyhow!("step task aborted: {join_error}"))),
            };
            let Some(id) = in_flight.steps.remove(&task_id) else {
                warn!("[{}] Task {} settled without a step", self.name, task_id);
                continue;
            };

            let value = match outcome {
                Ok(value) => value,
                Err(source) => {
                    self.record_failure(&mut failure, GraphError::Step { step: id, source });
                    continue;
                }
            };

            debug!("[{}] Step '{}' completed", self.name, id);
            results.insert(id.clone(), value);

            if failure.is_some() {
                continue;
            }
            for dependent in dependents.remove(&id).unwrap_or_default() {
                let Some(count) = remaining.get_mut(&dependent) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    if let Some(step) = waiting.remove(&dependent) {
                        self.launch(step, &results, &mut in_flight);
                    }
                }
            }
        }

        if let Some(error) = failure {
            warn!(
                "[{}] Run failed after {:.2?}; {} step(s) never started",
                self.name,
                start_time.elapsed(),
                waiting.len()
            );
            return Err(error);
        }

        debug_assert!(waiting.is_empty(), "validated graph left steps unstarted");
        info!(
            "[{}] Completed {} step(s) in {:.2?}",
            self.name,
            results.len(),
            start_time.elapsed()
        );
        Ok(results)
    }

    /// Spawn a step with a view of its dependencies' results.
    fn launch(&self, step: Step, results: &ResultSet, in_flight: &mut InFlight) {
        debug!("[{}] Launching step '{}'", self.name, step.id);
        let view = results.view(&step.dependencies);
        let Step { id, computation, .. } = step;
        let handle = in_flight.tasks.spawn(computation(view));
        in_flight.steps.insert(handle.id(), id);
    }

    /// Keep the first failure; later ones are only logged.
    fn record_failure(&self, failure: &mut Option<GraphError>, error: GraphError) {
        if failure.is_none() {
            warn!("[{}] {}; no further steps will start", self.name, error);
            *failure = Some(error);
        } else {
            debug!("[{}] Ignoring later failure: {}", self.name, error);
        }
    }
}

impl Default for TaskGraphExecutor {
    fn default() -> Self {
        Self::new("task-graph")
    }
}
