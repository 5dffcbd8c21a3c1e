//! Step declarations and graph validation.
//!
//! A [`TaskGraph`] is a plain declaration: steps can be added in any order,
//! and nothing is checked until [`TaskGraph::validate`] runs (the executor
//! always calls it before launching anything). Declaration order never
//! affects execution order.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::GraphDefinitionError;
use crate::result_set::{ResultSet, StepValue};

pub(crate) type StepFuture = Pin<Box<dyn Future<Output = anyhow::Result<StepValue>> + Send>>;
pub(crate) type Computation = Box<dyn FnOnce(ResultSet) -> StepFuture + Send>;

/// One named unit of work.
pub struct Step {
    pub(crate) id: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) computation: Computation,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// A set of steps and their dependencies, built once per run.
///
/// ## Usage
/// ```ignore
/// let graph = TaskGraph::new()
///     .add_step("verify", &[], |_| async { Ok(identity) })
///     .add_step("load", &["verify"], |deps| async move {
///         let identity = deps.get::<Identity>("verify")?;
///         load_profile(identity).await
///     });
/// ```
#[derive(Debug, Default)]
pub struct TaskGraph {
    steps: Vec<Step>,
}

impl TaskGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step (builder pattern).
    ///
    /// # Arguments
    /// * `id` - Step identifier, unique within the graph
    /// * `dependencies` - Steps that must succeed before this one starts
    /// * `computation` - Receives the results of `dependencies` only
    pub fn add_step<T, F, Fut>(mut self, id: impl Into<String>, dependencies: &[&str], computation: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(ResultSet) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let computation: Computation = Box::new(move |deps| {
            let fut = computation(deps);
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as StepValue) })
        });
        self.steps.push(Step {
            id: id.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            computation,
        });
        self
    }

    /// Check the graph and return a topological order of its step ids.
    ///
    /// ## Algorithm
    /// 1. Reject duplicate ids and references to undeclared steps
    /// 2. Kahn's algorithm over in-degrees; ties resolve in declaration order
    /// 3. Any step left unvisited sits on, or behind, a cycle
    pub fn validate(&self) -> Result<Vec<String>, GraphDefinitionError> {
        let mut declared = HashSet::with_capacity(self.steps.len());
        for step in &self.steps {
            if !declared.insert(step.id.as_str()) {
                return Err(GraphDefinitionError::DuplicateStep(step.id.clone()));
            }
        }
        for step in &self.steps {
            if let Some(missing) = step.dependencies.iter().find(|d| !declared.contains(d.as_str())) {
                return Err(GraphDefinitionError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(self.steps.len());
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for step in &self.steps {
            let unique: HashSet<&str> = step.dependencies.iter().map(String::as_str).collect();
            in_degree.insert(step.id.as_str(), unique.len());
            for dependency in unique {
                dependents.entry(dependency).or_default().push(step.id.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .steps
            .iter()
            .map(|s| s.id.as_str())
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.steps.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            for &dependent in dependents.get(id).map(Vec::as_slice).unwrap_or_default() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != self.steps.len() {
            let visited: HashSet<&str> = order.iter().map(String::as_str).collect();
            let mut steps: Vec<String> = self
                .steps
                .iter()
                .filter(|s| !visited.contains(s.id.as_str()))
                .map(|s| s.id.clone())
                .collect();
            steps.sort_unstable();
            return Err(GraphDefinitionError::Cycle { steps });
        }

        Ok(order)
    }

    pub(crate) fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(graph: TaskGraph, id: &str, deps: &[&str]) -> TaskGraph {
        graph.add_step(id, deps, |_| async { Ok(()) })
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = TaskGraph::new();
        assert_eq!(graph.validate(), Ok(vec![]));
    }

    #[test]
    fn test_order_follows_dependencies_not_declaration() {
        let mut graph = TaskGraph::new();
        graph = noop(graph, "annotate", &["profile"]);
        graph = noop(graph, "profile", &["token"]);
        graph = noop(graph, "token", &[]);

        assert_eq!(
            graph.validate().unwrap(),
            vec!["token".to_string(), "profile".to_string(), "annotate".to_string()]
        );
    }

    #[test]
    fn test_diamond_order() {
        let mut graph = TaskGraph::new();
        graph = noop(graph, "source", &[]);
        graph = noop(graph, "left", &["source"]);
        graph = noop(graph, "right", &["source"]);
        graph = noop(graph, "sink", &["left", "right"]);

        let order = graph.validate().unwrap();
        let position = |id: &str| order.iter().position(|s| s == id).unwrap();
        assert_eq!(position("source"), 0);
        assert!(position("left") < position("sink"));
        assert!(position("right") < position("sink"));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let mut graph = TaskGraph::new();
        graph = noop(graph, "a", &[]);
        graph = noop(graph, "a", &[]);

        assert_eq!(
            graph.validate(),
            Err(GraphDefinitionError::DuplicateStep("a".to_string()))
        );
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let graph = noop(TaskGraph::new(), "a", &["ghost"]);

        assert_eq!(
            graph.validate(),
            Err(GraphDefinitionError::UnknownDependency {
                step: "a".to_string(),
                dependency: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_two_step_cycle_rejected() {
        let mut graph = TaskGraph::new();
        graph = noop(graph, "a", &["b"]);
        graph = noop(graph, "b", &["a"]);

        assert_eq!(
            graph.validate(),
            Err(GraphDefinitionError::Cycle {
                steps: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = noop(TaskGraph::new(), "loop", &["loop"]);

        assert!(matches!(graph.validate(), Err(GraphDefinitionError::Cycle { .. })));
    }

    #[test]
    fn test_cycle_reports_blocked_steps_only() {
        let mut graph = TaskGraph::new();
        graph = noop(graph, "root", &[]);
        graph = noop(graph, "a", &["root", "c"]);
        graph = noop(graph, "b", &["a"]);
        graph = noop(graph, "c", &["b"]);
        graph = noop(graph, "after", &["c"]);

        let Err(GraphDefinitionError::Cycle { steps }) = graph.validate() else {
            panic!("expected a cycle");
        };
        assert_eq!(steps, vec!["a", "after", "b", "c"]);
    }

    #[test]
    fn test_repeated_dependency_counts_once() {
        let mut graph = TaskGraph::new();
        graph = noop(graph, "a", &[]);
        graph = noop(graph, "b", &["a", "a"]);

        assert_eq!(graph.validate().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}
