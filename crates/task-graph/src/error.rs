//! Error types for graph construction and execution.

use thiserror::Error;

/// The step graph itself is malformed. Raised before any step runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphDefinitionError {
    #[error("step '{0}' is declared more than once")]
    DuplicateStep(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// Steps that can never become ready, sorted by id
    #[error("dependency cycle among steps: {}", .steps.join(", "))]
    Cycle { steps: Vec<String> },
}

/// Outcome of a failed graph run
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("invalid task graph: {0}")]
    Definition(#[from] GraphDefinitionError),

    /// A step's computation failed (or panicked); the source is the error
    /// the step returned, untouched
    #[error("step '{step}' failed: {source:#}")]
    Step {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// A finished run did not hold the value the caller asked for
    #[error("reading run output: {0}")]
    Output(#[from] ResultError),
}

impl GraphError {
    /// Id of the step that failed, for step failures.
    pub fn step(&self) -> Option<&str> {
        match self {
            GraphError::Step { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Downcast the failing step's error to a concrete type.
    pub fn step_error<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            GraphError::Step { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Typed access to a [`crate::ResultSet`] entry failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("no result recorded for step '{0}'")]
    Missing(String),

    #[error("result of step '{step}' is not a {expected}")]
    TypeMismatch { step: String, expected: &'static str },
}
