//! Dependency-ordered execution of named asynchronous steps.
//!
//! This crate provides:
//! - [`TaskGraph`] for declaring steps and the steps they depend on
//! - [`TaskGraphExecutor`] for running a graph to completion
//! - [`ResultSet`] holding the value each completed step produced
//!
//! ## Architecture
//! A run proceeds in three stages:
//! 1. The graph is validated: unknown dependencies, duplicate ids and
//!    cycles are rejected before any step starts
//! 2. Every step whose dependencies have all succeeded is launched at once;
//!    each completion immediately launches the dependents it unblocks
//! 3. The first failure stops new launches; the run reports it once every
//!    in-flight step has settled
//!
//! ## Example Usage
//! ```ignore
//! use task_graph::{TaskGraph, TaskGraphExecutor};
//!
//! let graph = TaskGraph::new()
//!     .add_step("left", &[], |_| async { Ok(2_u32) })
//!     .add_step("right", &[], |_| async { Ok(3_u32) })
//!     .add_step("sum", &["left", "right"], |deps| async move {
//!         Ok(deps.get::<u32>("left")? + deps.get::<u32>("right")?)
//!     });
//!
//! let mut results = TaskGraphExecutor::new("example").run(graph).await?;
//! assert_eq!(results.take::<u32>("sum")?, 5);
//! ```

pub mod error;
pub mod executor;
pub mod graph;
pub mod result_set;

// Re-export main types
pub use error::{GraphDefinitionError, GraphError, ResultError};
pub use executor::TaskGraphExecutor;
pub use graph::{Step, TaskGraph};
pub use result_set::ResultSet;
