//! Recipe recommendations backed by the worker process.
//!
//! Runs as a two-step graph:
//!
//! ```text
//! recommend -> fetchDetails
//! ```
//!
//! `recommend` asks the worker (in `recommend` mode) for the ids related to
//! one recipe; `fetchDetails` resolves those ids to full records.

use std::sync::Arc;

use recipe_data::{Recipe, RecipeId, RecommendationTable};
use stores::RecipesStore;
use task_graph::{GraphError, TaskGraph, TaskGraphExecutor};
use tracing::debug;
use worker_client::{ProcessPipeline, WorkerError, WorkerMode};

pub const RECOMMEND: &str = "recommend";
pub const FETCH_DETAILS: &str = "fetchDetails";

#[derive(Clone)]
pub struct RecommendationPipeline {
    worker: Arc<ProcessPipeline>,
    recipes: Arc<dyn RecipesStore>,
    executor: TaskGraphExecutor,
}

impl RecommendationPipeline {
    pub fn new(worker: Arc<ProcessPipeline>, recipes: Arc<dyn RecipesStore>) -> Self {
        Self {
            worker,
            recipes,
            executor: TaskGraphExecutor::new("recommendation"),
        }
    }

    /// Recipes recommended for `recipe_id`, in the worker's order.
    ///
    /// An empty recommendation list yields an empty collection.
    pub async fn recommend(&self, recipe_id: RecipeId) -> Result<Vec<Recipe>, GraphError> {
        let mut results = self.executor.run(self.build_graph(recipe_id)).await?;
        Ok(results.take::<Vec<Recipe>>(FETCH_DETAILS)?)
    }

    fn build_graph(&self, recipe_id: RecipeId) -> TaskGraph {
        let worker = Arc::clone(&self.worker);
        let recipes = Arc::clone(&self.recipes);

        TaskGraph::new()
            .add_step(RECOMMEND, &[], move |_| async move {
                let table: RecommendationTable = worker
                    .invoke_for_result(WorkerMode::Recommend, &[recipe_id])
                    .await?;
                let ids = recommended_ids(table, recipe_id)?;
                debug!("Worker recommended {} recipes for {}", ids.len(), recipe_id);
                Ok(ids)
            })
            .add_step(FETCH_DETAILS, &[RECOMMEND], move |deps| async move {
                let ids = deps.get::<Vec<RecipeId>>(RECOMMEND)?;
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let details = recipes.select_by_ids(ids).await?;
                Ok(details)
            })
    }
}

/// Pull the list for `recipe_id` out of the worker's table.
///
/// A table without an entry for the requested id does not answer the
/// question that was asked, so it is treated as malformed.
fn recommended_ids(
    mut table: RecommendationTable,
    recipe_id: RecipeId,
) -> Result<Vec<RecipeId>, WorkerError> {
    table
        .remove(&recipe_id)
        .ok_or_else(|| WorkerError::MalformedOutput {
            mode: WorkerMode::Recommend,
            reason: format!("no entry for recipe {recipe_id}"),
        })
}
