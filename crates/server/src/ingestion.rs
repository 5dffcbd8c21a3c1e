//! Bulk catalog ingestion.
//!
//! The catalog's `{id, ingredients}` projection goes to the worker first
//! (in `ingest` mode); the full catalog is persisted only once the worker
//! accepted it:
//!
//! ```text
//! transmit -> persist
//! ```

use std::sync::Arc;

use recipe_data::{Recipe, RecipeFeatures};
use stores::RecipesStore;
use task_graph::{GraphError, TaskGraph, TaskGraphExecutor};
use tracing::info;
use worker_client::{ProcessPipeline, WorkerMode};

pub const TRANSMIT: &str = "transmit";
pub const PERSIST: &str = "persist";

#[derive(Clone)]
pub struct CatalogIngestion {
    worker: Arc<ProcessPipeline>,
    recipes: Arc<dyn RecipesStore>,
    executor: TaskGraphExecutor,
}

impl CatalogIngestion {
    pub fn new(worker: Arc<ProcessPipeline>, recipes: Arc<dyn RecipesStore>) -> Self {
        Self {
            worker,
            recipes,
            executor: TaskGraphExecutor::new("ingestion"),
        }
    }

    /// Feed `catalog` to the worker, then persist it.
    ///
    /// # Returns
    /// The number of recipes persisted. Nothing is persisted if the worker
    /// call fails.
    pub async fn ingest(&self, catalog: Vec<Recipe>) -> Result<usize, GraphError> {
        let features = project(&catalog);
        let count = catalog.len();
        let worker = Arc::clone(&self.worker);
        let recipes = Arc::clone(&self.recipes);

        let graph = TaskGraph::new()
            .add_step(TRANSMIT, &[], move |_| async move {
                worker.invoke(WorkerMode::Ingest, &features).await?;
                Ok(())
            })
            .add_step(PERSIST, &[TRANSMIT], move |_| async move {
                recipes.setup(catalog).await?;
                Ok(())
            });

        self.executor.run(graph).await?;
        info!("Ingested {} recipes", count);
        Ok(count)
    }
}

/// The worker-facing projection of a catalog.
pub fn project(catalog: &[Recipe]) -> Vec<RecipeFeatures> {
    catalog.iter().map(RecipeFeatures::from).collect()
}
