//! Attach user-specific fields to a batch of recipes.
//!
//! Runs as a three-step graph:
//!
//! ```text
//! verifyToken -> getUserInfo -> annotate
//! ```
//!
//! Any failure (bad token, unknown user) aborts the whole batch; callers
//! never see a partially annotated result.

use std::sync::Arc;

use recipe_data::{AnnotatedRecipe, Identity, Recipe, UserInfo};
use stores::UsersStore;
use task_graph::{GraphError, TaskGraph, TaskGraphExecutor};
use tracing::debug;

use crate::annotate::annotate_all;

pub const VERIFY_TOKEN: &str = "verifyToken";
pub const GET_USER_INFO: &str = "getUserInfo";
pub const ANNOTATE: &str = "annotate";

/// Annotates recipes for the user a bearer token identifies.
#[derive(Clone)]
pub struct RecipeEnrichment {
    users: Arc<dyn UsersStore>,
    executor: TaskGraphExecutor,
}

impl RecipeEnrichment {
    pub fn new(users: Arc<dyn UsersStore>) -> Self {
        Self {
            users,
            executor: TaskGraphExecutor::new("enrichment"),
        }
    }

    /// Annotate `recipes` for the owner of `token`, keeping input order.
    ///
    /// # Returns
    /// * `Ok(Vec<AnnotatedRecipe>)` - One entry per input recipe
    /// * `Err(GraphError::Step)` - Naming the failing step; the source is
    ///   the store's `StoreError` (`Auth` or `NotFound`)
    pub async fn annotate(
        &self,
        token: &str,
        recipes: Vec<Recipe>,
    ) -> Result<Vec<AnnotatedRecipe>, GraphError> {
        debug!("Annotating {} recipes", recipes.len());
        let mut results = self.executor.run(self.build_graph(token, recipes)).await?;
        Ok(results.take::<Vec<AnnotatedRecipe>>(ANNOTATE)?)
    }

    fn build_graph(&self, token: &str, recipes: Vec<Recipe>) -> TaskGraph {
        let token = token.to_string();
        let verify_users = Arc::clone(&self.users);
        let info_users = Arc::clone(&self.users);

        TaskGraph::new()
            .add_step(VERIFY_TOKEN, &[], move |_| async move {
                let identity = verify_users.verify_token(&token).await?;
                Ok(identity)
            })
            .add_step(GET_USER_INFO, &[VERIFY_TOKEN], move |deps| async move {
                let identity = deps.get::<Identity>(VERIFY_TOKEN)?;
                let info = info_users.get_user_info(&identity.username).await?;
                Ok(info)
            })
            .add_step(ANNOTATE, &[GET_USER_INFO], move |deps| async move {
                let info = deps.get::<UserInfo>(GET_USER_INFO)?.clone();
                let annotated =
                    tokio::task::spawn_blocking(move || annotate_all(recipes, &info)).await?;
                Ok(annotated)
            })
    }
}
