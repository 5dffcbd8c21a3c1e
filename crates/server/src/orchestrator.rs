//! # Recipe Orchestrator
//!
//! The caller-facing surface of the service. Every operation:
//! 1. Reads from the stores or runs one of the composition graphs
//! 2. Annotates returned recipes when the caller supplied a bearer token
//! 3. Collapses any failure into the opaque [`RequestFailed`] indicator,
//!    after logging the full error chain
//!
//! Callers only learn *that* a request failed, never why.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{error, info};

use recipe_data::{AnnotatedRecipe, Recipe, RecipeId};
use stores::{RecipesStore, UsersStore};
use worker_client::ProcessPipeline;

use crate::enrichment::RecipeEnrichment;
use crate::ingestion::CatalogIngestion;
use crate::recommendation::RecommendationPipeline;

/// Size of the top-recipes list, and the number of distinct liked recipes
/// needed before likes are used to rank it.
pub const TOP_RECIPES_LIMIT: usize = 8;

/// Generic failure indicator returned to callers
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("request failed")]
pub struct RequestFailed;

/// Main orchestrator wiring stores, worker and composition graphs together
#[derive(Clone)]
pub struct RecipeOrchestrator {
    recipes: Arc<dyn RecipesStore>,
    users: Arc<dyn UsersStore>,
    enrichment: RecipeEnrichment,
    recommendation: RecommendationPipeline,
    ingestion: CatalogIngestion,
}

impl RecipeOrchestrator {
    /// Create an orchestrator over the given collaborators.
    ///
    /// # Arguments
    /// * `recipes` - Recipe storage
    /// * `users` - Token verification and per-user state
    /// * `worker` - Launcher for the recommendation worker
    pub fn new(
        recipes: Arc<dyn RecipesStore>,
        users: Arc<dyn UsersStore>,
        worker: Arc<ProcessPipeline>,
    ) -> Self {
        Self {
            enrichment: RecipeEnrichment::new(users.clone()),
            recommendation: RecommendationPipeline::new(worker.clone(), recipes.clone()),
            ingestion: CatalogIngestion::new(worker, recipes.clone()),
            recipes,
            users,
        }
    }

    /// One recipe by id.
    pub async fn select_by_id(
        &self,
        id: RecipeId,
        token: Option<&str>,
    ) -> Result<AnnotatedRecipe, RequestFailed> {
        let result = async {
            let recipe = self.recipes.select_by_id(id).await?;
            self.personalize(vec![recipe], token)
                .await?
                .pop()
                .ok_or_else(|| anyhow!("annotation dropped recipe {id}"))
        };
        respond("select_by_id", result.await)
    }

    /// The recipes for `ids`, or the whole catalog when no ids are given.
    pub async fn select(
        &self,
        ids: Option<&[RecipeId]>,
        token: Option<&str>,
    ) -> Result<Vec<AnnotatedRecipe>, RequestFailed> {
        let result = async {
            let recipes = match ids {
                Some(ids) if !ids.is_empty() => self.recipes.select_by_ids(ids).await?,
                _ => self.recipes.select_all().await?,
            };
            self.personalize(recipes, token).await
        };
        respond("select", result.await)
    }

    /// Free-text search over the catalog.
    pub async fn search(
        &self,
        query: &str,
        token: Option<&str>,
    ) -> Result<Vec<AnnotatedRecipe>, RequestFailed> {
        let result = async {
            let recipes = self.recipes.search(query).await?;
            self.personalize(recipes, token).await
        };
        respond("search", result.await)
    }

    /// The most liked recipes.
    ///
    /// With fewer than [`TOP_RECIPES_LIMIT`] distinct liked recipes there is
    /// no meaningful ranking yet, so a random selection is returned instead.
    pub async fn top_recipes(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<AnnotatedRecipe>, RequestFailed> {
        let result = async {
            let counts = self.users.count_liked_recipes().await?;
            let recipes = match rank_liked(&counts, TOP_RECIPES_LIMIT) {
                Some(ids) => self.recipes.select_by_ids(&ids).await?,
                None => {
                    info!(
                        "Only {} liked recipes, falling back to random selection",
                        counts.len()
                    );
                    self.recipes.get_random(TOP_RECIPES_LIMIT).await?
                }
            };
            self.personalize(recipes, token).await
        };
        respond("top_recipes", result.await)
    }

    /// Up to `n` random recipes.
    pub async fn random(
        &self,
        n: usize,
        token: Option<&str>,
    ) -> Result<Vec<AnnotatedRecipe>, RequestFailed> {
        let result = async {
            let recipes = self.recipes.get_random(n).await?;
            self.personalize(recipes, token).await
        };
        respond("random", result.await)
    }

    /// Recipes the worker recommends for `id`.
    pub async fn recommend(
        &self,
        id: RecipeId,
        token: Option<&str>,
    ) -> Result<Vec<AnnotatedRecipe>, RequestFailed> {
        let start_time = Instant::now();
        let result = async {
            let recipes = self
                .recommendation
                .recommend(id)
                .await
                .with_context(|| format!("recommending for recipe {id}"))?;
            self.personalize(recipes, token).await
        };
        let response = respond("recommend", result.await);
        info!(
            "Recommendation request for recipe {} took {:.2?}",
            id,
            start_time.elapsed()
        );
        response
    }

    /// Feed a catalog to the worker and persist it; returns the count.
    pub async fn ingest(&self, catalog: Vec<Recipe>) -> Result<usize, RequestFailed> {
        let result = self
            .ingestion
            .ingest(catalog)
            .await
            .context("ingesting catalog");
        respond("ingest", result)
    }

    /// Remove every recipe from the store.
    pub async fn clean(&self) -> Result<(), RequestFailed> {
        let result = self.recipes.clean().await.context("cleaning recipe store");
        respond("clean", result)
    }

    /// Annotate when a token was supplied; pass recipes through otherwise.
    async fn personalize(
        &self,
        recipes: Vec<Recipe>,
        token: Option<&str>,
    ) -> Result<Vec<AnnotatedRecipe>> {
        match token {
            Some(token) => self
                .enrichment
                .annotate(token, recipes)
                .await
                .context("annotating recipes"),
            None => Ok(recipes.into_iter().map(AnnotatedRecipe::plain).collect()),
        }
    }
}

/// The `limit` most liked recipe ids, most liked first (ties by id).
///
/// Returns `None` when fewer than `limit` distinct recipes have likes.
pub fn rank_liked(counts: &HashMap<RecipeId, u64>, limit: usize) -> Option<Vec<RecipeId>> {
    if counts.len() < limit {
        return None;
    }
    let mut ranked: Vec<(RecipeId, u64)> = counts.iter().map(|(&id, &n)| (id, n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(limit);
    Some(ranked.into_iter().map(|(id, _)| id).collect())
}

/// Log a failure with its full chain and hide it behind `RequestFailed`.
fn respond<T>(operation: &str, result: Result<T>) -> Result<T, RequestFailed> {
    result.map_err(|e| {
        error!("{} failed: {:#}", operation, e);
        RequestFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_liked_needs_enough_distinct_recipes() {
        let counts: HashMap<RecipeId, u64> = (1..=7).map(|id| (id, 10)).collect();
        assert_eq!(rank_liked(&counts, TOP_RECIPES_LIMIT), None);
    }

    #[test]
    fn test_rank_liked_orders_by_count_then_id() {
        let counts: HashMap<RecipeId, u64> =
            HashMap::from([(1, 1), (2, 5), (3, 5), (4, 9), (5, 2), (6, 1), (7, 3), (8, 1), (9, 1)]);

        let ranked = rank_liked(&counts, TOP_RECIPES_LIMIT).unwrap();
        assert_eq!(ranked, vec![4, 2, 3, 7, 5, 1, 6, 8]);
    }

    #[test]
    fn test_respond_hides_error_detail() {
        let failed: Result<u8, RequestFailed> = respond("test", Err(anyhow!("secret detail")));
        assert_eq!(failed, Err(RequestFailed));
        assert_eq!(RequestFailed.to_string(), "request failed");
    }
}
