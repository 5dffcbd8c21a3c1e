//! Collaborator traits for recipe and user storage.

use std::collections::HashMap;

use async_trait::async_trait;
use recipe_data::{Identity, Recipe, RecipeId, UserInfo};

use crate::error::StoreError;

/// Recipe persistence.
///
/// ## Design Note
/// - `Send + Sync` so one store can be shared (`Arc<dyn RecipesStore>`)
///   across concurrently running steps
/// - Every call is a suspension point for the caller
#[async_trait]
pub trait RecipesStore: Send + Sync {
    /// Fetch one recipe, failing with `NotFound` on a miss.
    async fn select_by_id(&self, id: RecipeId) -> Result<Recipe, StoreError>;

    /// Fetch the recipes for `ids`, in the order requested.
    ///
    /// Unknown ids are skipped rather than reported.
    async fn select_by_ids(&self, ids: &[RecipeId]) -> Result<Vec<Recipe>, StoreError>;

    /// Every recipe in the store.
    async fn select_all(&self) -> Result<Vec<Recipe>, StoreError>;

    /// Up to `n` distinct recipes chosen at random.
    async fn get_random(&self, n: usize) -> Result<Vec<Recipe>, StoreError>;

    /// Recipes matching a free-text query.
    async fn search(&self, query: &str) -> Result<Vec<Recipe>, StoreError>;

    /// Persist a catalog, replacing records with the same id.
    async fn setup(&self, catalog: Vec<Recipe>) -> Result<(), StoreError>;

    /// Remove every recipe.
    async fn clean(&self) -> Result<(), StoreError>;
}

/// User persistence and token verification.
#[async_trait]
pub trait UsersStore: Send + Sync {
    /// Decode a bearer token into an identity, failing with `Auth`.
    async fn verify_token(&self, token: &str) -> Result<Identity, StoreError>;

    /// Meal plan and liked recipes for a user, failing with `NotFound`.
    async fn get_user_info(&self, username: &str) -> Result<UserInfo, StoreError>;

    /// Number of users who liked each recipe.
    async fn count_liked_recipes(&self) -> Result<HashMap<RecipeId, u64>, StoreError>;
}
