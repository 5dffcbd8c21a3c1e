//! In-memory store implementations.
//!
//! These back the command-line front end and the test suites. State lives
//! behind `tokio::sync::RwLock` so reads from concurrently running steps
//! never block each other.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use recipe_data::{Identity, Recipe, RecipeId, UserInfo, UserRecord};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{RecipesStore, UsersStore};

/// Recipes keyed by id.
#[derive(Default)]
pub struct MemoryRecipesStore {
    recipes: RwLock<BTreeMap<RecipeId, Recipe>>,
}

impl MemoryRecipesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `catalog`.
    pub fn with_catalog(catalog: Vec<Recipe>) -> Self {
        let recipes = catalog.into_iter().map(|r| (r.id, r)).collect();
        Self {
            recipes: RwLock::new(recipes),
        }
    }

    pub async fn len(&self) -> usize {
        self.recipes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.recipes.read().await.is_empty()
    }
}

#[async_trait]
impl RecipesStore for MemoryRecipesStore {
    async fn select_by_id(&self, id: RecipeId) -> Result<Recipe, StoreError> {
        self.recipes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("recipe", id))
    }

    async fn select_by_ids(&self, ids: &[RecipeId]) -> Result<Vec<Recipe>, StoreError> {
        let recipes = self.recipes.read().await;
        let found: Vec<Recipe> = ids.iter().filter_map(|id| recipes.get(id).cloned()).collect();
        if found.len() != ids.len() {
            debug!(
                "select_by_ids: {} of {} requested recipes exist",
                found.len(),
                ids.len()
            );
        }
        Ok(found)
    }

    async fn select_all(&self) -> Result<Vec<Recipe>, StoreError> {
        Ok(self.recipes.read().await.values().cloned().collect())
    }

    async fn get_random(&self, n: usize) -> Result<Vec<Recipe>, StoreError> {
        let all: Vec<Recipe> = self.recipes.read().await.values().cloned().collect();
        Ok(sample(&all, n))
    }

    async fn search(&self, query: &str) -> Result<Vec<Recipe>, StoreError> {
        let needle = query.trim().to_lowercase();
        let recipes = self.recipes.read().await;
        Ok(recipes
            .values()
            .filter(|recipe| matches_query(recipe, &needle))
            .cloned()
            .collect())
    }

    async fn setup(&self, catalog: Vec<Recipe>) -> Result<(), StoreError> {
        let mut recipes = self.recipes.write().await;
        let count = catalog.len();
        for recipe in catalog {
            recipes.insert(recipe.id, recipe);
        }
        debug!("Stored {} recipes, {} total", count, recipes.len());
        Ok(())
    }

    async fn clean(&self) -> Result<(), StoreError> {
        self.recipes.write().await.clear();
        Ok(())
    }
}

/// Pick up to `n` distinct recipes, in random order.
fn sample(recipes: &[Recipe], n: usize) -> Vec<Recipe> {
    let mut rng = rand::rng();
    recipes.choose_multiple(&mut rng, n).cloned().collect()
}

/// Case-insensitive substring match over every string field of the recipe
/// and its ingredients. An empty needle matches everything.
fn matches_query(recipe: &Recipe, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    recipe.details.values().any(|v| value_contains(v, needle))
        || recipe
            .ingredients()
            .iter()
            .any(|i| i.details.values().any(|v| value_contains(v, needle)))
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| value_contains(v, needle)),
        Value::Object(map) => map.values().any(|v| value_contains(v, needle)),
        _ => false,
    }
}

/// Users keyed by username, with a token table in front.
#[derive(Default)]
pub struct MemoryUsersStore {
    tokens: HashMap<String, Identity>,
    users: RwLock<HashMap<String, UserInfo>>,
}

impl MemoryUsersStore {
    pub fn new(records: Vec<UserRecord>) -> Self {
        let mut tokens = HashMap::with_capacity(records.len());
        let mut users = HashMap::with_capacity(records.len());
        for record in records {
            tokens.insert(
                record.token,
                Identity {
                    username: record.username.clone(),
                },
            );
            users.insert(record.username, record.info);
        }
        Self {
            tokens,
            users: RwLock::new(users),
        }
    }

    /// Register a token for a username that has no stored state.
    ///
    /// Verification succeeds for it but `get_user_info` reports `NotFound`.
    pub fn with_dangling_token(mut self, token: impl Into<String>, username: impl Into<String>) -> Self {
        self.tokens.insert(
            token.into(),
            Identity {
                username: username.into(),
            },
        );
        self
    }
}

#[async_trait]
impl UsersStore for MemoryUsersStore {
    async fn verify_token(&self, token: &str) -> Result<Identity, StoreError> {
        if token.is_empty() {
            return Err(StoreError::Auth("missing token".to_string()));
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| StoreError::Auth("invalid token".to_string()))
    }

    async fn get_user_info(&self, username: &str) -> Result<UserInfo, StoreError> {
        self.users
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", username))
    }

    async fn count_liked_recipes(&self) -> Result<HashMap<RecipeId, u64>, StoreError> {
        let users = self.users.read().await;
        let mut counts: HashMap<RecipeId, u64> = HashMap::new();
        for info in users.values() {
            for &recipe_id in &info.liked_recipes {
                *counts.entry(recipe_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn catalog() -> Vec<Recipe> {
        vec![
            Recipe::new(1).with_detail("name", "Tomato Soup"),
            Recipe::new(2).with_detail("name", "Green Salad"),
            Recipe::new(3)
                .with_detail("name", "Pasta")
                .with_detail("tags", serde_json::json!(["Italian", "quick"])),
        ]
    }

    fn user(username: &str, token: &str, liked: &[RecipeId]) -> UserRecord {
        UserRecord {
            username: username.to_string(),
            token: token.to_string(),
            info: UserInfo {
                meal_plan: None,
                liked_recipes: liked.iter().copied().collect(),
            },
        }
    }

    #[tokio::test]
    async fn test_select_by_id() {
        let store = MemoryRecipesStore::with_catalog(catalog());

        let recipe = store.select_by_id(2).await.unwrap();
        assert_eq!(recipe.name(), Some("Green Salad"));

        let missing = store.select_by_id(99).await;
        assert!(matches!(missing, Err(StoreError::NotFound { entity: "recipe", .. })));
    }

    #[tokio::test]
    async fn test_select_by_ids_keeps_request_order() {
        let store = MemoryRecipesStore::with_catalog(catalog());

        let recipes = store.select_by_ids(&[3, 99, 1]).await.unwrap();
        let ids: Vec<_> = recipes.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_get_random_is_distinct_and_bounded() {
        let store = MemoryRecipesStore::with_catalog(catalog());

        let two = store.get_random(2).await.unwrap();
        assert_eq!(two.len(), 2);
        let ids: HashSet<_> = two.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 2);

        let all = store.get_random(10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = MemoryRecipesStore::with_catalog(catalog());

        let soups = store.search("SOUP").await.unwrap();
        assert_eq!(soups.len(), 1);
        assert_eq!(soups[0].id, 1);

        let tagged = store.search("italian").await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, 3);

        assert!(store.search("nothing like it").await.unwrap().is_empty());
        assert_eq!(store.search("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_setup_and_clean() {
        let store = MemoryRecipesStore::new();
        assert!(store.is_empty().await);

        store.setup(catalog()).await.unwrap();
        assert_eq!(store.len().await, 3);

        store.clean().await.unwrap();
        assert!(store.select_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verify_token() {
        let store = MemoryUsersStore::new(vec![user("ana", "t-ana", &[])]);

        let identity = store.verify_token("t-ana").await.unwrap();
        assert_eq!(identity.username, "ana");

        assert!(matches!(store.verify_token("nope").await, Err(StoreError::Auth(_))));
        assert!(matches!(store.verify_token("").await, Err(StoreError::Auth(_))));
    }

    #[tokio::test]
    async fn test_dangling_token_has_no_user_info() {
        let store = MemoryUsersStore::new(vec![]).with_dangling_token("t-ghost", "ghost");

        let identity = store.verify_token("t-ghost").await.unwrap();
        let info = store.get_user_info(&identity.username).await;
        assert!(matches!(info, Err(StoreError::NotFound { entity: "user", .. })));
    }

    #[tokio::test]
    async fn test_count_liked_recipes() {
        let store = MemoryUsersStore::new(vec![
            user("ana", "t-ana", &[1, 2]),
            user("bo", "t-bo", &[2]),
        ]);

        let counts = store.count_liked_recipes().await.unwrap();
        assert_eq!(counts.get(&1), Some(&1));
        assert_eq!(counts.get(&2), Some(&2));
        assert_eq!(counts.get(&3), None);
    }
}
