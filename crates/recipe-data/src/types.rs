//! Core domain types for recipes, users and the worker exchange.
//!
//! Recipes are kept close to their stored JSON shape: the fields the system
//! reasons about (`id`, `ingredients`) are typed, everything else rides along
//! untouched in a flattened map so a record survives a load/annotate/print
//! cycle without losing data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a recipe
pub type RecipeId = u32;

/// Unique identifier for an ingredient
pub type IngredientId = u32;

/// A user's meal plan: slot name (e.g. "breakfast") -> ordered recipe ids
pub type MealPlan = BTreeMap<String, Vec<RecipeId>>;

/// Worker output for the `recommend` mode: recipe id -> recommended ids
pub type RecommendationTable = BTreeMap<RecipeId, Vec<RecipeId>>;

// =============================================================================
// Recipe-related Types
// =============================================================================

/// A recipe record as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    /// `None` when the record has no `ingredients` field at all, so an
    /// explicit empty list survives a round trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<IngredientRef>>,
    /// Remaining fields (name, instructions, images, ...) kept verbatim
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Recipe {
    /// Create a bare recipe with no ingredients or details.
    pub fn new(id: RecipeId) -> Self {
        Self {
            id,
            ingredients: None,
            details: Map::new(),
        }
    }

    /// Add an ingredient reference (builder pattern, mostly for fixtures).
    pub fn with_ingredient(mut self, ingredient_id: IngredientId) -> Self {
        self.ingredients
            .get_or_insert_with(Vec::new)
            .push(IngredientRef::new(ingredient_id));
        self
    }

    /// Set a free-form detail field (builder pattern).
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// The recipe's display name, if the record carries one.
    pub fn name(&self) -> Option<&str> {
        self.details.get("name").and_then(Value::as_str)
    }

    /// Ingredient references, empty when the record lists none.
    pub fn ingredients(&self) -> &[IngredientRef] {
        self.ingredients.as_deref().unwrap_or_default()
    }

    /// Ids of every ingredient, in declaration order.
    pub fn ingredient_ids(&self) -> Vec<IngredientId> {
        self.ingredients().iter().map(|i| i.ingredient_id).collect()
    }
}

/// Reference from a recipe to one of its ingredients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRef {
    #[serde(rename = "ingredientID")]
    pub ingredient_id: IngredientId,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl IngredientRef {
    pub fn new(ingredient_id: IngredientId) -> Self {
        Self {
            ingredient_id,
            details: Map::new(),
        }
    }
}

/// Projection of a recipe sent to the worker in `ingest` mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeFeatures {
    pub id: RecipeId,
    pub ingredients: Vec<IngredientId>,
}

impl From<&Recipe> for RecipeFeatures {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            ingredients: recipe.ingredient_ids(),
        }
    }
}

// =============================================================================
// User-related Types
// =============================================================================

/// Identity decoded from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
}

/// The per-user state used to annotate recipes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// `None` and an empty plan both mean "no slots"
    #[serde(default)]
    pub meal_plan: Option<MealPlan>,
    #[serde(default)]
    pub liked_recipes: HashSet<RecipeId>,
}

/// A user entry in the users file: credentials plus state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub token: String,
    #[serde(flatten)]
    pub info: UserInfo,
}

// =============================================================================
// Annotation Types
// =============================================================================

/// User-specific fields attached to a recipe for a single response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSpecificInformation {
    /// Names of the meal-plan slots containing the recipe
    pub meal_plan: Vec<String>,
    /// Whether the user liked the recipe
    pub liked_recipes: bool,
}

/// A recipe as returned to a caller, optionally annotated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_specific_information: Option<UserSpecificInformation>,
}

impl AnnotatedRecipe {
    /// Wrap a recipe without any user-specific information.
    pub fn plain(recipe: Recipe) -> Self {
        Self {
            recipe,
            user_specific_information: None,
        }
    }
}
