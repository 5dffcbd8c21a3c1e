//! # Recipe Data Crate
//!
//! Domain types shared by every other crate in the workspace, and loaders
//! for the JSON files the command-line front end starts from.
//!
//! ## Main Components
//!
//! - **types**: Recipe, UserInfo, Identity, annotation and worker schema types
//! - **loader**: Read the catalog and users files
//! - **error**: Error types for loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use recipe_data::{load_catalog, RecipeFeatures};
//! use std::path::Path;
//!
//! let catalog = load_catalog(Path::new("data/recipes.json"))?;
//! let features: Vec<RecipeFeatures> = catalog.iter().map(RecipeFeatures::from).collect();
//! ```

pub mod error;
pub mod loader;
pub mod types;

pub use error::{DataLoadError, Result};
pub use loader::{load_catalog, load_users};
pub use types::{
    // Type aliases
    IngredientId,
    MealPlan,
    RecipeId,
    RecommendationTable,
    // Core types
    AnnotatedRecipe,
    Identity,
    IngredientRef,
    Recipe,
    RecipeFeatures,
    UserInfo,
    UserRecord,
    UserSpecificInformation,
};
