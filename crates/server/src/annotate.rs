//! Pure functions deriving user-specific recipe fields.
//!
//! Nothing here touches a store or the task graph: the inputs are
//! immutable snapshots of a user's state, so every rule is testable on its
//! own.

use std::collections::HashSet;

use rayon::prelude::*;
use recipe_data::{AnnotatedRecipe, MealPlan, Recipe, RecipeId, UserInfo, UserSpecificInformation};

/// Batches at least this large are annotated in parallel.
const PARALLEL_THRESHOLD: usize = 512;

/// Names of the meal-plan slots whose sequence contains `recipe_id`.
///
/// An absent plan and an empty plan both yield no slots.
pub fn meal_plan_slots(meal_plan: Option<&MealPlan>, recipe_id: RecipeId) -> Vec<String> {
    meal_plan
        .map(|plan| {
            plan.iter()
                .filter(|(_, ids)| ids.contains(&recipe_id))
                .map(|(slot, _)| slot.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Whether `recipe_id` is among the user's liked recipes.
pub fn is_liked(liked_recipes: &HashSet<RecipeId>, recipe_id: RecipeId) -> bool {
    liked_recipes.contains(&recipe_id)
}

/// Attach the user's view of one recipe.
pub fn annotate(recipe: Recipe, user: &UserInfo) -> AnnotatedRecipe {
    let info = UserSpecificInformation {
        meal_plan: meal_plan_slots(user.meal_plan.as_ref(), recipe.id),
        liked_recipes: is_liked(&user.liked_recipes, recipe.id),
    };
    AnnotatedRecipe {
        recipe,
        user_specific_information: Some(info),
    }
}

/// Annotate a batch, preserving input order.
pub fn annotate_all(recipes: Vec<Recipe>, user: &UserInfo) -> Vec<AnnotatedRecipe> {
    if recipes.len() >= PARALLEL_THRESHOLD {
        recipes.into_par_iter().map(|r| annotate(r, user)).collect()
    } else {
        recipes.into_iter().map(|r| annotate(r, user)).collect()
    }
}
