//! Load the recipe catalog and user records from JSON files.
//!
//! Both files are plain JSON arrays. Loading validates identifier
//! uniqueness so the stores never see two records fighting for one key.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{DataLoadError, Result};
use crate::types::{Recipe, UserRecord};

/// Load a recipe catalog (`[{"id": .., ...}, ...]`).
pub fn load_catalog(path: &Path) -> Result<Vec<Recipe>> {
    let recipes: Vec<Recipe> = read_json_array(path)?;

    let mut seen = HashSet::with_capacity(recipes.len());
    for recipe in &recipes {
        if !seen.insert(recipe.id) {
            return Err(DataLoadError::DuplicateId {
                entity: "recipe".to_string(),
                id: recipe.id.to_string(),
            });
        }
    }

    info!("Loaded {} recipes from {}", recipes.len(), path.display());
    Ok(recipes)
}

/// Load user records (`[{"username": .., "token": .., ...}, ...]`).
pub fn load_users(path: &Path) -> Result<Vec<UserRecord>> {
    let users: Vec<UserRecord> = read_json_array(path)?;

    let mut usernames = HashSet::with_capacity(users.len());
    let mut tokens = HashSet::with_capacity(users.len());
    for user in &users {
        if !usernames.insert(user.username.as_str()) {
            return Err(DataLoadError::DuplicateId {
                entity: "user".to_string(),
                id: user.username.clone(),
            });
        }
        if !tokens.insert(user.token.as_str()) {
            return Err(DataLoadError::DuplicateId {
                entity: "token".to_string(),
                id: user.username.clone(),
            });
        }
    }

    info!("Loaded {} users from {}", users.len(), path.display());
    Ok(users)
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| DataLoadError::ParseError {
        file: path.display().to_string(),
        source,
    })
}
