//! Errors reported by store implementations.

use thiserror::Error;

/// Failures surfaced by a [`crate::RecipesStore`] or [`crate::UsersStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Token missing or invalid
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Lookup miss
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
