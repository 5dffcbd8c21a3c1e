//! # Stores Crate
//!
//! The storage boundary of the recipe service. Persistence and token
//! validation are collaborators, not core logic, so this crate only pins
//! down their interface:
//!
//! - [`RecipesStore`]: lookups, search, random sampling, bulk setup/clean
//! - [`UsersStore`]: token verification, per-user state, like counts
//!
//! plus in-memory implementations used by the command-line front end and
//! by tests.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::StoreError;
pub use memory::{MemoryRecipesStore, MemoryUsersStore};
pub use traits::{RecipesStore, UsersStore};
