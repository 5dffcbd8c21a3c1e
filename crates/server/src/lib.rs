//! Server crate for the recipe recommendation service.
//!
//! This crate composes the stores, the task graph executor and the worker
//! client into the service's operations:
//! - [`RecipeEnrichment`]: token -> user state -> annotated recipes
//! - [`RecommendationPipeline`]: worker recommendation -> recipe details
//! - [`CatalogIngestion`]: worker ingestion -> persisted catalog
//! - [`RecipeOrchestrator`]: every caller-facing operation

pub mod annotate;
pub mod enrichment;
pub mod ingestion;
pub mod orchestrator;
pub mod recommendation;

pub use enrichment::RecipeEnrichment;
pub use ingestion::CatalogIngestion;
pub use orchestrator::{RecipeOrchestrator, RequestFailed, TOP_RECIPES_LIMIT};
pub use recommendation::RecommendationPipeline;
