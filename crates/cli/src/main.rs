use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::seq::IndexedRandom;
use recipe_data::{AnnotatedRecipe, Recipe, RecipeId, load_catalog, load_users};
use server::RecipeOrchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stores::{MemoryRecipesStore, MemoryUsersStore};
use tokio::sync::Semaphore;
use tracing::info;
use worker_client::{ProcessPipeline, WorkerConfig};

/// RecipeRecs - Recipe recommendation service
#[derive(Parser)]
#[command(name = "recipe-recs")]
#[command(about = "Recipe lookups, personalised annotation and worker-backed recommendations", long_about = None)]
struct Cli {
    /// Path to the recipe catalog (JSON array)
    #[arg(short, long, default_value = "data/recipes.json")]
    catalog: PathBuf,

    /// Path to the users file (JSON array); without it no token verifies
    #[arg(short, long)]
    users: Option<PathBuf>,

    /// Worker program to launch for recommendation and ingestion
    #[arg(long, default_value = "recipe-worker")]
    worker: String,

    /// Extra argument for the worker, placed before the mode (repeatable)
    #[arg(long = "worker-arg")]
    worker_args: Vec<String>,

    /// Kill the worker if it runs longer than this many seconds
    #[arg(long)]
    worker_timeout_secs: Option<u64>,

    /// Bearer token; when given, results carry user-specific information
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one recipe
    Get {
        #[arg(long)]
        id: RecipeId,
    },

    /// Show the given recipes, or the whole catalog
    List {
        /// Comma-separated recipe ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<RecipeId>,
    },

    /// Search recipes (case-insensitive substring match)
    Search {
        #[arg(long)]
        query: String,
    },

    /// Show the most liked recipes
    Top,

    /// Show random recipes
    Random {
        #[arg(long, default_value = "8")]
        count: usize,
    },

    /// Recommend recipes related to a recipe
    Recommend {
        #[arg(long)]
        id: RecipeId,
    },

    /// Feed the catalog to the worker and persist it
    Ingest,

    /// Remove every recipe from the store
    Clean,

    /// Fire concurrent recommendation requests and report latencies
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let start = Instant::now();
    let catalog = load_catalog(&cli.catalog).context("Failed to load recipe catalog")?;
    let users = match &cli.users {
        Some(path) => load_users(path).context("Failed to load users")?,
        None => Vec::new(),
    };
    println!(
        "{} Loaded {} recipes and {} users in {:?}",
        "✓".green(),
        catalog.len(),
        users.len(),
        start.elapsed()
    );

    let mut worker_config = WorkerConfig::new(cli.worker.clone()).with_args(cli.worker_args.clone());
    if let Some(secs) = cli.worker_timeout_secs {
        worker_config = worker_config.with_timeout(Duration::from_secs(secs));
    }
    info!("Worker: {} {:?}", worker_config.program, worker_config.args);

    // Ingestion starts from an empty store; every other command reads the
    // catalog as loaded.
    let recipes = match cli.command {
        Commands::Ingest => MemoryRecipesStore::new(),
        _ => MemoryRecipesStore::with_catalog(catalog.clone()),
    };
    let orchestrator = RecipeOrchestrator::new(
        Arc::new(recipes),
        Arc::new(MemoryUsersStore::new(users)),
        Arc::new(ProcessPipeline::new(worker_config)),
    );
    let token = cli.token.as_deref();

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Get { id } => {
            let recipe = orchestrator.select_by_id(id, token).await?;
            print_recipes(&format!("Recipe {id}"), std::slice::from_ref(&recipe))?;
        }
        Commands::List { ids } => {
            let ids = (!ids.is_empty()).then_some(ids.as_slice());
            print_recipes("Recipes", &orchestrator.select(ids, token).await?)?;
        }
        Commands::Search { query } => {
            let found = orchestrator.search(&query, token).await?;
            print_recipes(&format!("Search results for '{query}'"), &found)?;
        }
        Commands::Top => print_recipes("Top recipes", &orchestrator.top_recipes(token).await?)?,
        Commands::Random { count } => {
            print_recipes("Random recipes", &orchestrator.random(count, token).await?)?
        }
        Commands::Recommend { id } => {
            let recommended = orchestrator.recommend(id, token).await?;
            print_recipes(&format!("Recommended for recipe {id}"), &recommended)?;
        }
        Commands::Ingest => handle_ingest(&orchestrator, catalog).await?,
        Commands::Clean => {
            orchestrator.clean().await?;
            println!("{} Recipe store cleaned", "✓".green());
        }
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(orchestrator, &catalog, requests, concurrent).await?,
    }

    Ok(())
}

/// Handle the 'ingest' command
async fn handle_ingest(orchestrator: &RecipeOrchestrator, catalog: Vec<Recipe>) -> Result<()> {
    let start = Instant::now();
    let count = orchestrator.ingest(catalog).await?;
    println!(
        "{} Ingested {} recipes in {:?}",
        "✓".green(),
        count,
        start.elapsed()
    );
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    orchestrator: RecipeOrchestrator,
    catalog: &[Recipe],
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    if catalog.is_empty() {
        return Err(anyhow!("Cannot benchmark an empty catalog"));
    }

    // Pick the recipes to ask about up front
    let recipe_ids: Vec<RecipeId> = {
        let mut rng = rand::rng();
        (0..requests)
            .filter_map(|_| catalog.choose(&mut rng).map(|r| r.id))
            .collect()
    };

    let limiter = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall_clock = Instant::now();
    let mut handles = Vec::with_capacity(recipe_ids.len());
    for id in recipe_ids {
        let orchestrator = orchestrator.clone();
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            let _permit = limiter.acquire_owned().await?;
            let start = Instant::now();
            orchestrator.recommend(id, None).await?;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    let mut timings = Vec::with_capacity(handles.len());
    let mut failures = 0;
    for handle in handles {
        match handle.await? {
            Ok(elapsed) => timings.push(elapsed),
            Err(_) => failures += 1,
        }
    }
    let total_time = wall_clock.elapsed();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} failed)", requests, failures);
    if timings.is_empty() {
        return Err(anyhow!("Every benchmark request failed"));
    }

    timings.sort();
    let sum: Duration = timings.iter().sum();
    let percentile = |p: f32| timings[((timings.len() - 1) as f32 * p) as usize];
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", sum / timings.len() as u32);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!(
        "Throughput: {:.2} requests/second",
        timings.len() as f32 / total_time.as_secs_f32()
    );
    Ok(())
}

/// Helper function to print a header and the recipes as JSON
fn print_recipes(title: &str, recipes: &[AnnotatedRecipe]) -> Result<()> {
    println!("{} ({})", title.bold().blue(), recipes.len());
    println!(
        "{}",
        serde_json::to_string_pretty(recipes).context("Failed to render recipes")?
    );
    Ok(())
}
