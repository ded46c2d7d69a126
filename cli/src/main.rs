use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use recetario_core::models::{FavoritesSnapshot, Recipe};
use recetario_core::storage::open_table;
use recetario_core::{load_config, CatalogClient, FavoritesStore, FavoritesUpdate};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Browse recipes and keep your favorites in sync", long_about = None)]
struct Cli {
    /// Configuration file, created with defaults when missing
    #[arg(long, global = true, default_value = "recetario.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recipe categories
    Categories,
    /// List the recipes of one category
    Category { name: String },
    /// Show a recipe in full
    Show { id: String },
    /// Search recipes by name
    Search { query: String },
    /// Show a random recipe
    Random,
    /// List favorites, newest first
    Favorites,
    /// Favorite a recipe, or unfavorite it if it already is one
    Toggle { id: String },
    /// Unfavorite a recipe
    Remove { id: String },
    /// Check whether a recipe is a favorite
    IsFavorite { id: String },
    /// Print the favorites every time they change, until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let (diagnostics_tx, mut diagnostics) = mpsc::unbounded_channel();
    let mut options = config.store_options();
    options.diagnostics = Some(diagnostics_tx);

    let store = FavoritesStore::new(open_table(&config.backend)?, options);
    let catalog = CatalogClient::new(&config.catalog)?;

    match cli.command {
        Commands::Categories => {
            for category in catalog.list_categories().await? {
                println!("{}", category.name);
            }
        }
        Commands::Category { name } => {
            for summary in catalog.list_by_category(&name).await? {
                println!("{:>6}  {}", summary.id, summary.name);
            }
        }
        Commands::Show { id } => {
            let recipe = catalog
                .get_by_id(&id)
                .await?
                .ok_or_else(|| anyhow!("no recipe with id {}", id))?;
            let favorite = store.is_favorite(&recipe.id).await;
            print_recipe(&recipe, favorite);
        }
        Commands::Search { query } => {
            let recipes = catalog.search_by_name(&query).await?;
            if recipes.is_empty() {
                println!("No recipes match \"{}\"", query);
            }
            for recipe in recipes {
                println!("{:>6}  {}", recipe.id, recipe.name);
            }
        }
        Commands::Random => {
            let recipe = catalog.get_random().await?;
            let favorite = store.is_favorite(&recipe.id).await;
            print_recipe(&recipe, favorite);
        }
        Commands::Favorites => print_favorites(&store.list().await?),
        Commands::Toggle { id } => {
            let recipe = catalog
                .get_by_id(&id)
                .await?
                .ok_or_else(|| anyhow!("no recipe with id {}", id))?;
            if store.toggle(&recipe).await? {
                println!("Added {} to favorites", recipe.name);
            } else {
                println!("Removed {} from favorites", recipe.name);
            }
        }
        Commands::Remove { id } => {
            store.remove(&id).await?;
            println!("Removed {} from favorites", id);
        }
        Commands::IsFavorite { id } => {
            let favorite = store.is_favorite(&id).await;
            if let Ok(diagnostic) = diagnostics.try_recv() {
                tracing::warn!(id = %diagnostic.id, "could not check favorites: {}", diagnostic.message);
            }
            println!("{}", if favorite { "yes" } else { "no" });
        }
        Commands::Watch => watch(&store).await?,
    }

    Ok(())
}

async fn watch(store: &FavoritesStore) -> Result<()> {
    let _handle = store
        .subscribe(|update: &FavoritesUpdate| match update {
            FavoritesUpdate::Snapshot(snapshot) => print_favorites(snapshot),
            FavoritesUpdate::Failed(reason) => eprintln!("listener failed: {}", reason),
        })
        .await?;

    tokio::signal::ctrl_c().await?;
    store.unsubscribe_all().await;
    Ok(())
}

fn print_recipe(recipe: &Recipe, favorite: bool) {
    let marker = if favorite { " ★" } else { "" };
    println!("{} ({}){}", recipe.name, recipe.id, marker);
    if let (Some(category), Some(area)) = (&recipe.category, &recipe.area) {
        println!("{} · {}", category, area);
    }
    if !recipe.ingredients.is_empty() {
        println!();
        for ingredient in &recipe.ingredients {
            match &ingredient.measure {
                Some(measure) => println!("  - {} {}", measure, ingredient.name),
                None => println!("  - {}", ingredient.name),
            }
        }
    }
    if let Some(instructions) = &recipe.instructions {
        println!();
        println!("{}", instructions);
    }
}

fn print_favorites(favorites: &FavoritesSnapshot) {
    if favorites.is_empty() {
        println!("No favorites yet");
        return;
    }
    for record in favorites {
        println!(
            "{:>6}  {}  (added {})",
            record.id,
            record.name,
            record.added_at.format("%Y-%m-%d %H:%M")
        );
    }
}
