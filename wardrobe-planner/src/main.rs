//! wardrobe-planner - command-line front end
//!
//! Runs the wardrobe services against the database in the root folder.
//! The generated outfit batch only lives for one invocation, so
//! `generate --save` is how candidates are kept.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wardrobe_common::config::{
    default_config_path, load_toml_config, LoggingConfig, RootFolderResolver, TomlConfig,
};
use wardrobe_common::models::{
    Category, ColorTag, GenerationParams, ItemPatch, MeasurementUnit, Mood, Occasion, Outfit,
    OutfitPatch, PreferencesPatch, ProfilePatch, Season, Theme, WardrobeItem,
};

use wardrobe_planner::clients::{recommend, WeatherLocation};
use wardrobe_planner::services::{
    SessionDirUrlProvider, SortBy, UploadFile, UrlProvider, WardrobeFilter,
};
use wardrobe_planner::Wardrobe;

#[derive(Parser, Debug)]
#[command(name = "wardrobe-planner")]
#[command(about = "Catalog clothing photos and plan outfits")]
#[command(version)]
struct Cli {
    /// Root folder holding the wardrobe database
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// TOML config file (default: <config dir>/wardrobe-planner/config.toml)
    #[arg(long, global = true, env = "WARDROBE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload clothing photos
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List wardrobe items
    List(ListArgs),
    /// Edit an item's name and tags
    Tag(TagArgs),
    /// Delete items and their images
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete every item and image
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Generate outfit suggestions
    Generate(GenerateArgs),
    /// List saved outfits
    Outfits {
        #[arg(long)]
        favorites: bool,
        #[arg(long)]
        occasion: Option<String>,
    },
    /// Rate a saved outfit from 1 to 5
    Rate { id: String, rating: u8 },
    /// Toggle the favorite flag of a saved outfit
    Favorite { id: String },
    /// Rename a saved outfit
    Rename { id: String, name: String },
    /// Delete a saved outfit
    RemoveOutfit { id: String },
    /// Write item images to the session folder until Ctrl+C
    Show { ids: Vec<String> },
    /// Wardrobe usage statistics
    Stats,
    /// Current weather and what to wear for it
    Weather {
        /// City name or "lat,lon"
        location: String,
    },
    /// Show or edit the profile and preferences
    Profile(ProfileArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Name contains
    #[arg(long)]
    q: Option<String>,
    #[arg(long, value_delimiter = ',')]
    category: Vec<Category>,
    #[arg(long, value_delimiter = ',')]
    color: Vec<ColorTag>,
    #[arg(long, value_delimiter = ',')]
    season: Vec<Season>,
    #[arg(long, value_delimiter = ',')]
    occasion: Vec<Occasion>,
    /// newest, color, category or frequency
    #[arg(long, default_value = "newest")]
    sort: SortBy,
}

#[derive(Args, Debug)]
struct TagArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    category: Option<Category>,
    #[arg(long, value_delimiter = ',')]
    colors: Option<Vec<ColorTag>>,
    #[arg(long, value_delimiter = ',')]
    seasons: Option<Vec<Season>>,
    #[arg(long, value_delimiter = ',')]
    occasions: Option<Vec<Occasion>>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long)]
    occasion: String,
    #[arg(long)]
    mood: Option<Mood>,
    /// Temperature in °C
    #[arg(long, requires = "condition")]
    temp: Option<f64>,
    #[arg(long, requires = "temp")]
    condition: Option<String>,
    /// Look up the weather for a city or "lat,lon"
    #[arg(long, conflicts_with = "temp")]
    location: Option<String>,
    /// Save candidates by number (1-based)
    #[arg(long, value_delimiter = ',')]
    save: Vec<usize>,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    style: Option<String>,
    /// light, dark or auto
    #[arg(long, value_parser = parse_theme)]
    theme: Option<Theme>,
    /// metric or imperial
    #[arg(long, value_parser = parse_unit)]
    unit: Option<MeasurementUnit>,
    #[arg(long)]
    default_occasion: Option<String>,
    #[arg(long)]
    language: Option<String>,
    /// Pull the remote profile first
    #[arg(long)]
    sync: bool,
}

fn parse_theme(s: &str) -> Result<Theme, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "light" => Ok(Theme::Light),
        "dark" => Ok(Theme::Dark),
        "auto" => Ok(Theme::Auto),
        other => Err(format!("unknown theme '{}'", other)),
    }
}

fn parse_unit(s: &str) -> Result<MeasurementUnit, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "metric" => Ok(MeasurementUnit::Metric),
        "imperial" => Ok(MeasurementUnit::Imperial),
        other => Err(format!("unknown unit '{}'", other)),
    }
}

fn parse_location(s: &str) -> WeatherLocation {
    if let Some((lat, lon)) = s.split_once(',') {
        if let (Ok(lat), Ok(lon)) = (lat.trim().parse(), lon.trim().parse()) {
            return WeatherLocation::Coords { lat, lon };
        }
    }
    WeatherLocation::City(s.trim().to_string())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The log level comes from the config file, so read it before tracing exists
    let config_path = cli.config.clone().or_else(default_config_path);
    let (config, config_error) = match config_path.as_deref().filter(|p| p.exists()) {
        Some(path) => match load_toml_config(path) {
            Ok(config) => (config, None),
            Err(e) => (TomlConfig::default(), Some(e)),
        },
        None => (TomlConfig::default(), None),
    };

    init_tracing(&config.logging)?;
    info!("wardrobe-planner {}", wardrobe_planner::build_info());
    if let Some(e) = config_error {
        warn!("{}; using defaults", e);
    }

    let root = RootFolderResolver::new()
        .with_cli_arg(cli.root.clone())
        .with_toml(&config)
        .resolve();
    info!("Root folder: {}", root.display());

    let services = config.services.clone().with_env_overrides();
    let wardrobe = Wardrobe::open(&root, &services)
        .await
        .context("Failed to open wardrobe")?;

    run(cli.command, &wardrobe).await
}

async fn run(command: Command, wardrobe: &Wardrobe) -> Result<()> {
    match command {
        Command::Add { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(UploadFile::from_path(path).await?);
            }
            let report = wardrobe.items().add_files(uploads).await?;
            for item in &report.added {
                println!("added {}  {}  {}", item.id, item.category.as_str(), item.display_name());
            }
            for rejected in &report.rejected {
                println!("rejected {}: {}", rejected.name, rejected.reason);
            }
        }

        Command::List(args) => {
            let filter = WardrobeFilter {
                q: args.q,
                categories: args.category,
                colors: args.color,
                seasons: args.season,
                occasions: args.occasion,
                sort_by: args.sort,
            };
            let items = wardrobe.view(&filter).await?;
            for item in &items {
                print_item(item);
            }
            println!("{} item(s)", items.len());
        }

        Command::Tag(args) => {
            let patch = ItemPatch {
                name: args.name,
                category: args.category,
                colors: args.colors,
                seasons: args.seasons,
                occasions: args.occasions,
                notes: args.notes,
                usage_count: None,
            };
            if patch.is_empty() {
                bail!("nothing to change");
            }
            wardrobe.items().update_item(&args.id, &patch).await?;
            match wardrobe.items().get_item(&args.id).await? {
                Some(item) => print_item(&item),
                None => println!("no item {}", args.id),
            }
        }

        Command::Delete { ids } => {
            let removed = wardrobe.items().delete_items(&ids).await?;
            println!("deleted {} of {} item(s)", removed, ids.len());
        }

        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to delete every item without --yes");
            }
            wardrobe.items().clear_all().await?;
            println!("wardrobe cleared");
        }

        Command::Generate(args) => {
            let mut params = GenerationParams::for_occasion(args.occasion);
            if let Some(mood) = args.mood {
                params = params.with_mood(mood);
            }
            if let (Some(temp), Some(condition)) = (args.temp, args.condition) {
                params = params.with_weather(temp, condition);
            } else if let Some(location) = &args.location {
                let report = wardrobe.weather(&parse_location(location)).await;
                println!("weather in {}: {}", report.location, report.summary());
                params.weather = Some(report.snapshot());
            }

            let batch = wardrobe.generator().generate(&params).await?;
            if batch.is_empty() {
                println!("no outfit could be composed; add or tag more items");
                return Ok(());
            }
            for (i, outfit) in batch.iter().enumerate() {
                println!("#{}", i + 1);
                print_outfit(outfit);
            }
            for number in args.save {
                if number == 0 {
                    warn!("Outfit numbers start at 1, skipping 0");
                    continue;
                }
                let saved = wardrobe.save_generated(number - 1).await?;
                println!("saved #{} as {}", number, saved.id);
            }
        }

        Command::Outfits {
            favorites,
            occasion,
        } => {
            let outfits = match (favorites, occasion) {
                (true, _) => wardrobe.outfits().favorites().await,
                (false, Some(occasion)) => wardrobe.outfits().by_occasion(&occasion).await,
                (false, None) => wardrobe.outfits().list().await,
            };
            for outfit in &outfits {
                print_outfit(outfit);
            }
            println!("{} outfit(s)", outfits.len());
        }

        Command::Rate { id, rating } => {
            report_change(&id, wardrobe.outfits().rate(&id, rating).await?);
        }

        Command::Favorite { id } => {
            report_change(&id, wardrobe.outfits().toggle_favorite(&id).await?);
        }

        Command::Rename { id, name } => {
            let patch = OutfitPatch {
                name: Some(name),
                ..Default::default()
            };
            report_change(&id, wardrobe.outfits().update(&id, &patch).await?);
        }

        Command::RemoveOutfit { id } => {
            report_change(&id, wardrobe.outfits().delete(&id).await?);
        }

        Command::Show { ids } => show(wardrobe, &ids).await?,

        Command::Stats => {
            let stats = wardrobe.statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Weather { location } => {
            let report = wardrobe.weather(&parse_location(&location)).await;
            let advice = recommend(&report);
            println!("{}: {}", report.location, report.summary());
            println!(
                "humidity {}%, wind {} m/s",
                report.humidity, report.wind_speed
            );
            println!("{}", serde_json::to_string_pretty(&advice)?);
        }

        Command::Profile(args) => profile(wardrobe, args).await?,
    }
    Ok(())
}

fn report_change(id: &str, changed: bool) {
    if changed {
        println!("updated {}", id);
    } else {
        println!("no saved outfit {}", id);
    }
}

fn print_item(item: &WardrobeItem) {
    let colors: Vec<&str> = item.colors.iter().map(|c| c.as_str()).collect();
    println!(
        "{}  {:<11}  {:<20}  {}  used {}",
        item.id,
        item.category.as_str(),
        item.display_name(),
        colors.join(","),
        item.usage_count.unwrap_or(0)
    );
}

fn print_outfit(outfit: &Outfit) {
    let stars = outfit
        .rating
        .map(|r| format!(" {}/5", r))
        .unwrap_or_default();
    let heart = if outfit.is_favorite() { " *" } else { "" };
    println!("{}  {}{}{}", outfit.id, outfit.name, stars, heart);
    for item in &outfit.items {
        println!("    {:<11}  {}", item.category.as_str(), item.display_name());
    }
    if let Some(notes) = &outfit.notes {
        println!("    {}", notes);
    }
}

async fn show(wardrobe: &Wardrobe, ids: &[String]) -> Result<()> {
    let items = if ids.is_empty() {
        wardrobe.items().list_items().await?
    } else {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match wardrobe.items().get_item(id).await? {
                Some(item) => found.push(item),
                None => println!("no item {}", id),
            }
        }
        found
    };

    let provider: Arc<dyn UrlProvider> =
        Arc::new(SessionDirUrlProvider::new(wardrobe.session_dir())?);
    let cache = wardrobe.url_cache(provider);

    for item in &items {
        match cache.resolve(item).await {
            Some(url) => println!("{}  {}", item.id, url),
            None => println!("{}  (image unavailable)", item.id),
        }
    }
    if cache.is_empty() {
        return Ok(());
    }

    println!("Press Ctrl+C to release {} image handle(s)", cache.len());
    signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;
    info!("Received Ctrl+C, releasing image handles");
    cache.dispose();
    Ok(())
}

async fn profile(wardrobe: &Wardrobe, args: ProfileArgs) -> Result<()> {
    let store = wardrobe.profile();
    if args.sync {
        store.hydrate().await?;
    }

    let profile_patch = ProfilePatch {
        name: args.name,
        avatar: None,
        bio: args.bio,
        location: args.location,
        style: args.style,
    };
    if profile_patch != ProfilePatch::default() {
        store.update_profile(&profile_patch).await?;
    }

    let prefs_patch = PreferencesPatch {
        theme: args.theme,
        default_occasion: args.default_occasion,
        measurement_unit: args.unit,
        language: args.language,
        ..Default::default()
    };
    if prefs_patch != PreferencesPatch::default() {
        store.update_preferences(&prefs_patch).await?;
    }

    match store.profile().await? {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => println!("no profile yet"),
    }
    println!("{}", serde_json::to_string_pretty(&store.preferences().await?)?);
    Ok(())
}
