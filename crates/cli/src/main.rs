use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tripsmith_core::{canonicalize, Plan, TripContext};
use tripsmith_observability::{init_tracing, AppMetrics};
use tripsmith_planner::{
    FixedGenerator, GeminiGenerator, Generator, PlannerOptions, RetryPolicy, TripPlanner,
    DEFAULT_GEMINI_MODEL,
};
use tripsmith_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "tripsmith")]
#[command(about = "Tripsmith day-plan CLI")]
struct Cli {
    /// Sqlite url for saved itineraries; in-memory when unset.
    #[arg(long, env = "TRIPSMITH_DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Canonicalize a generated payload read from FILE (or `-` for stdin).
    Normalize {
        input: PathBuf,
        #[arg(long)]
        days: Option<String>,
        #[arg(long, default_value = "")]
        destination: String,
    },
    /// Generate a day plan for the trip JSON in FILE (or `-`).
    Generate {
        trip: PathBuf,
        #[command(flatten)]
        generation: GenerationArgs,
    },
    Itineraries {
        #[arg(long, default_value = "default")]
        key: String,
        #[command(subcommand)]
        command: ItineraryCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ItineraryCommand {
    List,
    Show {
        name: String,
    },
    /// Generate and store a day plan for a saved itinerary.
    Plan {
        name: String,
        #[command(flatten)]
        generation: GenerationArgs,
    },
    /// Fill one slot with an alternative given as JSON.
    Choose {
        name: String,
        #[arg(long)]
        day: usize,
        #[arg(long)]
        slot: usize,
        #[arg(long)]
        option: String,
    },
}

#[derive(Debug, Args)]
struct GenerationArgs {
    #[arg(long, env = "TRIPSMITH_GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "TRIPSMITH_GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    model: String,
    #[arg(long, env = "TRIPSMITH_GEMINI_BASE_URL")]
    base_url: Option<String>,
    /// Canned model answer used instead of calling Gemini.
    #[arg(long, env = "TRIPSMITH_OFFLINE_RESPONSE")]
    offline_response: Option<PathBuf>,
    #[arg(long, env = "TRIPSMITH_GENERATION_ATTEMPTS", default_value_t = 3)]
    attempts: u32,
    #[arg(long, env = "TRIPSMITH_EVENING_ANCHORS")]
    evening_anchors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("tripsmith_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Normalize {
            input,
            days,
            destination,
        } => {
            let raw: Value = serde_json::from_str(&read_input(&input)?)
                .with_context(|| format!("{} is not JSON", input.display()))?;
            let context = TripContext {
                destination,
                days: days.unwrap_or_default(),
                ..TripContext::default()
            };

            let plan = canonicalize(&raw, context.expected_days()?, &context)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Generate { trip, generation } => {
            let trip: TripContext = serde_json::from_str(&read_input(&trip)?)
                .with_context(|| format!("{} is not a trip JSON object", trip.display()))?;
            let planner = build_planner(cli.database_url.as_deref(), &generation).await?;

            let plan = planner.generate_day_plan(&trip).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Itineraries { key, command } => {
            run_itineraries(cli.database_url.as_deref(), &key, command).await?
        }
    }

    Ok(())
}

async fn run_itineraries(
    database_url: Option<&str>,
    key: &str,
    command: ItineraryCommand,
) -> Result<()> {
    match command {
        ItineraryCommand::List => {
            let planner = storage_planner(database_url).await?;
            for itinerary in planner.list_itineraries(key).await? {
                let days = itinerary
                    .day_plan
                    .as_ref()
                    .map(|plan| plan.plan.len().to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{} day(s) planned",
                    itinerary.name, itinerary.trip_details.destination, days
                );
            }
        }
        ItineraryCommand::Show { name } => {
            let planner = storage_planner(database_url).await?;
            let itinerary = planner
                .list_itineraries(key)
                .await?
                .into_iter()
                .find(|itinerary| itinerary.name == name)
                .with_context(|| format!("no saved itinerary named {name:?}"))?;
            println!("{}", serde_json::to_string_pretty(&itinerary)?);
        }
        ItineraryCommand::Plan { name, generation } => {
            let planner = build_planner(database_url, &generation).await?;
            let itinerary = planner.generate_for_saved(key, &name).await?;
            println!("{}", serde_json::to_string_pretty(&itinerary)?);
        }
        ItineraryCommand::Choose {
            name,
            day,
            slot,
            option,
        } => {
            let planner = storage_planner(database_url).await?;
            let updated = choose(&planner, key, &name, day, slot, &option).await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }

    Ok(())
}

async fn choose(
    planner: &TripPlanner<Store, Generator>,
    key: &str,
    name: &str,
    day: usize,
    slot: usize,
    option: &str,
) -> Result<Plan> {
    let option: Value = serde_json::from_str(option).context("--option must be a JSON object")?;
    Ok(planner.apply_choice(key, name, day, slot, &option).await?)
}

async fn build_planner(
    database_url: Option<&str>,
    args: &GenerationArgs,
) -> Result<TripPlanner<Store, Generator>> {
    let generator = match (&args.api_key, &args.offline_response) {
        (Some(api_key), _) => {
            let mut gemini = GeminiGenerator::new(api_key.as_str(), args.model.as_str())?;
            if let Some(base_url) = args.base_url.as_deref() {
                gemini = gemini.with_base_url(base_url);
            }
            Generator::Gemini(gemini)
        }
        (None, Some(path)) => Generator::Fixed(FixedGenerator::new(read_input(path)?)),
        (None, None) => bail!("set --api-key (TRIPSMITH_GOOGLE_API_KEY) or --offline-response"),
    };

    let options = PlannerOptions {
        retry: RetryPolicy {
            attempts: args.attempts.max(1),
            ..RetryPolicy::default()
        },
        evening_anchors: args.evening_anchors,
    };

    open_planner(database_url, generator, options).await
}

/// Planner for commands that only read or edit saved itineraries.
async fn storage_planner(database_url: Option<&str>) -> Result<TripPlanner<Store, Generator>> {
    // never asked to generate
    let generator = Generator::Fixed(FixedGenerator::new(String::new()));
    open_planner(database_url, generator, PlannerOptions::default()).await
}

async fn open_planner(
    database_url: Option<&str>,
    generator: Generator,
    options: PlannerOptions,
) -> Result<TripPlanner<Store, Generator>> {
    let store = Store::from_database_url(database_url).await?;
    Ok(TripPlanner::new(
        Arc::new(store),
        Arc::new(generator),
        AppMetrics::shared(),
        options,
    ))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed reading stdin")?;
        return Ok(buffer);
    }

    std::fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))
}
