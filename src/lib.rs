pub mod board;
pub mod clock;
pub mod config;
pub mod db;
pub mod filter;
pub mod forecast;
pub mod membership;
pub mod models;
mod utils;
pub mod weather;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use board::{demo_events, Board, BoardError};
use clock::{Clock, SystemClock};
use config::{AppConfig, ConfigStore};
use db::Persistence;
use filter::{filter_events, EventQuery};
use forecast::{DailyForecast, ForecastClient};
use membership::{JoinOutcome, LeaveOutcome};
use models::{Event, EventDraft, EventId, Stats, UserIdentity};
use weather::RandomWeather;

#[derive(Debug, Parser)]
#[command(name = "shore-squad", version, about = "Beach cleanup event board")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List events, newest first
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "")]
        weather: String,
    },
    /// Create an event; you become its first participant
    Create(CreateArgs),
    Join {
        id: EventId,
    },
    Leave {
        id: EventId,
    },
    Stats,
    /// Show or change the name you join events as
    Whoami {
        #[arg(long)]
        rename: Option<String>,
    },
    /// Daily outlook for the configured beach
    Forecast {
        #[arg(long)]
        days: Option<u8>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    /// YYYY-MM-DD
    #[arg(long)]
    date: String,
    /// HH:MM
    #[arg(long)]
    time: String,
    #[arg(long)]
    location: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    capacity: String,
    #[arg(long, default_value = "")]
    difficulty: String,
}

impl From<CreateArgs> for EventDraft {
    fn from(args: CreateArgs) -> Self {
        Self {
            name: args.name,
            date: args.date,
            time: args.time,
            location: args.location,
            description: args.description,
            capacity: args.capacity,
            difficulty: args.difficulty,
        }
    }
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Set the forecast coordinates
    #[command(allow_negative_numbers = true)]
    Location { latitude: f64, longitude: f64 },
}

#[derive(Debug, Serialize)]
struct EventCard {
    #[serde(flatten)]
    event: Event,
    joined: bool,
    full: bool,
    spots_left: Option<usize>,
}

impl EventCard {
    fn new(event: &Event, identity: &UserIdentity) -> Self {
        Self {
            joined: identity.has_joined(event.id),
            full: event.is_full(),
            spots_left: event.spots_left(),
            event: event.clone(),
        }
    }
}

fn list_events(board: &Board, query: &EventQuery) -> Result<Vec<EventCard>, String> {
    Ok(filter_events(board.events(), query)
        .into_iter()
        .map(|event| EventCard::new(event, board.identity()))
        .collect())
}

fn create_event(board: &mut Board, draft: EventDraft) -> Result<Event, String> {
    let event = board.create(draft).map_err(|e| e.to_string())?;
    ensure_durable(board)?;
    Ok(event)
}

fn join_event(board: &mut Board, id: EventId) -> Result<JoinOutcome, String> {
    let name = board.identity().name.clone();
    let outcome = board.join(id, &name).map_err(|e| e.to_string())?;
    ensure_durable(board)?;
    Ok(outcome)
}

fn leave_event(board: &mut Board, id: EventId) -> Result<LeaveOutcome, String> {
    let name = board.identity().name.clone();
    let outcome = board.leave(id, &name);
    ensure_durable(board)?;
    Ok(outcome)
}

fn board_stats(board: &Board) -> Result<Stats, String> {
    Ok(board.stats())
}

fn whoami(board: &mut Board, rename: Option<String>) -> Result<UserIdentity, String> {
    match rename {
        Some(name) => {
            let identity = board.rename(&name).map_err(|e| e.to_string())?.clone();
            ensure_durable(board)?;
            Ok(identity)
        }
        None => Ok(board.identity().clone()),
    }
}

fn fetch_forecast(config: &AppConfig, days: Option<u8>) -> Result<Vec<DailyForecast>, String> {
    ForecastClient::from_config(&config.forecast)
        .fetch(days.unwrap_or(config.forecast.days))
        .map_err(|e| format!("forecast unavailable: {e}"))
}

fn set_location(
    config_store: &ConfigStore,
    latitude: f64,
    longitude: f64,
) -> Result<AppConfig, String> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("coordinates out of range: {latitude}, {longitude}"));
    }
    config_store.update(|config| {
        config.forecast.latitude = latitude;
        config.forecast.longitude = longitude;
    })
}

/// A process-scoped CLI loses in-memory-only changes on exit, so a
/// mutation that could not be written is reported to the caller.
fn ensure_durable(board: &Board) -> Result<(), String> {
    if board.is_degraded() {
        return Err(BoardError::StorageUnavailable(
            "change applied in memory only and will not be kept".into(),
        )
        .to_string());
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let fallback = config.log_filter.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to install log subscriber: {err}");
    }
}

fn open_board(config: &AppConfig) -> Board {
    let clock = SystemClock;
    let (today, now) = (clock.today(), clock.now());
    let persistence = Persistence::open_default(&config.database_path());
    let mut board = Board::open(persistence, Box::new(RandomWeather), Box::new(clock));
    board.seed_if_empty(demo_events(today, now));
    board
}

fn emit<T: Serialize>(result: Result<T, String>) -> anyhow::Result<()> {
    let value = result.map_err(anyhow::Error::msg)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_store = ConfigStore::load();
    let config = config_store.read();
    init_tracing(&config);

    match cli.command {
        Command::Forecast { days } => emit(fetch_forecast(&config, days)),
        Command::Config { action } => match action {
            ConfigAction::Show => emit(Ok::<_, String>(config)),
            ConfigAction::Location {
                latitude,
                longitude,
            } => emit(set_location(&config_store, latitude, longitude)),
        },
        Command::List { search, weather } => {
            let board = open_board(&config);
            emit(list_events(&board, &EventQuery::new(search, weather)))
        }
        Command::Create(args) => emit(create_event(&mut open_board(&config), args.into())),
        Command::Join { id } => emit(join_event(&mut open_board(&config), id)),
        Command::Leave { id } => emit(leave_event(&mut open_board(&config), id)),
        Command::Stats => emit(board_stats(&open_board(&config))),
        Command::Whoami { rename } => emit(whoami(&mut open_board(&config), rename)),
    }
}
