use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cardforge::api::{ApiError, CardApi, CardRecord, HttpCardApi};
use cardforge::config::{ConfigError, EngineConfig, normalize_base_url};
use cardforge::image_gen::{SubmitOutcome, wait_terminal};
use cardforge::pagination::{CardListSink, LoadOutcome, PaginationController};
use cardforge::render::{CardView, RenderProjection};
use cardforge::session::AuthoringSession;
use cardforge::tilt::{Bounds, Point, TiltEffect};
use cardforge::EngineError;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no card to work on; create one first")]
    NoCard,
}

impl CliError {
    /// Declined confirmations end the command quietly.
    fn is_silent(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_silent())
    }
}

/// Drop silent errors so they neither print nor fail the exit status.
fn settle(result: Result<(), CliError>) -> Result<(), CliError> {
    match result {
        Err(e) if e.is_silent() => {
            info!("cancelled");
            Ok(())
        }
        other => other,
    }
}

#[derive(Parser, Debug)]
#[command(name = "cardforge", about = "Trading card authoring and preview engine")]
struct Cli {
    /// Overrides `CARDFORGE_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Page through the card list, as infinite scroll would.
    Browse {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Print the most recent card record.
    Latest,
    /// Print the render projection of the latest card.
    Preview {
        #[arg(long, default_value_t = false)]
        dark: bool,
    },
    GenerateCard,
    OpenPack,
    /// Generate an AI image for the latest card.
    Image {
        #[arg(long)]
        prompt: String,
        /// Adopt the first result as the card image.
        #[arg(long, default_value_t = false)]
        commit: bool,
        /// Give up waiting after this many seconds.
        #[arg(long, default_value_t = 300)]
        wait_secs: u64,
    },
    /// Print the tilt frame for a pointer over a card box.
    Tilt {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long, default_value_t = 0.0)]
        left: f64,
        #[arg(long, default_value_t = 0.0)]
        top: f64,
        #[arg(long, default_value_t = 250.0)]
        width: f64,
        #[arg(long, default_value_t = 350.0)]
        height: f64,
    },
}

/// Collects list output for printing.
#[derive(Default)]
struct CollectingSink {
    cards: Mutex<Vec<CardRecord>>,
}

impl CollectingSink {
    fn take(&self) -> Vec<CardRecord> {
        std::mem::take(&mut *self.cards.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl CardListSink for CollectingSink {
    fn replace(&self, cards: Vec<CardRecord>) {
        *self.cards.lock().unwrap_or_else(PoisonError::into_inner) = cards;
    }

    fn append(&self, cards: Vec<CardRecord>) {
        self.cards.lock().unwrap_or_else(PoisonError::into_inner).extend(cards);
    }

    fn prepend(&self, mut cards: Vec<CardRecord>) {
        let mut visible = self.cards.lock().unwrap_or_else(PoisonError::into_inner);
        cards.append(&mut visible);
        *visible = cards;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cardforge=info")))
        .with_writer(std::io::stderr)
        .init();

    settle(run(Cli::parse()).await)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = EngineConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = normalize_base_url(&base_url)?;
    }
    let api: Arc<dyn CardApi> = Arc::new(HttpCardApi::new(&config.api)?);
    info!(base_url = %config.api.base_url, "cardforge starting");

    match cli.command {
        Command::Browse { pages } => run_browse(api, &config, pages).await,
        Command::Latest => {
            let latest = api.latest_card().await?;
            print_json(&latest)
        }
        Command::Preview { dark } => {
            let mut session = AuthoringSession::new(api, &config);
            session.load_latest().await?;
            session.model_mut().set_dark_mode(dark);
            print_json(&session.view())
        }
        Command::GenerateCard => {
            let sink = Arc::new(CollectingSink::default());
            let controller = PaginationController::new(api, sink.clone(), &config.pagination);
            controller.generate_card().await?;
            print_views(&config, &sink.take())
        }
        Command::OpenPack => {
            let sink = Arc::new(CollectingSink::default());
            let controller = PaginationController::new(api, sink.clone(), &config.pagination);
            controller.open_pack().await?;
            print_views(&config, &sink.take())
        }
        Command::Image { prompt, commit, wait_secs } => run_image(api, &config, &prompt, commit, wait_secs).await,
        Command::Tilt { x, y, left, top, width, height } => {
            let mut effect = TiltEffect::default();
            effect.pointer_enter();
            print_json(&effect.pointer_move(Point::new(x, y), Bounds::new(left, top, width, height)))
        }
    }
}

async fn run_browse(api: Arc<dyn CardApi>, config: &EngineConfig, pages: u32) -> Result<(), CliError> {
    let sink = Arc::new(CollectingSink::default());
    let controller = PaginationController::new(api, sink.clone(), &config.pagination);
    for n in 0..pages.max(1) {
        match controller.load_page(n > 0).await? {
            LoadOutcome::EndOfData => break,
            LoadOutcome::Loaded { count, next_page } => info!(count, next_page, "page loaded"),
            LoadOutcome::Skipped => {}
        }
    }
    print_views(config, &sink.take())
}

async fn run_image(
    api: Arc<dyn CardApi>,
    config: &EngineConfig,
    prompt: &str,
    commit: bool,
    wait_secs: u64,
) -> Result<(), CliError> {
    let mut session = AuthoringSession::new(api, config);
    if !session.load_latest().await? {
        return Err(CliError::NoCard);
    }
    session.set_prompt(prompt);

    let mut rx = session.workflow().subscribe();
    // The latest card always has an id, so no save confirmation is needed.
    let outcome = session.generate_image(&|_: &str| false).await?;
    if let SubmitOutcome::Polling { request_id } = &outcome {
        info!(%request_id, "waiting for image");
    }
    let snapshot = wait_terminal(&mut rx, Some(Duration::from_secs(wait_secs))).await?;
    print_json(&snapshot)?;

    if commit && snapshot.result().is_some() {
        session.commit_generated_image().await?;
        print_json(&session.view())?;
    }
    Ok(())
}

fn print_views(config: &EngineConfig, cards: &[CardRecord]) -> Result<(), CliError> {
    let projection = RenderProjection::new(config.api.image_base_path.clone());
    let views: Vec<CardView> = cards.iter().map(|card| projection.project_record(card)).collect();
    print_json(&views)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;
