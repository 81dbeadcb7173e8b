use std::fmt;

use progress_core::model::{Badge, CompletionKind, ItemId};
use services::config::parse_port;
use services::{AppConfig, AppServices, Clock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod http;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidPort { raw: String },
    InvalidItemId { raw: String },
    ConflictingItems,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid --port value: {raw}"),
            ArgsError::InvalidItemId { raw } => write!(f, "invalid item id: {raw:?}"),
            ArgsError::ConflictingItems => {
                write!(f, "pass exactly one of --tutorial or --challenge")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app serve    [--db <sqlite_url>] [--host <addr>] [--port <port>]");
    eprintln!("  app register --email <email> --password <password> --name <name> [client flags]");
    eprintln!("  app login    --email <email> --password <password> [client flags]");
    eprintln!("  app complete --email <email> --password <password>");
    eprintln!("               (--tutorial <id> | --challenge <id>) [client flags]");
    eprintln!("  app show     --email <email> --password <password> [client flags]");
    eprintln!();
    eprintln!("Client flags:");
    eprintln!("  --db <sqlite_url>     remote store and accounts");
    eprintln!("  --cache <sqlite_url>  local progress cache");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROGRESS_DB_URL, PROGRESS_CACHE_URL, HOST, PORT, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    Register,
    Login,
    Complete,
    Show,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "serve" => Some(Self::Serve),
            "register" => Some(Self::Register),
            "login" => Some(Self::Login),
            "complete" => Some(Self::Complete),
            "show" => Some(Self::Show),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    tutorial: Option<String>,
    challenge: Option<String>,
}

impl Args {
    /// Parse flags, applying `--db`, `--cache`, `--host` and `--port` onto `config`.
    fn parse(
        args: &mut impl Iterator<Item = String>,
        config: &mut AppConfig,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    config.db_url = normalize_sqlite_url(value)?;
                }
                "--cache" => {
                    let value = require_value(args, "--cache")?;
                    config.cache_url = normalize_sqlite_url(value)?;
                }
                "--host" => config.host = require_value(args, "--host")?,
                "--port" => {
                    let value = require_value(args, "--port")?;
                    config.port = parse_port("--port", &value)
                        .map_err(|_| ArgsError::InvalidPort { raw: value })?;
                }
                "--email" => parsed.email = Some(require_value(args, "--email")?),
                "--password" => parsed.password = Some(require_value(args, "--password")?),
                "--name" => parsed.name = Some(require_value(args, "--name")?),
                "--tutorial" => parsed.tutorial = Some(require_value(args, "--tutorial")?),
                "--challenge" => parsed.challenge = Some(require_value(args, "--challenge")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn credentials(&self) -> Result<(&str, &str), ArgsError> {
        let email = self
            .email
            .as_deref()
            .ok_or(ArgsError::MissingFlag { flag: "--email" })?;
        let password = self
            .password
            .as_deref()
            .ok_or(ArgsError::MissingFlag { flag: "--password" })?;
        Ok((email, password))
    }

    fn completion(&self) -> Result<(CompletionKind, ItemId), ArgsError> {
        let (kind, raw) = match (&self.tutorial, &self.challenge) {
            (Some(id), None) => (CompletionKind::Tutorial, id),
            (None, Some(id)) => (CompletionKind::Challenge, id),
            _ => return Err(ArgsError::ConflictingItems),
        };
        let item_id = ItemId::new(raw.as_str())
            .map_err(|_| ArgsError::InvalidItemId { raw: raw.clone() })?;
        Ok((kind, item_id))
    }
}

fn normalize_sqlite_url(raw: String) -> Result<String, ArgsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ArgsError::InvalidDbUrl { raw });
    }
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return Ok(trimmed.to_owned());
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    Ok(format!("sqlite://{}", absolute.display()))
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn serve(services: &AppServices, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = http::router(services.progress_function());
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "progress calculation function listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn print_progress(services: &AppServices) {
    let Some(progress) = services.progress_store().snapshot() else {
        println!("no progress loaded");
        return;
    };
    println!("user:       {}", progress.user_id());
    println!("xp:         {}", progress.total_xp());
    println!("level:      {}", progress.level());
    println!("tutorials:  {}", progress.completed_tutorials().len());
    println!("challenges: {}", progress.completed_challenges().len());
    for badge_id in progress.badges() {
        match Badge::from_id(badge_id.as_str()) {
            Some(badge) => println!("badge:      {} ({})", badge.title(), badge.description()),
            None => println!("badge:      {badge_id}"),
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next() {
        None => {
            print_usage();
            return Err(ArgsError::MissingFlag { flag: "<command>" }.into());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    let mut config = AppConfig::from_env()?;
    let parsed = Args::parse(&mut argv, &mut config).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite here so services stay free of filesystem concerns.
    prepare_sqlite_file(&config.db_url)?;
    prepare_sqlite_file(&config.cache_url)?;
    let services = AppServices::new_sqlite(&config, Clock::default_clock()).await?;

    match cmd {
        Command::Serve => serve(&services, &config).await,
        Command::Register => {
            let (email, password) = parsed.credentials()?;
            let name = parsed
                .name
                .as_deref()
                .ok_or(ArgsError::MissingFlag { flag: "--name" })?;
            let user = services.auth_session().register(email, password, name).await?;
            services.progress_store().load(&user.id).await;
            println!("registered {} ({})", user.email, user.id);
            Ok(())
        }
        Command::Login => {
            let (email, password) = parsed.credentials()?;
            let user = services.auth_session().login(email, password).await?;
            println!("signed in as {} ({})", user.name, user.email);
            Ok(())
        }
        Command::Complete => {
            let (email, password) = parsed.credentials()?;
            let (kind, item_id) = parsed.completion()?;
            let user = services.auth_session().login(email, password).await?;
            let store = services.progress_store();
            store.load(&user.id).await;

            let outcome = store.complete(kind, &item_id).await?;
            if outcome.is_noop() {
                println!("{kind} {item_id} was already completed");
            } else {
                println!("+{} XP for {kind} {item_id}", outcome.xp_gained);
                for badge in &outcome.new_badges {
                    println!("new badge: {}", badge.title());
                }
            }
            print_progress(&services);
            Ok(())
        }
        Command::Show => {
            let (email, password) = parsed.credentials()?;
            let user = services.auth_session().login(email, password).await?;
            services.progress_store().load(&user.id).await;
            print_progress(&services);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
