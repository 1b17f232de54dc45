//! weather-offline - drive the offline worker of the weather app from a terminal.
//!
//! Installs and activates the current cache generation against the app's
//! origin, routes individual requests through the worker, looks up weather
//! (falling back to the last known answer when offline), and inspects the
//! on-disk cache containers.

mod format;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use weather_offline_core::{
    spawn_worker, AppConfig, CacheStorage, DiskCacheStorage, Fetcher, HttpFetcher, OfflineFetcher,
    OfflineWorker, Registration, Request, WeatherClient, WeatherError, WorkerHandle, WorkerState,
};

use format::{format_status, format_weather, truncate_string};

/// Widest URL shown when listing cache entries
const MAX_URL_DISPLAY: usize = 72;

#[derive(Parser)]
#[command(name = "weather-offline", version, about = "Offline cache manager for the weather app")]
struct Cli {
    /// Origin the app is served from (overrides the config file)
    #[arg(long, global = true, env = "WEATHER_OFFLINE_ORIGIN")]
    origin: Option<String>,

    /// Directory holding the cache containers (overrides the config file)
    #[arg(long, global = true, env = "WEATHER_OFFLINE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Treat the network as unreachable
    #[arg(long, global = true)]
    offline: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the worker: install the current generation, then activate it
    Install,
    /// Delete stale cache generations
    Activate,
    /// Route one request through the worker and print the response
    Fetch {
        /// Absolute URL, or a path relative to the origin
        url: String,
        /// Send as a top-level page navigation
        #[arg(long)]
        navigate: bool,
        /// Accept header to send
        #[arg(long)]
        accept: Option<String>,
        /// Print the response body
        #[arg(long)]
        body: bool,
    },
    /// Look up current weather through the worker
    Weather {
        /// City name, e.g. "London"
        #[arg(required_unless_present = "lat")]
        city: Option<String>,
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// OpenWeatherMap API key
        #[arg(long, env = "OPENWEATHER_API_KEY")]
        api_key: Option<String>,
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cache containers, or the entries of one container
    Caches {
        name: Option<String>,
    },
    /// Delete every cache container
    Clear,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // RUST_LOG takes precedence over --verbose
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Everything a command needs: settings plus the persistent cache.
struct App {
    config: AppConfig,
    origin: Url,
    storage: Arc<DiskCacheStorage>,
    offline: bool,
}

impl App {
    fn load(cli: &Cli) -> Result<Self> {
        let mut config = AppConfig::load()?;
        if let Some(ref origin) = cli.origin {
            config.origin = Some(origin.clone());
        }
        if let Some(ref dir) = cli.cache_dir {
            config.cache_dir = Some(dir.clone());
        }

        let origin = config.origin_url()?;
        let cache_root = config.cache_root()?;
        let storage = DiskCacheStorage::new(cache_root.clone())
            .with_context(|| format!("Failed to open cache directory: {}", cache_root.display()))?;

        Ok(Self {
            config,
            origin,
            storage: Arc::new(storage),
            offline: cli.offline,
        })
    }

    fn fetcher(&self) -> Result<Arc<dyn Fetcher>> {
        if self.offline {
            Ok(Arc::new(OfflineFetcher))
        } else {
            Ok(Arc::new(HttpFetcher::new()?))
        }
    }

    fn start_worker(&self, registration: Arc<Registration>) -> Result<(WorkerHandle, JoinHandle<()>)> {
        let worker = OfflineWorker::new(
            self.origin.clone(),
            self.config.worker.clone(),
            self.storage.clone(),
            self.fetcher()?,
            registration,
        );
        Ok(spawn_worker(worker))
    }
}

/// Drop the handle and wait for in-flight events and cache writes.
async fn shutdown(handle: WorkerHandle, task: JoinHandle<()>) -> Result<()> {
    drop(handle);
    task.await.context("Worker task failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = App::load(&cli)?;
    info!(origin = %app.origin, cache = %app.config.worker.cache_name, "weather-offline starting");

    match cli.command {
        Command::Install => install(&app).await,
        Command::Activate => activate(&app).await,
        Command::Fetch {
            url,
            navigate,
            accept,
            body,
        } => fetch(&app, &url, navigate, accept, body).await,
        Command::Weather {
            city,
            lat,
            lon,
            api_key,
            json,
        } => weather(&app, city, lat.zip(lon), api_key, json).await,
        Command::Caches { name } => caches(&app, name).await,
        Command::Clear => clear(&app).await,
    }
}

async fn install(app: &App) -> Result<()> {
    let registration = Arc::new(Registration::new(app.origin.clone()));
    let (handle, task) = app.start_worker(registration.clone())?;

    // Registration failures are reported, never fatal
    match registration.register(&handle).await {
        Ok(WorkerState::Activated) => info!(worker = %handle.id(), "Worker registered and active"),
        Ok(state) => info!(worker = %handle.id(), ?state, "Worker registered"),
        Err(e) => error!(error = %e, "Worker registration failed"),
    }
    shutdown(handle, task).await?;

    let entries = app.storage.entries(&app.config.worker.cache_name).await.unwrap_or_default();
    println!(
        "Cache {}: {} of {} static assets cached",
        app.config.worker.cache_name,
        entries.len(),
        app.config.worker.static_assets.len()
    );
    for asset in &app.config.worker.static_assets {
        let url = Request::resolve(&app.origin, asset)?;
        let cached = app
            .storage
            .match_request(&app.config.worker.cache_name, &Request::get(url))
            .await?
            .is_some();
        println!("  {} {}", if cached { "✓" } else { "✗" }, asset);
    }
    Ok(())
}

async fn activate(app: &App) -> Result<()> {
    let registration = Arc::new(Registration::new(app.origin.clone()));
    let (handle, task) = app.start_worker(registration)?;
    let report = handle.activate().await?;
    shutdown(handle, task).await?;

    if report.deleted.is_empty() {
        println!("No stale caches");
    }
    for name in &report.deleted {
        println!("Deleted {}", name);
    }
    for name in &report.failed {
        println!("Could not delete {}", name);
    }
    Ok(())
}

async fn fetch(app: &App, target: &str, navigate: bool, accept: Option<String>, print_body: bool) -> Result<()> {
    let url = Request::resolve(&app.origin, target)
        .with_context(|| format!("Invalid URL: {}", target))?;
    let mut request = if navigate { Request::navigate(url) } else { Request::get(url) };
    if let Some(accept) = accept {
        request = request.with_header("accept", accept);
    }

    let registration = Arc::new(Registration::new(app.origin.clone()));
    let (handle, task) = app.start_worker(registration)?;
    let response = handle.fetch(request).await?;
    shutdown(handle, task).await?;

    println!("{}", format_status(&response));
    for (name, value) in response.headers.iter() {
        println!("{}: {}", name, value);
    }
    if print_body {
        println!();
        println!("{}", response.text());
    }
    Ok(())
}

async fn weather(
    app: &App,
    city: Option<String>,
    coords: Option<(f64, f64)>,
    api_key: Option<String>,
    json: bool,
) -> Result<()> {
    let api_key = api_key
        .or_else(|| app.config.api_key.clone())
        .ok_or_else(|| anyhow::anyhow!("No API key. Set OPENWEATHER_API_KEY or api_key in the config file"))?;

    let registration = Arc::new(Registration::new(app.origin.clone()));
    let (handle, task) = app.start_worker(registration)?;
    let client = WeatherClient::new(Arc::new(handle.clone()), api_key)?;
    let result = match (city, coords) {
        (_, Some((lat, lon))) => client.fetch_weather_by_coords(lat, lon).await,
        (Some(city), None) => client.fetch_weather_by_city(&city).await,
        (None, None) => Err(WeatherError::InvalidQuery("Give a city name or --lat/--lon".to_string())),
    };
    drop(client);
    shutdown(handle, task).await?;

    match result {
        Ok(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
        Ok(record) => println!("{}", format_weather(&record)),
        Err(e) => anyhow::bail!("{} ({})", e.user_message(), e),
    }
    Ok(())
}

async fn caches(app: &App, name: Option<String>) -> Result<()> {
    let names = app.storage.keys().await?;
    let Some(name) = name else {
        if names.is_empty() {
            println!("No caches in {}", app.storage.root().display());
        }
        for name in names {
            let count = app.storage.entries(&name).await.map(|e| e.len()).unwrap_or(0);
            let marker = if name == app.config.worker.cache_name { "*" } else { " " };
            println!("{} {} ({} entries)", marker, name, count);
        }
        return Ok(());
    };

    let entries = app
        .storage
        .entries(&name)
        .await
        .with_context(|| format!("Failed to read cache {}", name))?;
    for entry in entries {
        println!(
            "{:>3} {:<width$} {}",
            entry.status,
            truncate_string(&entry.key.url, MAX_URL_DISPLAY),
            entry.age_display(),
            width = MAX_URL_DISPLAY
        );
    }
    Ok(())
}

async fn clear(app: &App) -> Result<()> {
    for name in app.storage.keys().await? {
        if app.storage.delete(&name).await? {
            println!("Deleted {}", name);
        }
    }
    Ok(())
}
