//! police-feed binary.
//!
//! `subscribe` streams new incidents as JSON lines, `server` keeps a store
//! reconciled with the feeds and serves it over HTTP, `regions` lists the
//! known region ids.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use police_feed::api::{self, AppState};
use police_feed::collector::Collector;
use police_feed::config::Settings;
use police_feed::feed::http::HttpFeedSource;
use police_feed::metrics::Metrics;
use police_feed::reconcile::{EventStore, FeedLister, Updater};
use police_feed::regions::{parse_selection, Regions};
use police_feed::store::{MemoryEventStore, SqliteEventStore};
use police_feed::{scheduler, FeedError};

#[derive(Parser, Debug)]
#[command(name = "police-feed", version, about = "Swedish police incident feeds")]
struct Cli {
    /// Settings file (TOML). Defaults to $POLICE_FEED_CONFIG or config/police_feed.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every new incident as a JSON line until Ctrl-C or a fatal error.
    Subscribe(SubscribeArgs),
    /// Reconcile the feeds into a store and serve it over HTTP.
    Server(ServerArgs),
    /// List known region ids and names.
    Regions,
}

#[derive(Args, Debug)]
struct SubscribeArgs {
    /// Comma separated region ids, or `all`.
    #[arg(long)]
    regions: Option<String>,
    #[arg(long)]
    url_template: Option<String>,
    #[arg(long)]
    send_timeout_ms: Option<u64>,
    #[arg(long)]
    refresh_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Comma separated region ids, or `all`.
    #[arg(long)]
    regions: Option<String>,
    /// SQLite database file.
    #[arg(long, conflicts_with = "memory")]
    db: Option<PathBuf>,
    /// Keep events in memory only.
    #[arg(long)]
    memory: bool,
    #[arg(long)]
    addr: Option<String>,
    #[arg(long)]
    interval_secs: Option<u64>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("police_feed=info,warn"));
    // stdout carries the event stream; logs go to stderr.
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; a missing file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Command::Subscribe(args) => subscribe(settings, args).await,
        Command::Server(args) => server(settings, args).await,
        Command::Regions => {
            for region in Regions::default().all() {
                println!("{}\t{}", region.id, region.name);
            }
            Ok(())
        }
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        token.cancel();
    });
}

async fn subscribe(mut settings: Settings, args: SubscribeArgs) -> anyhow::Result<()> {
    if let Some(r) = args.regions {
        settings.regions = parse_selection(&r);
    }
    if let Some(t) = args.url_template {
        settings.url_template = t;
    }
    if let Some(ms) = args.send_timeout_ms {
        settings.send_timeout_ms = ms;
    }
    if let Some(secs) = args.refresh_secs {
        settings.refresh_interval_secs = secs;
    }
    settings.validate()?;

    let source = HttpFeedSource::new(settings.http_timeout())?;
    let collector = Collector::new(settings.collector_config(), Arc::new(source))?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut sub = collector.subscribe(&cancel)?;
    let res = loop {
        match sub.recv().await {
            Ok(evt) => println!("{}", serde_json::to_string(&evt)?),
            Err(FeedError::Cancelled) => break Ok(()),
            Err(e) => break Err(anyhow::Error::from(e).context("collector stopped")),
        }
    };

    drop(sub);
    collector.shutdown();
    collector.wait().await;
    res
}

async fn server(mut settings: Settings, args: ServerArgs) -> anyhow::Result<()> {
    if let Some(r) = args.regions {
        settings.regions = parse_selection(&r);
    }
    if let Some(db) = args.db {
        settings.db_path = db;
    }
    if let Some(addr) = args.addr {
        settings.addr = addr;
    }
    if let Some(secs) = args.interval_secs {
        settings.update_interval_secs = secs;
    }
    settings.validate()?;

    let metrics = Metrics::init()?;

    let store: Arc<dyn EventStore> = if args.memory {
        Arc::new(MemoryEventStore::new())
    } else {
        let store = SqliteEventStore::open(&settings.db_path)
            .await
            .with_context(|| format!("failed to open store at {:?}", settings.db_path))?;
        Arc::new(store)
    };

    let registry = settings.registry();
    let source = HttpFeedSource::new(settings.http_timeout())?;
    let lister = FeedLister::new(&registry, &settings.regions, Arc::new(source))?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let updates = {
        let store = store.clone();
        let cancel = cancel.clone();
        let interval = settings.update_interval();
        tokio::spawn(async move {
            let updater = Updater::new();
            scheduler::run_updates(&updater, &lister, store.as_ref(), interval, cancel).await;
        })
    };

    let app = api::router(AppState::new(store, registry)).merge(metrics.router());

    tracing::info!("Listening on http://{}", settings.addr);
    let listener = TcpListener::bind(&settings.addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.addr))?;

    let shutdown = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error");

    cancel.cancel();
    updates.await.context("update loop panicked")?;
    served
}
