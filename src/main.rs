mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use baha_song_archiver::baha::{
    BrowserFetcher, CommentFetcher, HttpFetcher, PageFetcher, PageUrl,
};
use baha_song_archiver::config::{Config, FetchStrategy};
use baha_song_archiver::db::Database;
use baha_song_archiver::jobs::{Job, JobContext};
use baha_song_archiver::queue::{JobQueue, JobReceiver, WorkQueue, WorkerPool};
use baha_song_archiver::{probe, scheduler};

use crate::cli::{Cli, ClientChoice, Commands};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        base_url = %config.base_url,
        board = config.board_id,
        title = %config.search_title,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Run => serve(config).await,
        Commands::ScrapeTitle { title, user } => {
            let job = Job::SearchTitle {
                title: title.unwrap_or_else(|| config.search_title.clone()),
                user,
                page: 1,
            };
            run_one_shot(config, job).await
        }
        Commands::ScrapeUser { user } => run_one_shot(config, Job::SearchUser { user, page: 1 }).await,
        Commands::ScrapeThread { url } => {
            let url = PageUrl::parse(&url).context("Invalid thread url")?;
            run_one_shot(config, Job::ScrapeThread { url }).await
        }
        Commands::FetchComments { post_no } => {
            run_one_shot(config, Job::FetchComments { post_no }).await
        }
        Commands::Cleanup => run_one_shot(config, Job::CleanupPosts).await,
        Commands::CheckLayout { client } => check_layout(&config, client).await,
    }
}

/// Everything a command needs to process jobs.
struct Runtime {
    ctx: JobContext,
    queue: Arc<WorkQueue>,
    receiver: JobReceiver,
    browser: Option<Arc<BrowserFetcher>>,
}

async fn build_runtime(config: Config) -> Result<Runtime> {
    // Ensure the database directory exists
    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    info!("Database initialized");

    // The browser fetcher keeps its handle so shutdown can close Chrome.
    let browser = match config.fetch_strategy {
        FetchStrategy::Browser => Some(Arc::new(BrowserFetcher::new(&config))),
        FetchStrategy::Http => None,
    };
    let fetcher: Arc<dyn PageFetcher> = match &browser {
        Some(browser) => browser.clone(),
        None => Arc::new(HttpFetcher::new(&config)?),
    };
    let comments =
        Arc::new(CommentFetcher::new(&config).context("Failed to build comment client")?);

    let (queue, receiver) = WorkQueue::new();
    let ctx = JobContext {
        config,
        db,
        fetcher,
        comments,
        queue: queue.clone(),
    };

    Ok(Runtime {
        ctx,
        queue,
        receiver,
        browser,
    })
}

/// Run scheduled scrapes until a shutdown signal arrives.
async fn serve(config: Config) -> Result<()> {
    info!("Starting baha-song-archiver");

    let runtime = build_runtime(config).await?;

    let scheduler_ctx = runtime.ctx.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler::run_loop(scheduler_ctx).await;
    });

    let mut pool = WorkerPool::new(runtime.ctx, runtime.queue, runtime.receiver);
    let pool_handle = tokio::spawn(async move {
        if let Err(e) = pool.run().await {
            error!("Worker pool error: {e:#}");
        }
    });

    info!("Worker pool started");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down...");

    scheduler_handle.abort();
    pool_handle.abort();
    if let Some(browser) = runtime.browser {
        browser.shutdown().await;
    }

    info!("Shutdown complete");

    Ok(())
}

/// Seed one job and process the queue until it drains.
async fn run_one_shot(config: Config, job: Job) -> Result<()> {
    let runtime = build_runtime(config).await?;

    runtime.ctx.queue.enqueue(job).await?;

    let mut pool = WorkerPool::new(runtime.ctx, runtime.queue, runtime.receiver);
    pool.run_until_idle().await?;

    if let Some(browser) = runtime.browser {
        browser.shutdown().await;
    }

    Ok(())
}

/// Probe the live forum with the chosen client(s) and print the results.
async fn check_layout(config: &Config, client: ClientChoice) -> Result<()> {
    let comments = CommentFetcher::new(config).context("Failed to build comment client")?;

    let mut runs = Vec::new();

    if matches!(client, ClientChoice::Http | ClientChoice::All) {
        let fetcher = HttpFetcher::new(config)?;
        // The comment endpoint serves bare json, so it is only probed here.
        let reports = probe::run_probe(config, &fetcher, Some(&comments)).await;
        runs.push(("http", reports));
    }

    if matches!(client, ClientChoice::Browser | ClientChoice::All) {
        let fetcher = BrowserFetcher::new(config);
        let reports = probe::run_probe(config, &fetcher, None).await;
        fetcher.shutdown().await;
        runs.push(("browser", reports));
    }

    let mut failed = false;
    for (label, reports) in &runs {
        if runs.len() > 1 {
            println!("[{label}]");
        }
        print!("{}", probe::render(reports));
        failed = failed || probe::has_failures(reports);
    }

    if failed {
        anyhow::bail!("layout probe found failures");
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,baha_song_archiver=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
