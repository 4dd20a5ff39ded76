use anyhow::Context;
use clap::{Parser, Subcommand};
use std::num::NonZeroUsize;
use std::sync::Arc;
use storefront_core::ranking::BestSellersRanker;
use storefront_core::storage::{CatalogStore, InMemoryCatalogStore, PgCatalogStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "storefront_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations.
    Migrate,

    /// Insert a deterministic demo catalog with orders in every status.
    Seed {
        /// Number of products to create (1..=500).
        #[arg(long, default_value_t = 20)]
        size: usize,

        /// Build the catalog and rank it in memory without touching the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the current best sellers as JSON.
    BestSellers {
        /// Number of entries. Defaults to BEST_SELLERS_LIMIT.
        #[arg(long)]
        limit: Option<NonZeroUsize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = storefront_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(&settings, args.command).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        let detail = format!("{err:#}");
        tracing::error!(error = %detail, "worker command failed");
    }
    result
}

async fn run(
    settings: &storefront_core::config::Settings,
    command: Command,
) -> anyhow::Result<()> {
    let default_limit =
        NonZeroUsize::new(settings.best_sellers_limit).context("BEST_SELLERS_LIMIT must be >= 1")?;

    if let Command::Seed {
        size,
        dry_run: true,
    } = command
    {
        let snapshot = storefront_core::seed::build_demo_catalog(size, chrono::Utc::now())?;
        let store = InMemoryCatalogStore::new(snapshot.products, snapshot.variants, snapshot.orders);
        let items = BestSellersRanker::new(Arc::new(store))
            .rank(default_limit)
            .await?;
        tracing::info!(size, dry_run = true, ranked = items.len(), "demo catalog built");
        print_json(&items)?;
        return Ok(());
    }

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.database_max_connections)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    storefront_core::storage::migrate(&pool).await?;

    match command {
        Command::Migrate => {
            tracing::info!("migrations applied");
        }
        Command::Seed { size, .. } => {
            storefront_core::seed::seed_demo_catalog(&pool, size).await?;
        }
        Command::BestSellers { limit } => {
            let store: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool.clone()));
            let limit = limit.unwrap_or(default_limit);
            let items = BestSellersRanker::new(store).rank(limit).await?;
            tracing::info!(limit = limit.get(), results = items.len(), "best sellers report");
            print_json(&items)?;
        }
    }

    pool.close().await;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize report failed")?;
    println!("{out}");
    Ok(())
}

fn init_sentry(settings: &storefront_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
