use std::{process, sync::Arc};

use socio::{
    application::{
        Services,
        error::AppError,
        stores::{PrimaryStore, Stores},
    },
    cache::{
        CacheConfig, CacheInvalidator, CacheStore, InvalidationPlan, InvalidationRegistry,
        MemoryCacheStore,
    },
    config::{self, CacheBackend},
    domain::types::{Collection, DerivedCounter},
    infra::{
        db::{PostgresStore, SqlRepositories},
        error::InfraError,
        kv::RedisCacheStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    let emit = || {
        error!(
            error = %error,
            source = report.source,
            class = %report.class,
            causes = ?report.messages,
            "application error"
        );
    };

    if dispatcher::has_been_set() {
        emit();
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, emit);
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Migrate => run_migrate(&settings).await,
        config::Command::Resync(args) => run_resync(&settings, args).await,
        config::Command::Purge(args) => run_purge(&settings, args.collection).await,
    }
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(settings).await?;
    PostgresStore::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!("Migrations applied");
    Ok(())
}

async fn run_resync(settings: &config::Settings, args: config::ResyncArgs) -> Result<(), AppError> {
    if !settings.cache.is_shared() {
        warn!(
            backend = "memory",
            "Resync repairs counters but cannot invalidate views cached by other processes"
        );
    }
    let services = build_services(settings).await?;
    let counters = match args.counter {
        Some(counter) => vec![counter],
        None => DerivedCounter::ALL.to_vec(),
    };

    let mut failures = 0;
    for counter in counters {
        let report = services.counters.resync(counter, args.subject).await?;
        failures += report.errors.len();
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::unexpected(err.to_string()))?;
        println!("{rendered}");
    }

    if failures > 0 {
        warn!(failures, "Resync finished with per-subject failures");
    }
    Ok(())
}

async fn run_purge(settings: &config::Settings, collection: Collection) -> Result<(), AppError> {
    settings
        .cache
        .require_shared("purge")
        .map_err(|err| AppError::validation(err.to_string()))?;

    let cache_config = CacheConfig::from(&settings.cache);
    let registry = Arc::new(InvalidationRegistry::standard());
    let cache = build_cache_store(settings).await?;
    let invalidator = CacheInvalidator::new(cache_config, cache, registry.clone());

    let mut plan = InvalidationPlan::default();
    plan.include_lists(&registry, collection, true);
    let outcome = invalidator.execute(plan).await;

    info!(
        collection = %collection,
        deleted = outcome.deleted,
        failed = outcome.failed,
        "Purge complete"
    );
    Ok(())
}

async fn build_services(settings: &config::Settings) -> Result<Services, AppError> {
    let pool = connect_pool(settings).await?;
    let primary: Arc<dyn PrimaryStore> = Arc::new(PostgresStore::new(pool));
    let repositories = Arc::new(SqlRepositories::new(primary));
    let cache = build_cache_store(settings).await?;
    let stores = Stores::from_repositories(repositories, cache);

    Ok(Services::new(
        &stores,
        CacheConfig::from(&settings.cache),
        Arc::new(InvalidationRegistry::standard()),
        settings.counters.participants_source,
    ))
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresStore::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn build_cache_store(settings: &config::Settings) -> Result<Arc<dyn CacheStore>, AppError> {
    match settings.cache.backend {
        CacheBackend::Memory => {
            let config = CacheConfig::from(&settings.cache);
            Ok(Arc::new(MemoryCacheStore::new(&config)))
        }
        CacheBackend::Redis => {
            let url = settings
                .cache
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is not configured"))?;
            let store = RedisCacheStore::connect(url).await?;
            Ok(Arc::new(store))
        }
    }
}
