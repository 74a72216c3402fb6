use std::{process, sync::Arc};

use tokio::try_join;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use trove::{
    application::{
        catalog::CatalogService,
        economy::EconomyService,
        error::AppError,
        metadata::MetadataService,
        repos::{EconomyRepo, HealthRepo, ItemsRepo, MetadataRepo},
    },
    cache::{CacheConfig, MemoryStorage, ReadThroughCache, SystemClock, VersionWatcher},
    config,
    infra::{
        db::{self, ViewRepositories},
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Version(_) => run_version(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    let watcher_handle = app
        .cache
        .clone()
        .map(|cache| VersionWatcher::new(cache).spawn());

    let result = serve_http(&settings, app.http_state, app.admin_state).await;

    if let Some(handle) = watcher_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_version(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    match repositories.data_version().await? {
        Some(record) => {
            let rendered = serde_json::to_string_pretty(&record)
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            println!("{rendered}");
        }
        None => warn!(target: "trove::version", "metadata row `global` is absent"),
    }
    Ok(())
}

struct ApplicationContext {
    http_state: HttpState,
    admin_state: AdminState,
    cache: Option<Arc<ReadThroughCache>>,
}

async fn init_repositories(settings: &config::Settings) -> Result<Arc<ViewRepositories>, AppError> {
    let store = db::connect(&settings.database).await?;
    Ok(Arc::new(ViewRepositories::new(store)))
}

fn build_application_context(
    repositories: Arc<ViewRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let items_repo: Arc<dyn ItemsRepo> = repositories.clone();
    let economy_repo: Arc<dyn EconomyRepo> = repositories.clone();
    let metadata_repo: Arc<dyn MetadataRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = cache_config.enabled.then(|| {
        Arc::new(ReadThroughCache::new(
            cache_config.clone(),
            Arc::new(MemoryStorage::new(cache_config.max_entries)),
            metadata_repo.clone(),
            Arc::new(SystemClock),
        ))
    });

    info!(
        target: "trove::startup",
        cache_enabled = cache.is_some(),
        max_entries = cache_config.max_entries,
        "application context ready"
    );

    let http_state = HttpState {
        catalog: Arc::new(CatalogService::new(
            items_repo,
            economy_repo.clone(),
            cache.clone(),
        )),
        economy: Arc::new(EconomyService::new(economy_repo, cache.clone())),
        metadata: Arc::new(MetadataService::new(metadata_repo, cache.clone())),
    };

    let admin_state = AdminState {
        health: health_repo,
        cache: cache.clone(),
    };

    ApplicationContext {
        http_state,
        admin_state,
        cache,
    }
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target: "trove::startup",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
