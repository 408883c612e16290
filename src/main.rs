use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use curio::{
    application::{
        books::BookService,
        error::AppError,
        games::GameService,
        images::{AssetResolver, ImageConfig, ImageWriter},
        repos::{BooksRepo, GamesRepo, ImageBlobStore},
    },
    config,
    infra::{
        db::PostgresRepositories,
        disk_cache::DiskCache,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::sync::watch;
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
        config::Command::Migrate(_) => {
            init_repositories(&settings).await?;
            info!(target = "curio::migrate", "Migrations applied");
            Ok(())
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let http_state = build_http_state(repositories, &settings);
    serve_http(&settings, http_state).await
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(repositories: Arc<PostgresRepositories>, settings: &config::Settings) -> HttpState {
    let books_repo: Arc<dyn BooksRepo> = repositories.clone();
    let games_repo: Arc<dyn GamesRepo> = repositories.clone();
    let blob_store: Arc<dyn ImageBlobStore> = repositories.clone();

    let image_config = ImageConfig::from(&settings.images);
    let cache = DiskCache::new(&image_config.cache_root);
    let writer = Arc::new(ImageWriter::new(&image_config, cache.clone()));

    info!(
        target = "curio::startup",
        cache_root = %image_config.cache_root.display(),
        target_height = image_config.target_height.get(),
        quality = image_config.quality,
        "Image pipeline configured"
    );

    HttpState {
        resolver: AssetResolver::new(cache, blob_store),
        books: Arc::new(BookService::new(books_repo, writer.clone())),
        games: Arc::new(GameService::new(games_repo, writer)),
        db: repositories,
        upload_limit: settings.uploads.max_request_bytes.get(),
    }
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let resolver = http_state.resolver.clone();
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| {
            AppError::from(InfraError::Bind {
                addr: settings.server.addr,
                source,
            })
        })?;

    info!(
        target = "curio::startup",
        addr = %settings.server.addr,
        "Listening"
    );

    let (draining_tx, draining_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = draining_tx.send(true);
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(draining_rx, settings.server.graceful_shutdown) => {
            warn!(
                target = "curio::shutdown",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out, dropping open connections"
            );
        }
    }

    // Cache repairs are best-effort; bound them by the same grace period.
    if tokio::time::timeout(settings.server.graceful_shutdown, resolver.wait_for_repairs())
        .await
        .is_err()
    {
        warn!(
            target = "curio::shutdown",
            "Pending cache repairs abandoned at shutdown"
        );
    }

    info!(target = "curio::shutdown", "Server stopped");
    Ok(())
}

/// Completes `grace` after draining starts; never completes otherwise.
async fn drain_deadline(mut draining: watch::Receiver<bool>, grace: Duration) {
    if draining.wait_for(|draining| *draining).await.is_ok() {
        tokio::time::sleep(grace).await;
    } else {
        std::future::pending::<()>().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "curio::shutdown", error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "curio::shutdown", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(target = "curio::shutdown", "Shutdown signal received, draining connections");
}
