use std::{process, sync::Arc, time::Duration};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use toggleboard::{
    application::{
        admin::{AdminRolloutService, AdminToggleService},
        error::AppError,
        evaluation::EvaluationService,
        export::ExportService,
        jobs::{BackupExportContext, backup_schedule, process_backup_export_job},
        repos::{RolloutsRepo, RolloutsWriteRepo, TogglesRepo, TogglesWriteRepo},
        resolver::Resolver,
        tasks::{TaskQueue, TaskWorker},
    },
    cache::{CacheConfig, CdnInvalidator, EdgeCache, MemoryCache, ObjectStore},
    config::{self, EdgeBackend},
    infra::{
        cdn::{HttpCdnInvalidator, NoopCdnInvalidator},
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, CdnOrigin, PublicState},
        object_store::{FsObjectStore, MemoryObjectStore},
        telemetry,
    },
};
use tokio::{task::JoinHandle, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const EXPORT_ACTOR: &str = "cli";

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
        config::Command::Export(args) => run_export(settings, args).await,
    }
}

/// Shared services wired for the `serve` command.
struct ApplicationContext {
    public_state: PublicState,
    admin_state: AdminState,
    edge: Option<Arc<EdgeCache>>,
    exporter: Arc<ExportService>,
    task_worker: JoinHandle<()>,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    info!(
        target = "toggleboard::serve",
        edge = app.edge.as_ref().map(|edge| edge.namespace()).unwrap_or("disabled"),
        cdn_purge = settings.cdn.purge_url.is_some(),
        backup = settings.backup.enabled,
        "services initialised"
    );

    let monitor_handle = if settings.backup.enabled {
        Some(spawn_backup_monitor(app.exporter.clone(), &settings.backup)?)
    } else {
        None
    };

    let result = serve_http(&settings, app.public_state, app.admin_state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    // Dropping the router states released the last queue senders; let the worker drain.
    if tokio::time::timeout(settings.server.graceful_shutdown, app.task_worker)
        .await
        .is_err()
    {
        warn!(
            target = "toggleboard::serve",
            "task worker did not drain before the shutdown deadline"
        );
    }

    result
}

async fn run_export(settings: config::Settings, args: config::ExportArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let path = args.file;

    info!(
        target = "toggleboard::export",
        path = %path.display(),
        "Starting export"
    );

    let exporter = ExportService::new(repositories, None, settings.backup.object_path.clone());
    let count = exporter.export_to_file(&path, EXPORT_ACTOR).await?;

    info!(target = "toggleboard::export", count, "Export completed");
    Ok(())
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
        .map_err(|err| AppError::from(InfraError::database(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_object_store(edge: &config::EdgeSettings) -> Result<Option<Arc<dyn ObjectStore>>, AppError> {
    let store: Option<Arc<dyn ObjectStore>> = match edge.backend {
        EdgeBackend::Filesystem => Some(Arc::new(
            FsObjectStore::new(edge.directory.clone())
                .map_err(|err| AppError::from(InfraError::from(err)))?,
        )),
        EdgeBackend::Memory => Some(Arc::new(MemoryObjectStore::default())),
        EdgeBackend::Disabled => None,
    };
    Ok(store)
}

fn build_cdn_invalidator(cdn: &config::CdnSettings) -> Result<Arc<dyn CdnInvalidator>, AppError> {
    match cdn.purge_url.as_ref() {
        Some(endpoint) => {
            let invalidator =
                HttpCdnInvalidator::new(endpoint.clone(), cdn.token.clone(), cdn.timeout)
                    .map_err(|err| AppError::from(InfraError::configuration(err)))?;
            Ok(Arc::new(invalidator))
        }
        None => Ok(Arc::new(NoopCdnInvalidator)),
    }
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let toggles_read: Arc<dyn TogglesRepo> = repositories.clone();
    let toggles_write: Arc<dyn TogglesWriteRepo> = repositories.clone();
    let rollouts_read: Arc<dyn RolloutsRepo> = repositories.clone();
    let rollouts_write: Arc<dyn RolloutsWriteRepo> = repositories.clone();

    let cache_config = CacheConfig::from(&settings.cache);
    let memory = Arc::new(MemoryCache::new(&cache_config));

    let store = build_object_store(&settings.edge)?;
    let edge = match store.clone() {
        Some(store) => Some(Arc::new(EdgeCache::new(
            store,
            build_cdn_invalidator(&settings.cdn)?,
            settings.edge.namespace.clone(),
        ))),
        None => None,
    };

    let exporter = Arc::new(ExportService::new(
        toggles_read.clone(),
        store,
        settings.backup.object_path.clone(),
    ));

    let (tasks, receiver) = TaskQueue::bounded(settings.tasks.queue_capacity.get());
    let task_worker = tokio::spawn(TaskWorker::new(edge.clone(), Some(exporter.clone())).run(receiver));

    let resolver = Arc::new(Resolver::new(
        toggles_read.clone(),
        memory,
        edge.clone(),
        tasks,
    ));

    let evaluation = Arc::new(EvaluationService::new(
        resolver.clone(),
        toggles_read.clone(),
        rollouts_read.clone(),
        &cache_config,
    ));

    let admin_toggles = Arc::new(AdminToggleService::new(
        toggles_read.clone(),
        toggles_write,
        resolver.clone(),
    ));
    let admin_rollouts = Arc::new(AdminRolloutService::new(
        toggles_read.clone(),
        rollouts_read,
        rollouts_write,
        resolver.clone(),
    ));

    let cdn = settings
        .edge
        .public_base_url
        .clone()
        .map(|base| CdnOrigin::new(base, settings.edge.namespace.clone()));

    let public_state = PublicState {
        resolver: resolver.clone(),
        evaluation,
        toggles: toggles_read.clone(),
        cache: cache_config,
        cdn,
    };

    let admin_state = AdminState {
        toggles: admin_toggles,
        rollouts: admin_rollouts,
        resolver,
        source: toggles_read,
    };

    Ok(ApplicationContext {
        public_state,
        admin_state,
        edge,
        exporter,
        task_worker,
    })
}

fn spawn_backup_monitor(
    exporter: Arc<ExportService>,
    backup: &config::BackupSettings,
) -> Result<JoinHandle<()>, AppError> {
    let schedule = backup_schedule(&backup.schedule)
        .map_err(|err| AppError::from(InfraError::configuration(err)))?;

    let backup_worker = WorkerBuilder::new("backup-export-worker")
        .data(BackupExportContext { exporter })
        .backend(CronStream::new(schedule))
        .build_fn(process_backup_export_job);

    let monitor = Monitor::new().register(backup_worker);

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    }))
}

async fn serve_http(
    settings: &config::Settings,
    public_state: PublicState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_public_router(public_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "toggleboard::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown));

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(
        target = "toggleboard::serve",
        grace_secs = grace.as_secs(),
        "shutdown requested; draining connections"
    );
}
