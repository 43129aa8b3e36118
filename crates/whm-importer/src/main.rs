//! WHMOVEMENT importer - Main entry point

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use whm_common::logging::{init_logging, LogConfig, LogConfigBuilder, LogLevel};
use whm_common::RetryPolicy;

use whm_importer::catalog::WarehouseCatalog;
use whm_importer::keys::join_prefix;
use whm_importer::pipeline::{
    BlockStore, GroupConfig, Importer, ImporterParts, ImporterSettings, ScheduleMode, Scheduler,
    SchedulerSettings,
};
use whm_importer::publish::SqsPublisher;
use whm_importer::source::{ObjectArchiver, ObjectLoader, XmlLister};
use whm_importer::storage::{ObjectInfo, ObjectStore, S3Storage};
use whm_importer::store::CatalogStore;
use whm_importer::whmovement::{
    WhMovementDecoder, WhMovementMapping, WhMovementSyncDel, APP_NAME, ASSET_ID, BO_TYPE,
};
use whm_importer::{ImporterConfig, KeyGrammar};

/// Imports WHMOVEMENT documents from S3 into the table catalog
#[derive(Parser, Debug)]
#[command(name = "whmovement-importer", version, about)]
struct Cli {
    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Re-import the valid archive instead of the landing zone (overrides REINIT)
    #[arg(long)]
    reinit: bool,

    /// Drop and recreate the tables before the first sweep
    #[arg(long)]
    reset_tables: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment first, then the command line on top
    let mut log_config = LogConfigBuilder::from_config(LogConfig::from_env()?);
    if cli.verbose {
        log_config = log_config.level(LogLevel::Debug);
    }
    let _guard = init_logging(&log_config.build())?;

    let mut config = match ImporterConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(kind = %err.kind(), error = %err, "config error");
            return Err(err.into());
        },
    };
    if cli.reinit {
        config.reinit = true;
    }
    info!(
        soc_cod = %config.soc_cod,
        bucket = %config.s3_bucket_name,
        namespace = %config.database_name,
        reinit = config.reinit,
        "Starting {APP_NAME}"
    );

    let sdk = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .load()
        .await;
    let s3 = config.storage().s3_client(&sdk);
    let sqs = aws_sdk_sqs::Client::new(&sdk);

    let objects: Arc<dyn ObjectStore> = Arc::new(S3Storage::new(s3, &config.s3_bucket_name));
    let catalog = WarehouseCatalog::connect(&config.catalog())
        .await
        .context("failed to connect to the Iceberg catalog")?;
    let store = Arc::new(CatalogStore::<WhMovementSyncDel>::new(
        Arc::new(catalog),
        &config.database_name,
        Arc::new(WhMovementMapping),
    ));

    if cli.reset_tables {
        BlockStore::<WhMovementSyncDel, ObjectInfo>::setup(store.as_ref(), true)
            .await
            .context("failed to reset tables")?;
    }

    let archiver = ObjectArchiver::new(
        objects.clone(),
        join_prefix(&config.s3_archive_folder, &config.soc_cod, BO_TYPE),
        join_prefix(&config.s3_archive_invalid_folder, &config.soc_cod, BO_TYPE),
    )
    .with_concurrency(config.archive_concurrency);

    let parts = ImporterParts {
        lister: Arc::new(XmlLister::new(objects.clone())),
        loader: Arc::new(ObjectLoader::new(objects.clone())),
        decoder: Arc::new(WhMovementDecoder::new()),
        store,
        publisher: Arc::new(SqsPublisher::new(sqs, &config.sqs_queue, ASSET_ID)),
        archiver: Arc::new(archiver),
    };
    let settings = ImporterSettings {
        prefix: join_prefix(config.sweep_root(), &config.soc_cod, BO_TYPE),
        grammar: KeyGrammar::for_reinit(config.reinit),
        group: GroupConfig {
            batch_size: config.batch_size,
            batch_weight_bytes: config.batch_weight_bytes,
            ..GroupConfig::default()
        },
        retry: RetryPolicy::default(),
        load_concurrency: config.load_concurrency,
    };
    let importer = Arc::new(Importer::new(parts, settings));

    let mut scheduler = Scheduler::new(
        importer,
        SchedulerSettings {
            mode: if config.reinit {
                ScheduleMode::Reinit
            } else {
                ScheduleMode::Live
            },
            interval: config.interval,
            reinit_delay: config.reinit_delay,
        },
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    if cli.once {
        let report = scheduler.run_single(&cancel).await?;
        info!(?report, "Single sweep finished");
    } else {
        scheduler.run(&cancel).await?;
    }

    info!("Importer stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing the current block");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing the current block");
        },
    }

    cancel.cancel();
}
