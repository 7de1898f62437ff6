mod config;

use common::telemetry::init_telemetry;
use common::{
    ensure_topology, NatsClient, NatsPayloadObjectStore, PayloadStore, PostgresClient,
    PostgresDocumentRepository, PostgresInterfaceRepository, PostgresMappingRuleRepository,
    PostgresPayloadRepository, ResilienceGovernor,
};
use config::ServiceConfig;
use inbound_worker::InboundWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&config.telemetry()) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(service = %config.service_name, "starting docflow all-in-one service");
    debug!("configuration: {:?}", config);

    if let Err(e) = run(config).await {
        error!(error = %e, "service terminated with error");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    // Postgres
    let postgres = PostgresClient::new(&config.postgres())?;
    postgres.ping().await?;
    info!("connected to PostgreSQL");

    let interfaces = Arc::new(PostgresInterfaceRepository::new(postgres.clone()));
    let rules = Arc::new(PostgresMappingRuleRepository::new(postgres.clone()));
    let documents = Arc::new(PostgresDocumentRepository::new(postgres.clone()));
    let payloads = Arc::new(PostgresPayloadRepository::new(postgres));

    // NATS and the stream cascade
    let nats = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.nats_connect_timeout_secs),
        )
        .await?,
    );
    let topology = config.topology();
    ensure_topology(&nats, &topology).await?;
    info!("queue topology ensured");

    // Payload tier storage
    let object_store = Arc::new(
        NatsPayloadObjectStore::new(nats.jetstream(), &config.payload_object_bucket).await?,
    );
    let payload_store = Arc::new(PayloadStore::new(config.payload_store(), object_store));

    // Resilience policies, built once and passed in explicitly
    let governor = Arc::new(ResilienceGovernor::new(
        config.circuit_breaker(),
        config.retry_policy(),
        Vec::new(),
    ));

    let worker = InboundWorker::new(
        Arc::clone(&nats),
        interfaces,
        rules,
        documents,
        payloads,
        payload_store,
        governor,
        config.worker(),
    )
    .await?;

    // Run all worker processes until a signal or a process failure
    let shutdown = CancellationToken::new();
    let mut processes = JoinSet::new();
    for process in worker.into_runner_processes() {
        processes.spawn(process(shutdown.clone()));
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        Some(result) = processes.join_next() => {
            match result {
                Ok(Ok(())) => info!("worker process exited"),
                Ok(Err(e)) => error!(error = %e, "worker process failed"),
                Err(e) => error!(error = %e, "worker process panicked"),
            }
        }
    }

    shutdown.cancel();
    while let Some(result) = processes.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "worker process failed during shutdown"),
            Err(e) => error!(error = %e, "worker process panicked during shutdown"),
        }
    }

    info!("docflow all-in-one service stopped");
    Ok(())
}
