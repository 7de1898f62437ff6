use crate::domain::{
    BatchAccumulator, DocumentProcessingService, FlushConfig, FlushService, IngestionService,
    PriorityRouter, ReprocessingService, UploadService,
};
use crate::nats::{
    AccumulatingConsumer, IntakeDeliveryProcessor, NatsDeadLetterProducer, NatsIntakePublisher,
    NatsLanePublisher,
};
use common::{
    DeliveryConsumer, DocumentRepository, InterfaceConfigRepository, MappingRuleRepository,
    NatsClient, PayloadStore, QueueTopologyConfig, ResilienceGovernor, StoredPayloadRepository,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub type WorkerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

pub struct InboundWorkerConfig {
    pub topology: QueueTopologyConfig,
    pub intake_consumer_name: String,
    pub lane_consumer_name: String,
    /// Number of parallel consumer tasks per stream; all share one durable
    /// consumer so the server balances deliveries between them.
    pub consumer_concurrency: usize,
    pub fetch_batch_size: usize,
    pub fetch_wait_secs: u64,
    /// Must exceed the worst-case accumulation-plus-processing time, since
    /// lane deliveries stay unacknowledged until the flush resolves them.
    pub ack_wait_secs: u64,
    pub accumulator_capacity: usize,
    pub flush: FlushConfig,
}

/// The inbound processing module: intake gateway consumers, lane consumers
/// feeding the accumulator, and the scheduled flush.
pub struct InboundWorker {
    intake_consumers: Vec<DeliveryConsumer<IntakeDeliveryProcessor>>,
    lane_consumers: Vec<AccumulatingConsumer>,
    flush: FlushService,
    reprocessing: Arc<ReprocessingService>,
    upload: Arc<UploadService>,
}

impl InboundWorker {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        nats_client: Arc<NatsClient>,
        interfaces: Arc<dyn InterfaceConfigRepository>,
        rules: Arc<dyn MappingRuleRepository>,
        documents: Arc<dyn DocumentRepository>,
        payloads: Arc<dyn StoredPayloadRepository>,
        payload_store: Arc<PayloadStore>,
        governor: Arc<ResilienceGovernor>,
        config: InboundWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("initializing inbound worker module");

        let publisher = nats_client.create_publisher_client();
        let topology = config.topology.clone();

        let lanes = Arc::new(NatsLanePublisher::new(publisher.clone(), topology.clone()));
        let dead_letters = Arc::new(NatsDeadLetterProducer::new(
            publisher.clone(),
            topology.clone(),
        ));
        let intake_publisher = Arc::new(NatsIntakePublisher::new(publisher, topology.clone()));

        let ingestion = Arc::new(IngestionService::new(
            Arc::clone(&interfaces),
            PriorityRouter::new(lanes),
            dead_letters.clone(),
            Arc::clone(&governor),
            topology.max_deliveries,
            topology.redelivery_delay,
        ));

        let mut intake_consumers = Vec::with_capacity(config.consumer_concurrency);
        for _ in 0..config.consumer_concurrency.max(1) {
            let consumer = DeliveryConsumer::new(
                nats_client.create_consumer_client(),
                &topology.intake_stream,
                &config.intake_consumer_name,
                &topology.intake_filter(),
                config.fetch_batch_size,
                config.fetch_wait_secs,
                config.ack_wait_secs,
                IntakeDeliveryProcessor::new(Arc::clone(&ingestion)),
            )
            .await?;
            intake_consumers.push(consumer);
        }

        let accumulator = Arc::new(BatchAccumulator::new(config.accumulator_capacity));
        let processing = Arc::new(DocumentProcessingService::new(
            Arc::clone(&interfaces),
            Arc::clone(&rules),
            Arc::clone(&documents),
            Arc::clone(&payloads),
            Arc::clone(&payload_store),
            Arc::clone(&governor),
        ));

        let mut lane_consumers = Vec::with_capacity(config.consumer_concurrency);
        for _ in 0..config.consumer_concurrency.max(1) {
            let consumer = AccumulatingConsumer::new(
                nats_client.create_consumer_client(),
                &topology.lane_stream,
                &config.lane_consumer_name,
                &topology.lane_filter(),
                config.fetch_batch_size,
                config.fetch_wait_secs,
                config.ack_wait_secs,
                Arc::clone(&accumulator),
                dead_letters.clone(),
                topology.redelivery_delay,
            )
            .await?;
            lane_consumers.push(consumer);
        }

        let flush = FlushService::new(
            Arc::clone(&accumulator),
            Arc::clone(&processing),
            dead_letters,
            config.flush,
        );

        let reprocessing = Arc::new(ReprocessingService::new(
            Arc::clone(&payloads),
            Arc::clone(&payload_store),
            processing,
            governor,
        ));
        let upload = Arc::new(UploadService::new(payload_store, intake_publisher));

        info!("inbound worker initialized");

        Ok(Self {
            intake_consumers,
            lane_consumers,
            flush,
            reprocessing,
            upload,
        })
    }

    /// Surface consumed by the reprocessing endpoint.
    pub fn reprocessing_service(&self) -> Arc<ReprocessingService> {
        Arc::clone(&self.reprocessing)
    }

    /// Surface consumed by the upload endpoint and protocol connectors.
    pub fn upload_service(&self) -> Arc<UploadService> {
        Arc::clone(&self.upload)
    }

    pub fn into_runner_processes(self) -> Vec<WorkerProcess> {
        let mut processes: Vec<WorkerProcess> = Vec::new();

        for consumer in self.intake_consumers {
            processes.push(Box::new(move |ctx| {
                Box::pin(async move { consumer.run(ctx).await })
            }));
        }
        for consumer in self.lane_consumers {
            processes.push(Box::new(move |ctx| {
                Box::pin(async move { consumer.run(ctx).await })
            }));
        }

        let flush = self.flush;
        processes.push(Box::new(move |ctx| {
            Box::pin(async move { flush.run(ctx).await })
        }));

        processes
    }
}
