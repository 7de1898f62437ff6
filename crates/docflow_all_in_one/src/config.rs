use common::telemetry::TelemetryConfig;
use common::{
    CircuitBreakerConfig, PayloadStoreConfig, PostgresConfig, QueueTopologyConfig, RetryPolicy,
};
use config::{Config, ConfigError, Environment};
use inbound_worker::{FlushConfig, InboundWorkerConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default = "default_log_json")]
    pub log_json: bool,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// NATS connection timeout in seconds
    #[serde(default = "default_nats_connect_timeout_secs")]
    pub nats_connect_timeout_secs: u64,

    /// Intake stream name
    #[serde(default = "default_intake_stream")]
    pub intake_stream: String,

    /// Priority lane stream name
    #[serde(default = "default_lane_stream")]
    pub lane_stream: String,

    /// Dead-letter stream name
    #[serde(default = "default_dead_letter_stream")]
    pub dead_letter_stream: String,

    /// Dead-letter retention in hours
    #[serde(default = "default_dead_letter_max_age_hours")]
    pub dead_letter_max_age_hours: u64,

    /// Dead-letter stream message cap
    #[serde(default = "default_dead_letter_max_messages")]
    pub dead_letter_max_messages: i64,

    /// Dead-letter stream byte cap
    #[serde(default = "default_dead_letter_max_bytes")]
    pub dead_letter_max_bytes: i64,

    /// Delay before a negatively acknowledged delivery comes back, seconds
    #[serde(default = "default_redelivery_delay_secs")]
    pub redelivery_delay_secs: u64,

    /// Deliveries beyond this count are treated as terminal
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: i64,

    /// Durable name of the intake consumer
    #[serde(default = "default_intake_consumer_name")]
    pub intake_consumer_name: String,

    /// Durable name of the lane consumer
    #[serde(default = "default_lane_consumer_name")]
    pub lane_consumer_name: String,

    /// Parallel consumer tasks per stream
    #[serde(default = "default_consumer_concurrency")]
    pub consumer_concurrency: usize,

    /// Batch size for consumer fetches
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,

    /// Max wait time for consumer fetches in seconds
    #[serde(default = "default_fetch_wait_secs")]
    pub fetch_wait_secs: u64,

    /// Ack wait before the server redelivers an unacknowledged message
    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,

    // Accumulator and flush configuration
    /// Bounded accumulator capacity
    #[serde(default = "default_accumulator_capacity")]
    pub accumulator_capacity: usize,

    /// Fixed flush period in seconds
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Max envelopes handed to the mapping engine per flush cycle
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,

    // Payload storage configuration
    /// Inline storage threshold in bytes
    #[serde(default = "default_payload_inline_threshold_bytes")]
    pub payload_inline_threshold_bytes: usize,

    /// Gzip inline payloads
    #[serde(default = "default_payload_compress_inline")]
    pub payload_compress_inline: bool,

    /// Payload size ceiling in bytes
    #[serde(default = "default_payload_max_bytes")]
    pub payload_max_bytes: usize,

    /// Object store bucket for external payloads
    #[serde(default = "default_payload_object_bucket")]
    pub payload_object_bucket: String,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Connection pool size
    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,

    // Circuit breaker configuration (shared defaults for all categories)
    /// Failure-rate threshold in percent
    #[serde(default = "default_breaker_failure_rate_threshold")]
    pub breaker_failure_rate_threshold: f64,

    /// Slow-call-rate threshold in percent
    #[serde(default = "default_breaker_slow_call_rate_threshold")]
    pub breaker_slow_call_rate_threshold: f64,

    /// Slow-call duration threshold in seconds
    #[serde(default = "default_breaker_slow_call_secs")]
    pub breaker_slow_call_secs: u64,

    /// Sliding window size in calls
    #[serde(default = "default_breaker_window_size")]
    pub breaker_window_size: usize,

    /// Minimum calls before the window is evaluated
    #[serde(default = "default_breaker_minimum_calls")]
    pub breaker_minimum_calls: usize,

    /// Open-state wait before half-open probing, seconds
    #[serde(default = "default_breaker_open_wait_secs")]
    pub breaker_open_wait_secs: u64,

    /// Probe calls allowed through in half-open state
    #[serde(default = "default_breaker_half_open_probes")]
    pub breaker_half_open_probes: u32,

    // Retry configuration
    /// Initial backoff interval in milliseconds
    #[serde(default = "default_retry_initial_interval_ms")]
    pub retry_initial_interval_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Backoff ceiling in seconds
    #[serde(default = "default_retry_max_interval_secs")]
    pub retry_max_interval_secs: u64,

    /// Attempt budget for transient failures
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_connect_timeout_secs() -> u64 {
    10
}

fn default_intake_stream() -> String {
    "INBOUND_INTAKE".to_string()
}

fn default_lane_stream() -> String {
    "INBOUND_LANES".to_string()
}

fn default_dead_letter_stream() -> String {
    "INBOUND_DLQ".to_string()
}

fn default_dead_letter_max_age_hours() -> u64 {
    24
}

fn default_dead_letter_max_messages() -> i64 {
    100_000
}

fn default_dead_letter_max_bytes() -> i64 {
    1024 * 1024 * 1024
}

fn default_redelivery_delay_secs() -> u64 {
    30
}

fn default_max_deliveries() -> i64 {
    5
}

fn default_intake_consumer_name() -> String {
    "docflow-intake".to_string()
}

fn default_lane_consumer_name() -> String {
    "docflow-lanes".to_string()
}

fn default_consumer_concurrency() -> usize {
    4
}

fn default_fetch_batch_size() -> usize {
    30
}

fn default_fetch_wait_secs() -> u64 {
    5
}

fn default_ack_wait_secs() -> u64 {
    300
}

// Accumulator defaults
fn default_accumulator_capacity() -> usize {
    1000
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_flush_batch_size() -> usize {
    100
}

// Payload storage defaults
fn default_payload_inline_threshold_bytes() -> usize {
    1024 * 1024
}

fn default_payload_compress_inline() -> bool {
    true
}

fn default_payload_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_payload_object_bucket() -> String {
    "docflow-payloads".to_string()
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "docflow".to_string()
}

fn default_postgres_username() -> String {
    "docflow".to_string()
}

fn default_postgres_password() -> String {
    "docflow".to_string()
}

fn default_postgres_pool_size() -> usize {
    16
}

// Circuit breaker defaults
fn default_breaker_failure_rate_threshold() -> f64 {
    50.0
}

fn default_breaker_slow_call_rate_threshold() -> f64 {
    100.0
}

fn default_breaker_slow_call_secs() -> u64 {
    5
}

fn default_breaker_window_size() -> usize {
    20
}

fn default_breaker_minimum_calls() -> usize {
    10
}

fn default_breaker_open_wait_secs() -> u64 {
    30
}

fn default_breaker_half_open_probes() -> u32 {
    3
}

// Retry defaults
fn default_retry_initial_interval_ms() -> u64 {
    500
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_max_interval_secs() -> u64 {
    30
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_service_name() -> String {
    "docflow-all-in-one".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("DOCFLOW"))
            .build()?
            .try_deserialize()
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.service_name.clone(),
            log_level: self.log_level.clone(),
            json_output: self.log_json,
        }
    }

    pub fn topology(&self) -> QueueTopologyConfig {
        QueueTopologyConfig {
            intake_stream: self.intake_stream.clone(),
            lane_stream: self.lane_stream.clone(),
            dead_letter_stream: self.dead_letter_stream.clone(),
            dead_letter_max_age: Duration::from_secs(self.dead_letter_max_age_hours * 60 * 60),
            dead_letter_max_messages: self.dead_letter_max_messages,
            dead_letter_max_bytes: self.dead_letter_max_bytes,
            redelivery_delay: Duration::from_secs(self.redelivery_delay_secs),
            max_deliveries: self.max_deliveries,
        }
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_pool_size,
        }
    }

    pub fn payload_store(&self) -> PayloadStoreConfig {
        PayloadStoreConfig {
            inline_threshold_bytes: self.payload_inline_threshold_bytes,
            compress_inline: self.payload_compress_inline,
            max_payload_bytes: self.payload_max_bytes,
            allowed_extensions: vec!["xml".to_string()],
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: self.breaker_failure_rate_threshold,
            slow_call_rate_threshold: self.breaker_slow_call_rate_threshold,
            slow_call_duration: Duration::from_secs(self.breaker_slow_call_secs),
            sliding_window_size: self.breaker_window_size,
            minimum_calls: self.breaker_minimum_calls,
            open_wait: Duration::from_secs(self.breaker_open_wait_secs),
            half_open_probes: self.breaker_half_open_probes,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(self.retry_initial_interval_ms),
            multiplier: self.retry_multiplier,
            max_interval: Duration::from_secs(self.retry_max_interval_secs),
            max_attempts: self.retry_max_attempts,
        }
    }

    pub fn worker(&self) -> InboundWorkerConfig {
        InboundWorkerConfig {
            topology: self.topology(),
            intake_consumer_name: self.intake_consumer_name.clone(),
            lane_consumer_name: self.lane_consumer_name.clone(),
            consumer_concurrency: self.consumer_concurrency,
            fetch_batch_size: self.fetch_batch_size,
            fetch_wait_secs: self.fetch_wait_secs,
            ack_wait_secs: self.ack_wait_secs,
            accumulator_capacity: self.accumulator_capacity,
            flush: FlushConfig {
                flush_interval: Duration::from_secs(self.flush_interval_secs),
                batch_size: self.flush_batch_size,
                redelivery_delay: Duration::from_secs(self.redelivery_delay_secs),
            },
        }
    }
}
