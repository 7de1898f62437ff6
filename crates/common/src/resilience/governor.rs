use crate::domain::{PipelineError, PipelineResult};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy};
use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;
use tracing::warn;

/// Resilience categories. Breaker state is process-wide per category, not
/// per tenant: one tenant's failures can trip the breaker for all tenants
/// sharing the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResilienceCategory {
    Repository,
    FileProcessing,
    XmlProcessing,
    Validation,
}

impl ResilienceCategory {
    pub const ALL: [ResilienceCategory; 4] = [
        ResilienceCategory::Repository,
        ResilienceCategory::FileProcessing,
        ResilienceCategory::XmlProcessing,
        ResilienceCategory::Validation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResilienceCategory::Repository => "repository",
            ResilienceCategory::FileProcessing => "file-processing",
            ResilienceCategory::XmlProcessing => "xml-processing",
            ResilienceCategory::Validation => "validation",
        }
    }
}

struct CategoryPolicy {
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

/// Wraps I/O-bound pipeline steps with a per-category circuit breaker and a
/// composable retry layer, exposing a uniform execute-with-fallback call.
///
/// Policies are built once at startup and passed in explicitly. Validation
/// errors pass through without counting as breaker failures; open circuits
/// short-circuit to the fallback without consuming retry attempts.
pub struct ResilienceGovernor {
    categories: HashMap<ResilienceCategory, CategoryPolicy>,
}

impl ResilienceGovernor {
    /// Build a governor with per-category policies. Categories missing from
    /// `policies` get the provided defaults.
    pub fn new(
        default_breaker: CircuitBreakerConfig,
        default_retry: RetryPolicy,
        overrides: Vec<(ResilienceCategory, CircuitBreakerConfig, RetryPolicy)>,
    ) -> Self {
        let mut categories = HashMap::new();
        for category in ResilienceCategory::ALL {
            categories.insert(
                category,
                CategoryPolicy {
                    breaker: CircuitBreaker::new(category.as_str(), default_breaker.clone()),
                    retry: default_retry.clone(),
                },
            );
        }
        for (category, breaker_config, retry) in overrides {
            categories.insert(
                category,
                CategoryPolicy {
                    breaker: CircuitBreaker::new(category.as_str(), breaker_config),
                    retry,
                },
            );
        }
        Self { categories }
    }

    /// Run `operation` under the category's breaker and retry policy. If the
    /// circuit is open the operation is never invoked and `fallback`
    /// receives the CircuitOpen error. Call duration is measured across the
    /// governed call, retries included, for slow-call accounting.
    pub async fn execute<T, F, Fut, Fb, FbFut>(
        &self,
        category: ResilienceCategory,
        operation: F,
        fallback: Fb,
    ) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
        Fb: FnOnce(PipelineError) -> FbFut,
        FbFut: Future<Output = PipelineResult<T>>,
    {
        let policy = self
            .categories
            .get(&category)
            .expect("all categories are populated at construction");

        if policy.breaker.try_acquire().await.is_err() {
            warn!(category = category.as_str(), "circuit open, falling back");
            return fallback(PipelineError::CircuitOpen(category.as_str().to_string())).await;
        }

        let started = Instant::now();
        match policy.retry.execute(operation).await {
            Ok(value) => {
                policy.breaker.record_success(started.elapsed()).await;
                Ok(value)
            }
            Err(error) => {
                if error.is_validation() {
                    // Bad input is not a sign of an unhealthy dependency.
                    policy.breaker.record_success(started.elapsed()).await;
                } else {
                    policy.breaker.record_failure().await;
                }
                Err(error)
            }
        }
    }

    /// Operator-facing reset of one category's breaker.
    pub async fn reset(&self, category: ResilienceCategory) {
        if let Some(policy) = self.categories.get(&category) {
            policy.breaker.reset().await;
        }
    }

    pub async fn state(&self, category: ResilienceCategory) -> CircuitState {
        self.categories
            .get(&category)
            .expect("all categories are populated at construction")
            .breaker
            .state()
            .await
    }
}
