//! Startup barrier for the external model service.
//!
//! The model service usually starts alongside this process and may need
//! minutes to pull its model. [`ReadinessGate::ensure_model_ready`] polls the
//! service's model listing at a fixed interval until the required model
//! shows up, giving up after a fixed number of attempts. A service that is
//! down and a service that is up without the model are retried the same way.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{DocentError, Result};

/// Lists the models the external service can serve.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// True when a listed model name refers to `wanted`.
///
/// `llama3` matches both `llama3` and the service's default tag `llama3:latest`.
pub fn model_matches(listed: &str, wanted: &str) -> bool {
    if listed == wanted {
        return true;
    }
    !wanted.contains(':')
        && listed
            .strip_prefix(wanted)
            .is_some_and(|rest| rest == ":latest")
}

#[derive(Debug, Clone)]
pub struct ReadinessGate {
    model: String,
    max_attempts: u32,
    interval: Duration,
}

impl ReadinessGate {
    pub fn new(model: impl Into<String>, max_attempts: u32, interval: Duration) -> Self {
        Self {
            model: model.into(),
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.model.name.clone(),
            config.readiness.max_attempts,
            config.readiness.interval(),
        )
    }

    /// Upper bound on the time spent waiting between attempts.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }

    /// Poll until the model is listed. Returns the number of attempts used.
    ///
    /// Fails with `ServiceUnavailable` once every attempt has been spent.
    pub async fn ensure_model_ready(&self, catalog: &dyn ModelCatalog) -> Result<u32> {
        for attempt in 1..=self.max_attempts {
            match catalog.list_models().await {
                Ok(models) if models.iter().any(|m| model_matches(m, &self.model)) => {
                    info!(model = %self.model, attempt, "model is available and ready");
                    return Ok(attempt);
                }
                Ok(_) => {
                    info!(
                        model = %self.model,
                        attempt,
                        max_attempts = self.max_attempts,
                        "model not found yet, waiting"
                    );
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "model service not ready yet"
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(DocentError::ServiceUnavailable {
            model: self.model.clone(),
            attempts: self.max_attempts,
        })
    }
}
