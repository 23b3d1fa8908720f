//! Scripted backend for tests and dry runs.
//!
//! Responses are looked up by [`GradingKey`]; unknown keys receive the
//! default response. The backend also records peak concurrency so callers
//! can check that a batch honoured its worker limit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{GradingRequest, ScoringBackend};
use crate::record::GradingKey;

/// Canned outcome for one key.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(String),
    Fail(String),
}

/// [`ScoringBackend`] that replays scripted responses.
#[derive(Debug)]
pub struct ScriptedBackend {
    model_id: String,
    default: Scripted,
    scripts: HashMap<GradingKey, Scripted>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(model_id: impl Into<String>, default_response: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            default: Scripted::Respond(default_response.into()),
            scripts: HashMap::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response(mut self, key: GradingKey, response: impl Into<String>) -> Self {
        self.scripts.insert(key, Scripted::Respond(response.into()));
        self
    }

    pub fn with_failure(mut self, key: GradingKey, error: impl Into<String>) -> Self {
        self.scripts.insert(key, Scripted::Fail(error.into()));
        self
    }

    /// Simulated generation latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of concurrent `generate` calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringBackend for ScriptedBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GradingRequest) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.scripts.get(&request.key).unwrap_or(&self.default) {
            Scripted::Respond(text) => Ok(text.clone()),
            Scripted::Fail(error) => Err(anyhow::anyhow!("{error}")),
        }
    }
}
