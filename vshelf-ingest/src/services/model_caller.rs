//! Resilient Model Caller
//!
//! Wraps every outbound generation/embedding call in a bounded retry loop.
//! Each attempt picks a credential at random (never the one that just failed,
//! when there is a choice) and a model at random from the list for the
//! requested kind. Failures are classified to pick the backoff; an invalid
//! credential additionally triggers a one-time listing of the models that
//! credential can see.
//!
//! Every attempt lands in a `CallTrace` that travels with the result.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

use super::backend::{BackendError, CallTask, GenerationBackend, GenerationRequest, ResponseKind};
use crate::config::CallerConfig;
use crate::error::IngestError;

/// Classified attempt failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    InvalidCredential,
    ModelNotFound,
    Other,
}

impl FailureKind {
    pub fn classify(error: &BackendError) -> Self {
        match error {
            BackendError::Status { code, message } => {
                let upper = message.to_uppercase();
                if *code == 429
                    || upper.contains("RESOURCE_EXHAUSTED")
                    || upper.contains("QUOTA")
                {
                    FailureKind::RateLimited
                } else if *code == 401
                    || *code == 403
                    || upper.contains("API_KEY_INVALID")
                    || upper.contains("API KEY NOT VALID")
                {
                    FailureKind::InvalidCredential
                } else if *code == 404 || upper.contains("NOT FOUND") || upper.contains("NOT_FOUND")
                {
                    FailureKind::ModelNotFound
                } else {
                    FailureKind::Other
                }
            }
            _ => FailureKind::Other,
        }
    }
}

/// Outcome of one attempt
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { kind: FailureKind, error: String },
}

/// One line of a call trace. Credentials appear by pool index only.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEntry {
    Attempt {
        attempt: u32,
        credential_index: usize,
        model: String,
        outcome: AttemptOutcome,
        elapsed_ms: u64,
    },
    Diagnostic {
        credential_index: usize,
        models: Result<Vec<String>, String>,
    },
}

/// Per-call record of attempts and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct CallTrace {
    pub task: CallTask,
    pub kind: ResponseKind,
    pub entries: Vec<TraceEntry>,
}

impl CallTrace {
    fn new(task: CallTask, kind: ResponseKind) -> Self {
        Self {
            task,
            kind,
            entries: Vec::new(),
        }
    }

    pub fn attempts(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TraceEntry::Attempt { .. }))
            .count()
    }

    /// Failure kinds in attempt order
    pub fn failures(&self) -> Vec<FailureKind> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TraceEntry::Attempt {
                    outcome: AttemptOutcome::Failed { kind, .. },
                    ..
                } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Credential index used by each attempt, in order
    pub fn credentials_used(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TraceEntry::Attempt {
                    credential_index, ..
                } => Some(*credential_index),
                _ => None,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TraceEntry::Diagnostic { .. }))
            .count()
    }
}

/// Successful call payload plus its trace
#[derive(Debug, Clone)]
pub struct Traced<T> {
    pub value: T,
    pub trace: CallTrace,
}

/// Every attempt failed
#[derive(Debug, Clone, Error)]
#[error("model call exhausted after {attempts} attempts: {last_error}")]
pub struct CallExhausted {
    pub attempts: u32,
    pub last_error: String,
    pub last_failure: FailureKind,
    pub trace: CallTrace,
}

/// Pick the credential for the next attempt.
///
/// Uniform over the pool, excluding `previous` when the pool has more than one entry.
pub fn pick_credential<R: Rng + ?Sized>(rng: &mut R, len: usize, previous: Option<usize>) -> usize {
    match previous {
        Some(prev) if len > 1 && prev < len => {
            let idx = rng.gen_range(0..len - 1);
            if idx >= prev {
                idx + 1
            } else {
                idx
            }
        }
        _ => rng.gen_range(0..len.max(1)),
    }
}

/// Resilient caller shared by every pipeline stage
pub struct ModelCaller {
    config: CallerConfig,
    backend: Arc<dyn GenerationBackend>,
    limiter: DefaultDirectRateLimiter,
    diagnosed: Mutex<HashSet<usize>>,
}

impl ModelCaller {
    pub fn new(config: CallerConfig, backend: Arc<dyn GenerationBackend>) -> Result<Self, IngestError> {
        config.validate()?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rps));

        Ok(Self {
            config,
            backend,
            limiter,
            diagnosed: Mutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    /// Text or JSON generation
    pub async fn call(&self, request: GenerationRequest) -> Result<Traced<String>, CallExhausted> {
        let models = &self.config.text_models;
        let task = request.task;
        let kind = request.kind;
        let request = Arc::new(request);

        self.run(task, kind, models, move |backend, credential, model| {
            let request = Arc::clone(&request);
            async move { backend.generate(&credential, &model, &request).await }
        })
        .await
    }

    /// Free-text generation
    pub async fn generate_text(
        &self,
        task: CallTask,
        prompt: impl Into<String>,
    ) -> Result<Traced<String>, CallExhausted> {
        self.call(GenerationRequest::text(task, prompt)).await
    }

    /// JSON-mode generation; the payload still needs parsing
    pub async fn generate_json(
        &self,
        task: CallTask,
        prompt: impl Into<String>,
    ) -> Result<Traced<String>, CallExhausted> {
        self.call(GenerationRequest::json(task, prompt)).await
    }

    /// Embedding with the embedding model list
    pub async fn embed(&self, text: &str) -> Result<Traced<Vec<f32>>, CallExhausted> {
        let models = &self.config.embedding_models;
        let text: Arc<str> = Arc::from(text);

        self.run(
            CallTask::Embedding,
            ResponseKind::Embedding,
            models,
            move |backend, credential, model| {
                let text = Arc::clone(&text);
                async move { backend.embed(&credential, &model, &text).await }
            },
        )
        .await
    }

    async fn run<T, F, Fut>(
        &self,
        task: CallTask,
        kind: ResponseKind,
        models: &[String],
        mut attempt_fn: F,
    ) -> Result<Traced<T>, CallExhausted>
    where
        F: FnMut(Arc<dyn GenerationBackend>, String, String) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut trace = CallTrace::new(task, kind);
        let mut previous: Option<usize> = None;
        let mut last_error = String::from("no attempts made");
        let mut last_failure = FailureKind::Other;
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            let (credential_index, model) = {
                let mut rng = rand::thread_rng();
                let cred = pick_credential(&mut rng, self.config.credentials.len(), previous);
                let model = models[rng.gen_range(0..models.len())].clone();
                (cred, model)
            };
            previous = Some(credential_index);
            let credential = self.config.credentials[credential_index].clone();

            self.limiter.until_ready().await;

            let started = Instant::now();
            let result = attempt_fn(Arc::clone(&self.backend), credential, model.clone()).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let error = match result {
                Ok(value) => {
                    trace.entries.push(TraceEntry::Attempt {
                        attempt,
                        credential_index,
                        model,
                        outcome: AttemptOutcome::Succeeded,
                        elapsed_ms,
                    });
                    if attempt > 1 {
                        tracing::debug!(task = ?task, attempt, "Model call succeeded after retry");
                    }
                    return Ok(Traced { value, trace });
                }
                Err(error) => error,
            };

            let failure = FailureKind::classify(&error);
            tracing::warn!(
                task = ?task,
                attempt,
                max_attempts,
                credential_index,
                model = %model,
                failure = ?failure,
                error = %error,
                "Model call attempt failed"
            );

            trace.entries.push(TraceEntry::Attempt {
                attempt,
                credential_index,
                model,
                outcome: AttemptOutcome::Failed {
                    kind: failure,
                    error: error.to_string(),
                },
                elapsed_ms,
            });
            last_error = error.to_string();
            last_failure = failure;

            if failure == FailureKind::InvalidCredential {
                self.diagnose_credential(credential_index, &mut trace).await;
            }

            if attempt < max_attempts {
                let backoff = match failure {
                    FailureKind::RateLimited => self.config.rate_limit_backoff,
                    FailureKind::InvalidCredential
                    | FailureKind::ModelNotFound
                    | FailureKind::Other => self.config.error_backoff,
                };
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        tracing::error!(
            task = ?task,
            attempts = max_attempts,
            last_failure = ?last_failure,
            "Model call exhausted retry budget"
        );

        Err(CallExhausted {
            attempts: max_attempts,
            last_error,
            last_failure,
            trace,
        })
    }

    /// List the models an invalid credential can see, once per credential
    async fn diagnose_credential(&self, credential_index: usize, trace: &mut CallTrace) {
        {
            let mut diagnosed = self.diagnosed.lock().await;
            if !diagnosed.insert(credential_index) {
                return;
            }
        }

        self.limiter.until_ready().await;
        let credential = &self.config.credentials[credential_index];
        let models = self
            .backend
            .list_models(credential)
            .await
            .map_err(|e| e.to_string());

        match &models {
            Ok(names) => tracing::warn!(
                credential_index,
                available = ?names,
                "Credential rejected; models visible to it listed"
            ),
            Err(e) => tracing::warn!(
                credential_index,
                error = %e,
                "Credential rejected; model listing also failed"
            ),
        }

        trace.entries.push(TraceEntry::Diagnostic {
            credential_index,
            models,
        });
    }
}
