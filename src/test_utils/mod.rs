//! Test utilities for snipweave
//!
//! Helpers shared by unit tests and the integration suite:
//!
//! - [`init_test_logging`] - one-time tracing setup writing through the test harness
//! - [`literal`] / [`generated`] - terse snippet constructors
//! - [`MockGenerator`] - a scripted [`Generator`] that records every call
//! - [`orchestrator_with`] - an orchestrator over an in-memory store
//!
//! # Example
//!
//! ```rust,no_run
//! use snipweave::test_utils::{MockGenerator, generated, literal, orchestrator_with};
//!
//! # async fn example() {
//! let generator = MockGenerator::new();
//! let (orchestrator, store) = orchestrator_with(
//!     vec![literal("topic", "rust"), generated("intro", "Write about @topic")],
//!     generator.clone(),
//!     Some("sk-test"),
//! );
//! let report = orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();
//! assert!(report.is_success());
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::{GenerationError, Snippet};
use crate::llm::{Credentials, Generator, require_credential};
use crate::regen::Orchestrator;
use crate::store::MemoryStore;

/// Model used by [`generated`].
pub const TEST_MODEL: &str = "test/model";

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, else `RUST_LOG` when set, else stays silent.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

pub fn literal(name: &str, content: &str) -> Snippet {
    Snippet::literal(name, content)
}

/// A generated snippet using [`TEST_MODEL`].
pub fn generated(name: &str, prompt: &str) -> Snippet {
    Snippet::generated(name, prompt, Some(TEST_MODEL.to_string()))
}

/// One recorded [`Generator::generate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCall {
    pub instruction: String,
    pub model: String,
    pub credential: Option<String>,
}

type Responder = dyn Fn(&str) -> String + Send + Sync;

struct MockState {
    calls: Mutex<Vec<GenerationCall>>,
    failures: Mutex<HashMap<String, GenerationError>>,
    responder: Box<Responder>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Scripted generator for tests.
///
/// By default it answers `<instruction>` and, like a real client, fails with
/// [`GenerationError::MissingCredential`] when no credential is passed. Every
/// call is recorded, including failing ones. Clones share state.
#[derive(Clone)]
pub struct MockGenerator {
    state: Arc<MockState>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::build(Box::new(|instruction| format!("<{instruction}>")))
    }

    /// Answer every call with `responder(instruction)`.
    #[must_use]
    pub fn with_responder(responder: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::build(Box::new(responder))
    }

    /// Sleep for `delay` inside every call.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock().unwrap() = Some(delay);
        self
    }

    fn build(responder: Box<Responder>) -> Self {
        Self {
            state: Arc::new(MockState {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(HashMap::new()),
                responder,
                delay: Mutex::new(None),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Fail every call whose instruction contains `pattern`.
    pub fn fail_when(&self, pattern: &str, error: GenerationError) {
        self.state.failures.lock().unwrap().insert(pattern.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.state.failures.lock().unwrap().clear();
    }

    #[must_use]
    pub fn calls(&self) -> Vec<GenerationCall> {
        self.state.calls.lock().unwrap().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    #[must_use]
    pub fn instructions(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.instruction).collect()
    }

    /// Highest number of calls observed running at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        instruction: &str,
        model: &str,
        credential: Option<&str>,
    ) -> Result<String, GenerationError> {
        self.state.calls.lock().unwrap().push(GenerationCall {
            instruction: instruction.to_string(),
            model: model.to_string(),
            credential: credential.map(str::to_string),
        });

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.state.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        require_credential(credential)?;

        let failure = self
            .state
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| instruction.contains(pattern.as_str()))
            .map(|(_, error)| error.clone());
        if let Some(error) = failure {
            return Err(error);
        }

        Ok((self.state.responder)(instruction))
    }
}

/// An orchestrator over a [`MemoryStore`] seeded with `snippets`.
pub fn orchestrator_with(
    snippets: Vec<Snippet>,
    generator: MockGenerator,
    credential: Option<&str>,
) -> (Orchestrator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_snippets(snippets));
    let credentials = Credentials::new(credential.map(str::to_string));
    let orchestrator = Orchestrator::new(store.clone(), Arc::new(generator), credentials);
    (orchestrator, store)
}
