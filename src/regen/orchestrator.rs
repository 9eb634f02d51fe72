//! Wave-ordered regeneration of generated snippets.
//!
//! A batch regenerates a set of generated snippets so that every member sees
//! the freshly regenerated content of everything it depends on:
//!
//! 1. Reject the batch before any generation call if a target is on (or
//!    behind) a cycle. Each target records the cycle message.
//! 2. Split the targets into waves. Literal snippets take part in the wave
//!    plan so a literal between two generated snippets still orders them.
//! 3. Run each wave concurrently and wait for every member to settle before
//!    starting the next wave. Each member re-reads the store right before it
//!    resolves its prompt.
//!
//! A failed member never aborts its siblings, but everything downstream of it
//! is skipped and stays dirty. Failures caused by a missing credential are
//! remembered and retried once as soon as a credential is published.

use dashmap::{DashMap, DashSet};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::status::{BatchReport, RegenerationEvent, RegenerationStatus};
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::core::{GenerationError, Snippet, SnippetError, SnippetPatch, validate_name};
use crate::graph::builder::live_snippets;
use crate::graph::{
    DependencyGraph, build_reverse_graph, find_transitive_dependencies,
    find_transitive_dependents, group_snippets_into_waves, topological_sort_for_execution,
    validate_from_snippet,
};
use crate::llm::{Credentials, Generator};
use crate::references::list_non_existent_references;
use crate::store::SnippetStore;
use crate::templating::{TemplateEvaluator, resolve};

/// Tuning for an [`Orchestrator`].
#[derive(Debug, Clone, Default)]
pub struct RegenerationOptions {
    /// Cap on concurrent generations within one wave. `None` runs the whole wave at once.
    pub max_parallel: Option<usize>,
    /// Evaluator used to resolve prompts, with any registered async functions.
    pub evaluator: TemplateEvaluator,
}

/// A scheduled batch.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: Uuid,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    #[must_use]
    pub const fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Wait for every wave of the batch to settle.
    pub async fn wait(self) -> Result<BatchReport, SnippetError> {
        let batch_id = self.batch_id;
        self.task.await.map_err(|e| SnippetError::Other {
            message: format!("Regeneration batch {batch_id} did not complete: {e}"),
        })
    }
}

/// Result of a create, update or delete.
#[derive(Debug)]
pub struct LifecycleOutcome {
    /// The stored (or removed) snippet.
    pub snippet: Snippet,
    /// Regeneration scheduled as a consequence, if any.
    pub batch: Option<BatchHandle>,
    /// Names referenced by the snippet that match no snippet.
    pub missing_references: Vec<String>,
}

enum MemberOutcome {
    Succeeded,
    Failed {
        message: String,
        missing_credential: bool,
    },
    Skipped {
        reason: String,
    },
}

struct Inner {
    store: Arc<dyn SnippetStore>,
    generator: Arc<dyn Generator>,
    credentials: Credentials,
    evaluator: TemplateEvaluator,
    max_parallel: Option<usize>,
    statuses: DashMap<String, RegenerationStatus>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    awaiting_credential: DashSet<String>,
    events: broadcast::Sender<RegenerationEvent>,
}

/// Owns snippet lifecycle operations and regeneration scheduling.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("max_parallel", &self.inner.max_parallel)
            .field("statuses", &self.inner.statuses.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SnippetStore>,
        generator: Arc<dyn Generator>,
        credentials: Credentials,
    ) -> Self {
        Self::with_options(store, generator, credentials, RegenerationOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn SnippetStore>,
        generator: Arc<dyn Generator>,
        credentials: Credentials,
        options: RegenerationOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                generator,
                credentials,
                evaluator: options.evaluator,
                max_parallel: options.max_parallel,
                statuses: DashMap::new(),
                locks: DashMap::new(),
                awaiting_credential: DashSet::new(),
                events,
            }),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegenerationEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SnippetStore> {
        &self.inner.store
    }

    /// Current regeneration status of `name`; `Idle` when never scheduled.
    #[must_use]
    pub fn status(&self, name: &str) -> RegenerationStatus {
        self.inner.statuses.get(name).map(|status| status.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn statuses(&self) -> BTreeMap<String, RegenerationStatus> {
        self.inner
            .statuses
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Snippets whose last regeneration failed for lack of a credential.
    #[must_use]
    pub fn awaiting_credential(&self) -> BTreeSet<String> {
        self.inner.awaiting_credential.iter().map(|name| name.key().clone()).collect()
    }

    /// Resolve `text` against the current store contents.
    pub async fn resolve(&self, text: &str) -> Result<String, SnippetError> {
        let snapshot = self.inner.store.load_all().await?;
        resolve(text, &snapshot, &self.inner.evaluator).await
    }

    /// Store a new snippet; a generated one is scheduled right away.
    pub async fn create_snippet(&self, snippet: Snippet) -> Result<LifecycleOutcome, SnippetError> {
        validate_name(&snippet.name)?;
        let snapshot = self.inner.store.load_all().await?;
        if snapshot.iter().any(|existing| existing.name == snippet.name) {
            return Err(SnippetError::DuplicateName {
                name: snippet.name,
            });
        }

        let mut snippet = snippet;
        if snippet.is_generated {
            snippet.is_dirty = true;
            snippet.generation_error = None;
        }
        let saved = self.inner.store.save(&snippet).await?;
        tracing::info!("Created snippet '@{}'", saved.name);

        let missing_references = report_missing_references(&saved, &snapshot);
        let batch = saved.is_generated.then(|| self.schedule([saved.name.clone()]));

        Ok(LifecycleOutcome {
            snippet: saved,
            batch,
            missing_references,
        })
    }

    /// Replace a stored snippet and regenerate whatever it invalidates.
    ///
    /// Marked dirty and scheduled as one batch:
    /// - generated transitive dependents of the new name
    /// - generated transitive dependents of the old name, when renamed
    /// - the snippet itself, when it is generated and its prompt or model
    ///   changed or it just became generated
    pub async fn update_snippet(&self, snippet: Snippet) -> Result<LifecycleOutcome, SnippetError> {
        validate_name(&snippet.name)?;
        let before = self.inner.store.load_all().await?;
        let previous = before.iter().find(|s| s.id == snippet.id).cloned().ok_or(
            SnippetError::UnknownSnippet {
                id: snippet.id,
            },
        )?;
        if before.iter().any(|s| s.name == snippet.name && s.id != snippet.id) {
            return Err(SnippetError::DuplicateName {
                name: snippet.name,
            });
        }

        let mut updated = snippet;
        updated.created_at = previous.created_at;
        let regenerate_self = updated.is_generated
            && (!previous.is_generated
                || updated.prompt != previous.prompt
                || updated.model != previous.model);
        if regenerate_self {
            updated.is_dirty = true;
        }

        let after: Vec<Snippet> = before
            .iter()
            .map(|s| if s.id == updated.id { updated.clone() } else { s.clone() })
            .collect();

        let mut dirty = generated_dependents(&updated.name, &after);
        if previous.name != updated.name {
            let generated_after: HashSet<&str> =
                after.iter().filter(|s| s.is_generated).map(|s| s.name.as_str()).collect();
            dirty.extend(
                find_transitive_dependents(&previous.name, &build_reverse_graph(&before))
                    .into_iter()
                    .filter(|name| generated_after.contains(name.as_str())),
            );
            tracing::info!("Renamed snippet '@{}' to '@{}'", previous.name, updated.name);
        }
        dirty.remove(&updated.name);

        let saved = self.inner.store.save(&updated).await?;
        self.mark_dirty(&dirty, &after).await?;
        if regenerate_self {
            dirty.insert(saved.name.clone());
        }

        let others: Vec<Snippet> = after.into_iter().filter(|s| s.id != saved.id).collect();
        let missing_references = report_missing_references(&saved, &others);
        let batch = (!dirty.is_empty()).then(|| self.schedule(dirty));

        Ok(LifecycleOutcome {
            snippet: saved,
            batch,
            missing_references,
        })
    }

    /// Remove a snippet and regenerate its generated transitive dependents.
    ///
    /// Those dependents now hold a dangling reference, so their regeneration
    /// records a not-found error.
    pub async fn delete_snippet(&self, id: Uuid) -> Result<LifecycleOutcome, SnippetError> {
        let before = self.inner.store.load_all().await?;
        let target = before.iter().find(|s| s.id == id).ok_or(SnippetError::UnknownSnippet {
            id,
        })?;
        let mut dirty = generated_dependents(&target.name, &before);
        dirty.remove(&target.name);

        let removed = self.inner.store.delete(id).await?;
        self.inner.statuses.remove(&removed.name);
        self.inner.awaiting_credential.remove(&removed.name);
        self.inner.locks.remove(&removed.name);
        tracing::info!("Deleted snippet '@{}'", removed.name);

        self.mark_dirty(&dirty, &before).await?;
        let batch = (!dirty.is_empty()).then(|| self.schedule(dirty));

        Ok(LifecycleOutcome {
            snippet: removed,
            batch,
            missing_references: Vec::new(),
        })
    }

    /// Mark the named generated snippets dirty and schedule them as one batch.
    ///
    /// Every name must exist and be generated; nothing is marked otherwise.
    pub async fn regenerate(&self, names: &[String]) -> Result<BatchHandle, SnippetError> {
        let snapshot = self.inner.store.load_all().await?;
        let mut targets = BTreeSet::new();
        for name in names {
            let snippet = snapshot.iter().find(|s| &s.name == name).ok_or_else(|| {
                SnippetError::NotFound {
                    name: name.clone(),
                }
            })?;
            if !snippet.is_generated {
                return Err(SnippetError::Other {
                    message: format!("Snippet '@{name}' is not generated"),
                });
            }
            targets.insert(name.clone());
        }

        self.mark_dirty(&targets, &snapshot).await?;
        Ok(self.schedule(targets))
    }

    /// Schedule every generated snippet left dirty, e.g. by an interrupted session.
    pub async fn resume_dirty(&self) -> Result<Option<BatchHandle>, SnippetError> {
        let snapshot = self.inner.store.load_all().await?;
        let dirty: BTreeSet<String> = live_snippets(&snapshot)
            .into_iter()
            .filter(|s| s.is_generated && s.is_dirty)
            .map(|s| s.name.clone())
            .collect();

        if dirty.is_empty() {
            return Ok(None);
        }
        tracing::info!("Resuming regeneration of {} dirty snippet(s)", dirty.len());
        Ok(Some(self.schedule(dirty)))
    }

    /// Schedule the snippets whose last persisted failure was a missing credential.
    ///
    /// Dirty generated dependents blocked behind them join the same batch, as do
    /// names this process is still holding for a credential. Used when a
    /// credential arrives after the process that recorded the failures exited.
    pub async fn retry_missing_credential(&self) -> Result<Option<BatchHandle>, SnippetError> {
        let snapshot = self.inner.store.load_all().await?;
        let missing = SnippetError::from(GenerationError::MissingCredential).to_string();
        let dirty: HashSet<&str> = live_snippets(&snapshot)
            .into_iter()
            .filter(|s| s.is_generated && s.is_dirty)
            .map(|s| s.name.as_str())
            .collect();

        let roots: BTreeSet<String> = live_snippets(&snapshot)
            .into_iter()
            .filter(|s| dirty.contains(s.name.as_str()))
            .filter(|s| s.generation_error.as_deref() == Some(missing.as_str()))
            .map(|s| s.name.clone())
            .collect();
        let mut targets = roots.clone();
        for root in &roots {
            targets.extend(
                generated_dependents(root, &snapshot)
                    .into_iter()
                    .filter(|name| dirty.contains(name.as_str())),
            );
        }
        let awaiting: Vec<String> =
            self.inner.awaiting_credential.iter().map(|name| name.key().clone()).collect();
        for name in awaiting {
            self.inner.awaiting_credential.remove(&name);
            targets.insert(name);
        }

        if targets.is_empty() {
            return Ok(None);
        }
        tracing::info!("Credential available, retrying {} snippet(s)", targets.len());
        Ok(Some(self.schedule(targets)))
    }

    /// Run a regeneration batch for `names` in the background.
    pub fn schedule<I, S>(&self, names: I) -> BatchHandle
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let batch_id = Uuid::new_v4();
        let this = self.clone();
        let task = tokio::spawn(async move { this.run_batch(batch_id, targets).await });
        BatchHandle {
            batch_id,
            task,
        }
    }

    /// Retry missing-credential failures once whenever a credential is published.
    ///
    /// The returned task runs until aborted.
    pub fn watch_credentials(&self) -> JoinHandle<()> {
        let this = self.clone();
        let mut receiver = self.inner.credentials.subscribe();

        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let has_credential = receiver.borrow_and_update().is_some();
                if !has_credential {
                    continue;
                }

                let names: Vec<String> =
                    this.inner.awaiting_credential.iter().map(|name| name.key().clone()).collect();
                for name in &names {
                    this.inner.awaiting_credential.remove(name);
                }
                if names.is_empty() {
                    continue;
                }

                tracing::info!("Credential available, retrying {} snippet(s)", names.len());
                this.schedule(names);
            }
        })
    }

    /// Run one batch to completion.
    pub async fn run_batch(&self, batch_id: Uuid, targets: BTreeSet<String>) -> BatchReport {
        let mut report = BatchReport::new(batch_id);
        tracing::info!("Starting regeneration batch {batch_id} for {} snippet(s)", targets.len());
        self.emit(RegenerationEvent::BatchStarted {
            batch_id,
            targets: targets.iter().cloned().collect(),
        });

        let snapshot = match self.inner.store.load_all().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                let message = error.to_string();
                for name in targets {
                    self.set_status(&name, RegenerationStatus::Error(message.clone()));
                    report.failed.insert(name, message.clone());
                }
                return self.finish(report);
            }
        };

        let generated: HashMap<&str, &Snippet> = live_snippets(&snapshot)
            .into_iter()
            .filter(|s| s.is_generated)
            .map(|s| (s.name.as_str(), s))
            .collect();
        let mut runnable = BTreeSet::new();
        for name in targets {
            if generated.contains_key(name.as_str()) {
                runnable.insert(name);
            } else {
                report.skipped.insert(name, "Not a generated snippet".to_string());
            }
        }

        let sort = topological_sort_for_execution(&snapshot);
        // Any cycle in the snapshot blocks prompt resolution.
        if let Some(seed) = sort.cyclic.iter().next().filter(|_| !runnable.is_empty()) {
            let message = match validate_from_snippet(seed, &snapshot) {
                Err(error) => error.to_string(),
                Ok(()) => format!("Snippet '@{seed}' depends on a cycle"),
            };
            tracing::warn!("Aborting regeneration batch {batch_id}: {message}");

            for name in runnable {
                if let Some(snippet) = generated.get(name.as_str()) {
                    self.persist_failure(snippet, &message).await;
                }
                self.set_status(&name, RegenerationStatus::Error(message.clone()));
                report.failed.insert(name, message.clone());
            }
            return self.finish(report);
        }

        let plan: Vec<Snippet> = live_snippets(&snapshot)
            .into_iter()
            .filter(|s| !s.is_generated || runnable.contains(&s.name))
            .cloned()
            .collect();
        let waves = group_snippets_into_waves(&plan);
        let graph = DependencyGraph::build(&snapshot);

        // Failed (or blocked) names, flagged when the root cause is a missing credential.
        let mut failed: BTreeMap<String, bool> = BTreeMap::new();

        for (index, wave) in waves.into_iter().enumerate() {
            let members: Vec<String> =
                wave.into_iter().filter(|name| runnable.contains(name)).collect();
            if members.is_empty() {
                continue;
            }
            tracing::debug!("Batch {batch_id}: wave {index} with {} snippet(s)", members.len());
            self.emit(RegenerationEvent::WaveStarted {
                batch_id,
                index,
                names: members.clone(),
            });

            let mut ready = Vec::with_capacity(members.len());
            for name in members {
                let blocked_by = find_transitive_dependencies(&name, graph.forward())
                    .into_iter()
                    .filter(|dependency| failed.contains_key(dependency))
                    .min();
                let Some(dependency) = blocked_by else {
                    ready.push(name);
                    continue;
                };

                let missing_credential = failed.get(&dependency).copied().unwrap_or(false);
                let reason = format!("Dependency '@{dependency}' failed to regenerate");
                if let Some(snippet) = generated.get(name.as_str()) {
                    self.persist_failure(snippet, &reason).await;
                }
                if missing_credential {
                    self.inner.awaiting_credential.insert(name.clone());
                }
                self.set_status(&name, RegenerationStatus::Error(reason.clone()));
                failed.insert(name.clone(), missing_credential);
                report.skipped.insert(name, reason);
            }

            let cap = self.inner.max_parallel.unwrap_or(ready.len()).max(1);
            let outcomes: Vec<(String, MemberOutcome)> = stream::iter(ready)
                .map(|name| async move {
                    let outcome = self.regenerate_member(&name).await;
                    (name, outcome)
                })
                .buffer_unordered(cap)
                .collect()
                .await;

            for (name, outcome) in outcomes {
                match outcome {
                    MemberOutcome::Succeeded => {
                        report.succeeded.insert(name);
                    }
                    MemberOutcome::Failed {
                        message,
                        missing_credential,
                    } => {
                        failed.insert(name.clone(), missing_credential);
                        report.failed.insert(name, message);
                    }
                    MemberOutcome::Skipped {
                        reason,
                    } => {
                        report.skipped.insert(name, reason);
                    }
                }
            }
        }

        self.finish(report)
    }

    async fn regenerate_member(&self, name: &str) -> MemberOutcome {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        self.set_status(name, RegenerationStatus::InProgress);

        let snapshot = match self.inner.store.load_all().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                let message = error.to_string();
                self.set_status(name, RegenerationStatus::Error(message.clone()));
                return MemberOutcome::Failed {
                    message,
                    missing_credential: false,
                };
            }
        };
        let Some(snippet) = snapshot.iter().find(|s| s.name == name && s.is_generated).cloned()
        else {
            self.set_status(name, RegenerationStatus::Idle);
            return MemberOutcome::Skipped {
                reason: "No longer a generated snippet".to_string(),
            };
        };

        let result = match self.generate_content(&snippet, &snapshot).await {
            Ok(content) => self
                .inner
                .store
                .update_property(snippet.id, &SnippetPatch::regenerated(content))
                .await
                .map_err(SnippetError::from),
            Err(error) => Err(error),
        };

        match result {
            Ok(_) => {
                tracing::info!("Regenerated '@{name}'");
                self.inner.awaiting_credential.remove(name);
                self.set_status(name, RegenerationStatus::Success);
                MemberOutcome::Succeeded
            }
            Err(error) => {
                let missing_credential = error.is_missing_credential();
                let message = error.to_string();
                tracing::warn!("Regeneration of '@{name}' failed: {message}");

                self.persist_failure(&snippet, &message).await;
                if missing_credential {
                    self.inner.awaiting_credential.insert(name.to_string());
                }
                self.set_status(name, RegenerationStatus::Error(message.clone()));
                MemberOutcome::Failed {
                    message,
                    missing_credential,
                }
            }
        }
    }

    /// Resolve the prompt against `snapshot` and run it through the generator.
    async fn generate_content(
        &self,
        snippet: &Snippet,
        snapshot: &[Snippet],
    ) -> Result<String, SnippetError> {
        let prompt = snippet.prompt.as_deref().unwrap_or_default();
        let instruction = resolve(prompt, snapshot, &self.inner.evaluator).await?;
        if instruction.trim().is_empty() {
            tracing::debug!("Prompt of '@{}' is blank, clearing content", snippet.name);
            return Ok(String::new());
        }

        let model = snippet
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .ok_or_else(|| SnippetError::MissingModel {
                name: snippet.name.clone(),
            })?;

        let credential = self.inner.credentials.current();
        let content =
            self.inner.generator.generate(&instruction, model, credential.as_deref()).await?;
        Ok(content)
    }

    async fn mark_dirty(
        &self,
        names: &BTreeSet<String>,
        snapshot: &[Snippet],
    ) -> Result<(), SnippetError> {
        for snippet in snapshot.iter().filter(|s| names.contains(&s.name)) {
            self.inner.store.update_property(snippet.id, &SnippetPatch::dirty()).await?;
        }
        if !names.is_empty() {
            tracing::debug!("Marked {} dependent snippet(s) dirty", names.len());
        }
        Ok(())
    }

    async fn persist_failure(&self, snippet: &Snippet, message: &str) {
        if let Err(error) =
            self.inner.store.update_property(snippet.id, &SnippetPatch::failed(message)).await
        {
            tracing::warn!("Failed to record error for '@{}': {error}", snippet.name);
        }
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        self.inner.locks.entry(name.to_string()).or_default().clone()
    }

    fn set_status(&self, name: &str, status: RegenerationStatus) {
        self.inner.statuses.insert(name.to_string(), status.clone());
        self.emit(RegenerationEvent::SnippetStatus {
            name: name.to_string(),
            status,
        });
    }

    fn emit(&self, event: RegenerationEvent) {
        // Sending only fails when nobody is subscribed.
        let _ = self.inner.events.send(event);
    }

    fn finish(&self, report: BatchReport) -> BatchReport {
        tracing::info!(
            "Finished regeneration batch {}: {} succeeded, {} failed, {} skipped",
            report.batch_id,
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len()
        );
        self.emit(RegenerationEvent::BatchFinished {
            report: report.clone(),
        });
        report
    }
}

/// Generated snippets reachable from `name` over the reverse graph.
fn generated_dependents(name: &str, snapshot: &[Snippet]) -> BTreeSet<String> {
    let generated: HashSet<&str> =
        snapshot.iter().filter(|s| s.is_generated).map(|s| s.name.as_str()).collect();
    find_transitive_dependents(name, &build_reverse_graph(snapshot))
        .into_iter()
        .filter(|dependent| generated.contains(dependent.as_str()))
        .collect()
}

fn report_missing_references(snippet: &Snippet, others: &[Snippet]) -> Vec<String> {
    let mut all = others.to_vec();
    all.push(snippet.clone());
    let missing = list_non_existent_references(snippet.dependency_text(), &all);
    if !missing.is_empty() {
        tracing::warn!(
            "Snippet '@{}' references missing snippet(s): {}",
            snippet.name,
            missing.iter().map(|name| format!("@{name}")).collect::<Vec<_>>().join(", ")
        );
    }
    missing
}
