//! Dirty propagation and wave-ordered regeneration against real stores.

use std::sync::Arc;
use std::time::Duration;

use snipweave::core::{GenerationError, Snippet};
use snipweave::llm::Credentials;
use snipweave::regen::{Orchestrator, RegenerationEvent, RegenerationStatus};
use snipweave::store::{JsonFileStore, MemoryStore, SnippetStore};
use snipweave::test_utils::{
    MockGenerator, generated, init_test_logging, literal, orchestrator_with,
};
use tempfile::TempDir;

async fn by_name(store: &dyn SnippetStore, name: &str) -> Snippet {
    store.load_all().await.unwrap().into_iter().find(|s| s.name == name).unwrap()
}

/// A → B(gen) → D(gen), A → C(gen) → D, plus an unrelated generated E.
fn diamond() -> Vec<Snippet> {
    vec![
        literal("A", "v1"),
        generated("B", "left of @A"),
        generated("C", "right of @A"),
        generated("D", "join @B and @C"),
        generated("E", "unrelated"),
    ]
}

#[tokio::test]
async fn test_update_regenerates_dependents_from_fresh_upstream() {
    init_test_logging(None);
    let generator = MockGenerator::new();
    let (orchestrator, store) = orchestrator_with(diamond(), generator.clone(), Some("key"));
    orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();
    let before = generator.call_count();

    let mut a = by_name(store.as_ref(), "A").await;
    a.content = "v2".to_string();
    let outcome = orchestrator.update_snippet(a).await.unwrap();

    for name in ["B", "C", "D"] {
        assert!(by_name(store.as_ref(), name).await.is_dirty, "{name} should be dirty");
    }
    assert!(!by_name(store.as_ref(), "E").await.is_dirty);

    let report = outcome.batch.unwrap().wait().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.succeeded.len(), 3);
    assert_eq!(generator.call_count() - before, 3);

    let instructions = generator.instructions();
    let last = instructions.last().unwrap();
    assert_eq!(last, "join <left of v2> and <right of v2>");
    assert_eq!(
        by_name(store.as_ref(), "D").await.content,
        "<join <left of v2> and <right of v2>>"
    );
}

#[tokio::test]
async fn test_waves_are_announced_in_dependency_order() {
    let generator = MockGenerator::new();
    let (orchestrator, _store) = orchestrator_with(diamond(), generator, Some("key"));
    let mut events = orchestrator.subscribe();

    orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();

    let mut waves = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RegenerationEvent::WaveStarted { mut names, .. } = event {
            names.sort();
            waves.push(names);
        }
    }
    assert_eq!(waves, vec![vec!["E"], vec!["B", "C"], vec!["D"]]);
}

#[tokio::test]
async fn test_failure_is_isolated_to_its_downstream() {
    let generator = MockGenerator::new();
    generator.fail_when("left of", GenerationError::Service {
        status: 500,
        message: "upstream exploded".to_string(),
    });
    let (orchestrator, store) = orchestrator_with(diamond(), generator.clone(), Some("key"));

    let report = orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();

    assert!(report.succeeded.contains("C"));
    assert!(report.succeeded.contains("E"));
    assert!(report.failed["B"].contains("upstream exploded"));
    assert_eq!(report.skipped["D"], "Dependency '@B' failed to regenerate");
    assert!(generator.instructions().iter().all(|i| !i.starts_with("join")));

    let d = by_name(store.as_ref(), "D").await;
    assert!(d.is_dirty);
    assert_eq!(d.content, "");
    assert!(matches!(orchestrator.status("D"), RegenerationStatus::Error(_)));
}

#[tokio::test]
async fn test_missing_credential_recovers_when_key_arrives() {
    let generator = MockGenerator::new();
    let (orchestrator, store) = orchestrator_with(diamond(), generator.clone(), None);
    let watcher = orchestrator.watch_credentials();

    let report = orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();
    assert_eq!(report.failed.len(), 3);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(orchestrator.awaiting_credential().len(), 4);

    let mut events = orchestrator.subscribe();
    orchestrator.credentials().set(Some("sk-live".to_string()));
    let retried = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(RegenerationEvent::BatchFinished { report }) = events.recv().await {
                break report;
            }
        }
    })
    .await
    .unwrap();

    assert!(retried.is_success());
    assert_eq!(retried.total(), 4);
    assert!(!by_name(store.as_ref(), "D").await.is_dirty);
    assert!(generator.calls().iter().skip(3).all(|c| c.credential.as_deref() == Some("sk-live")));

    // A second credential change finds nothing awaiting.
    let calls = generator.call_count();
    orchestrator.credentials().set(Some("sk-rotated".to_string()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(generator.call_count(), calls);
    watcher.abort();
}

#[tokio::test]
async fn test_dirty_flags_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snippets.json");

    // First session: the service fails, leaving everything dirty on disk.
    {
        let store = Arc::new(JsonFileStore::new(&path));
        for snippet in diamond() {
            store.save(&snippet).await.unwrap();
        }
        let generator = MockGenerator::new();
        generator.fail_when("", GenerationError::Network {
            message: "offline".to_string(),
        });
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(generator),
            Credentials::new(Some("k".to_string())),
        );
        orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();

        let b = by_name(store.as_ref(), "B").await;
        assert!(b.is_dirty);
        assert!(b.generation_error.unwrap().contains("offline"));
    }

    // Second session over the same file picks the dirty snippets up.
    let store = Arc::new(JsonFileStore::new(&path));
    let generator = MockGenerator::new();
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(generator.clone()),
        Credentials::new(Some("k".to_string())),
    );
    let report = orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();
    assert_eq!(report.succeeded.len(), 4);

    let d = by_name(store.as_ref(), "D").await;
    assert!(!d.is_dirty);
    assert!(d.generation_error.is_none());
    assert_eq!(d.content, "<join <left of v1> and <right of v1>>");
    assert!(orchestrator.resume_dirty().await.unwrap().is_none());
}

#[tokio::test]
async fn test_cyclic_batch_makes_no_calls() {
    let generator = MockGenerator::new();
    let snippets = vec![generated("x", "@y"), literal("y", "@x")];
    let store = Arc::new(MemoryStore::with_snippets(snippets));
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(generator.clone()),
        Credentials::new(Some("k".to_string())),
    );

    let report = orchestrator.resume_dirty().await.unwrap().unwrap().wait().await.unwrap();
    assert_eq!(report.failed["x"], "Snippet cycle detected: @x -> @y -> @x");
    assert_eq!(generator.call_count(), 0);
    assert!(by_name(store.as_ref(), "x").await.is_dirty);
}
