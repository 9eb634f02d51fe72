//! The `snipweave` binary against temporary config and store files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated config and store paths for one test.
struct CliEnv {
    dir: TempDir,
}

impl CliEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn store(&self) -> PathBuf {
        self.dir.path().join("snippets.json")
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("snipweave").unwrap();
        cmd.env_remove("OPENROUTER_API_KEY")
            .env_remove("SNIPWEAVE_CONFIG")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.config())
            .arg("--store")
            .arg(self.store());
        cmd
    }

    fn add_literal(&self, name: &str, content: &str) {
        self.cmd().args(["add", name, "--content", content]).assert().success();
    }
}

#[test]
fn test_add_and_resolve_chain() {
    let env = CliEnv::new();
    env.add_literal("A", "x");
    env.add_literal("B", "@A y");
    env.add_literal("C", "@B z");

    env.cmd().args(["resolve", "@C!"]).assert().success().stdout("x y z!\n");
    env.cmd()
        .args(["resolve", "${ A | upper } and ${C}"])
        .assert()
        .success()
        .stdout("X and x y z\n");
}

#[test]
fn test_resolve_reports_missing_snippet_with_suggestion() {
    let env = CliEnv::new();
    env.add_literal("greeting", "hi");

    env.cmd()
        .args(["resolve", "${greting}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snippet '@greting' not found."));

    env.cmd()
        .args(["edit", "greting", "--content", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Did you mean @greeting?"));
}

#[test]
fn test_cycle_is_listed_and_blocks_resolution() {
    let env = CliEnv::new();
    env.add_literal("a", "@b");
    env.add_literal("b", "@a");
    env.add_literal("ok", "fine");

    env.cmd()
        .args(["resolve", "@ok"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snippet cycle detected: @a -> @b -> @a"));

    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("cycle"))
        .stdout(predicate::str::contains("2 snippet(s) are on a reference cycle"));

    env.cmd()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snippet cycle detected"));
}

#[test]
fn test_duplicate_and_invalid_names_are_rejected() {
    let env = CliEnv::new();
    env.add_literal("a", "1");

    env.cmd()
        .args(["add", "a", "--content", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    env.cmd()
        .args(["add", "bad-name", "--content", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid snippet name"));
}

#[test]
fn test_rename_keeps_content_and_warns_about_old_references() {
    let env = CliEnv::new();
    env.add_literal("old", "value");
    env.add_literal("user", "uses @old");

    env.cmd().args(["edit", "old", "--rename", "new"]).assert().success();
    env.cmd()
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"new\""))
        .stdout(predicate::str::contains("\"content\": \"value\""));
    env.cmd()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("'@user' references '@old'"));
}

#[test]
fn test_generated_snippet_without_credential_stays_dirty() {
    let env = CliEnv::new();
    env.add_literal("topic", "rust");
    env.cmd()
        .args(["add", "essay", "--prompt", "Write about @topic", "--model", "m/x", "--no-wait"])
        .assert()
        .success();

    env.cmd().arg("waves").assert().success().stdout(predicate::str::contains("@essay"));

    env.cmd()
        .arg("regenerate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("credential is missing"));

    env.cmd()
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"isDirty\": true"));
}

#[test]
fn test_set_key_retries_snippets_waiting_for_a_credential() {
    let env = CliEnv::new();
    // Nothing listens here, so the retried generation fails fast without a real call.
    std::fs::write(env.config(), "base_url = \"http://127.0.0.1:9/\"\n").unwrap();
    env.cmd()
        .args(["add", "essay", "--prompt", "Write something", "--model", "m/x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("credential is missing"));

    env.cmd()
        .args(["config", "set-key", "sk-or-1234567890"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Retrying snippets that were waiting for a credential"))
        .stdout(predicate::str::contains("@essay"));

    // The credential failure was replaced by the retry's outcome.
    env.cmd()
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("credential is missing").not())
        .stdout(predicate::str::contains("\"isDirty\": true"));

    // Only missing-credential failures are retried, so a second key change is a no-op.
    env.cmd()
        .args(["config", "set-key", "sk-or-0987654321"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Retrying").not());
}

#[test]
fn test_graph_outputs() {
    let env = CliEnv::new();
    env.add_literal("base", "b");
    env.add_literal("top", "@base");

    env.cmd()
        .args(["graph", "top"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@top"))
        .stdout(predicate::str::contains("@base"));

    env.cmd().args(["graph", "--dot"]).assert().success().stdout(predicate::str::contains("digraph"));
}

#[test]
fn test_remove_snippet() {
    let env = CliEnv::new();
    env.add_literal("gone", "x");
    env.cmd().args(["remove", "@gone"]).assert().success();
    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No snippets stored"));
}

#[test]
fn test_config_round_trip() {
    let env = CliEnv::new();

    env.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    env.cmd().args(["config", "set-model", "openai/gpt-4o-mini"]).assert().success();
    env.cmd().args(["config", "set-key", "sk-or-1234567890"]).assert().success();

    env.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openai/gpt-4o-mini"))
        .stdout(predicate::str::contains("sk-or-"))
        .stdout(predicate::str::contains("1234567890").not());

    let saved = std::fs::read_to_string(env.config()).unwrap();
    assert!(saved.contains("default_model = \"openai/gpt-4o-mini\""));
}
