//! Deploy history for backends without native version tracking.
//!
//! A long-lived sidecar container holds an append-only log of deploy
//! records per stack, giving the compose backend the rollback capability
//! the swarm backend gets natively. The sidecar is created lazily and
//! persists across invocations; only an explicit `remove` destroys it.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::log_status;
use crate::utils::shell;

/// Image for the history sidecar.
pub const HISTORY_IMAGE: &str = "docker.io/dockhand/stack-history:latest";

/// Default number of records shown by listing commands.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// How long to wait after (re)starting the sidecar before using it.
const READY_WAIT: Duration = Duration::from_millis(500);

/// One recorded deploy. Records are append-only, ordered by insertion and
/// addressed by relative offset (0 = latest, -1 = previous).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRecord {
    pub id: i64,
    pub stack_name: String,
    pub deployed_at: DateTime<Utc>,
    pub compose_content: String,
    pub images: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Sidecar container name for a stack. Deterministic, so repeated
/// invocations always resolve to the same rollback target.
pub fn container_name(stack_name: &str) -> String {
    format!("{}-history", stack_name)
}

/// Persistent volume name for a stack's history data.
pub fn volume_name(stack_name: &str) -> String {
    format!("{}_history_data", stack_name)
}

/// Manages the deploy history through the sidecar container.
pub struct HistoryManager<'a> {
    exec: &'a dyn Executor,
    stack_name: String,
    container_name: String,
}

impl<'a> HistoryManager<'a> {
    pub fn new(exec: &'a dyn Executor, stack_name: &str) -> Self {
        Self {
            exec,
            stack_name: stack_name.to_string(),
            container_name: container_name(stack_name),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Check for an exact-name match of a running sidecar.
    pub fn is_running(&self) -> Result<bool> {
        let cmd = format!(
            "docker ps --filter name=^{}$ --format '{{{{.Names}}}}'",
            self.container_name
        );
        let result = self.exec.run(&cmd)?;
        Ok(result.stdout.trim() == self.container_name)
    }

    /// Idempotently bring the sidecar up.
    ///
    /// Creates the container bound to the stack-scoped volume; when
    /// creation fails because a stopped container of that name already
    /// exists, starts it instead. After any (re)start, waits briefly
    /// before the container is considered ready.
    pub fn ensure_running(&self) -> Result<()> {
        if self.is_running()? {
            return Ok(());
        }

        let create = format!(
            "docker run -d --name {} --restart unless-stopped -v {}:/data {}",
            self.container_name,
            volume_name(&self.stack_name),
            HISTORY_IMAGE
        );
        let result = self.exec.run(&create)?;

        if !result.success() {
            let start = format!("docker start {}", self.container_name);
            let result = self.exec.run(&start)?;
            if !result.success() {
                return Err(Error::command_failed(&start, result.exit_code, &result.stderr));
            }
        }

        std::thread::sleep(READY_WAIT);
        Ok(())
    }

    /// Append a deploy record for this stack.
    ///
    /// The content travels via a host temp file and `docker cp` rather
    /// than through argv, so structured content survives byte-for-byte.
    pub fn record(&self, content: &[u8], images: &BTreeMap<String, String>) -> Result<()> {
        self.ensure_running()?;

        let images_json = serde_json::to_string(images)?;

        let host_path = format!("/tmp/{}-compose-record.yaml", self.stack_name);
        let container_path = "/tmp/compose-record.yaml";
        self.exec.write_file(&host_path, content)?;

        let copy = format!(
            "docker cp {} {}:{}",
            shell::quote_path(&host_path),
            self.container_name,
            container_path
        );
        let result = self.exec.run(&copy)?;
        if !result.success() {
            return Err(Error::command_failed(&copy, result.exit_code, &result.stderr));
        }

        let record = format!(
            "docker exec {} /app/history record --stack {} --compose-file {} --images {}",
            self.container_name,
            self.stack_name,
            container_path,
            shell::quote_arg(&images_json)
        );
        let result = self.exec.run(&record)?;
        if !result.success() {
            return Err(Error::command_failed(&record, result.exit_code, &result.stderr));
        }

        // Transient locations, both sides. Best effort.
        self.exec.run(&format!("rm -f {}", shell::quote_path(&host_path))).ok();
        self.exec
            .run(&format!(
                "docker exec {} rm -f {}",
                self.container_name, container_path
            ))
            .ok();

        Ok(())
    }

    /// Up to `limit` most recent records for this stack, newest first.
    pub fn list(&self, limit: usize) -> Result<Vec<DeployRecord>> {
        self.ensure_running()?;

        let cmd = format!(
            "docker exec {} /app/history list --stack {} --limit {} --format json",
            self.container_name, self.stack_name, limit
        );
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }

        serde_json::from_str(&result.stdout).map_err(|e| Error::parse("history list", e))
    }

    /// One record by relative offset: 0 = latest, -1 = previous, etc.
    pub fn get(&self, offset: i64) -> Result<DeployRecord> {
        self.ensure_running()?;

        let cmd = format!(
            "docker exec {} /app/history get --stack {} --offset {} --format json",
            self.container_name, self.stack_name, offset
        );
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }

        serde_json::from_str(&result.stdout).map_err(|e| Error::parse("history record", e))
    }

    /// The declarative content of one record, ready to re-submit as a
    /// fresh deploy.
    pub fn get_compose_content(&self, offset: i64) -> Result<Vec<u8>> {
        let record = self.get(offset)?;
        Ok(record.compose_content.into_bytes())
    }

    /// The record before the current one. Fails with a distinct condition
    /// when fewer than two deploys exist.
    pub fn get_previous(&self) -> Result<DeployRecord> {
        let mut records = self.list(2)?;
        if records.len() < 2 {
            return Err(Error::NoPreviousDeploy);
        }
        Ok(records.remove(1))
    }

    /// Stop the sidecar. Failures are logged, never propagated; cleanup
    /// must not block the caller's primary intent.
    pub fn stop(&self) {
        let cmd = format!("docker stop {}", self.container_name);
        match self.exec.run(&cmd) {
            Ok(result) if !result.success() => {
                log_status!("history", "failed to stop {}: {}", self.container_name, result.stderr.trim());
            }
            Err(e) => {
                log_status!("history", "failed to stop {}: {}", self.container_name, e);
            }
            _ => {}
        }
    }

    /// Remove the sidecar and its volume. Best effort, like `stop`; this
    /// is the only way history data is ever destroyed.
    pub fn remove(&self) {
        self.exec.run(&format!("docker stop {}", self.container_name)).ok();
        self.exec.run(&format!("docker rm {}", self.container_name)).ok();
        self.exec
            .run(&format!("docker volume rm {}", volume_name(&self.stack_name)))
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::StubExecutor;

    fn record_json(id: i64, content: &str) -> String {
        format!(
            r#"{{"id":{},"stack_name":"myapp","deployed_at":"2026-08-01T12:00:00Z","compose_content":{},"images":{{"web":"nginx:1.27"}}}}"#,
            id,
            serde_json::to_string(content).unwrap()
        )
    }

    #[test]
    fn names_are_deterministic_per_stack() {
        assert_eq!(container_name("myapp"), "myapp-history");
        assert_eq!(volume_name("myapp"), "myapp_history_data");
        assert_eq!(container_name("myapp"), container_name("myapp"));
    }

    #[test]
    fn is_running_matches_exact_name() {
        let exec = StubExecutor::new().ok("myapp-history\n");
        let history = HistoryManager::new(&exec, "myapp");
        assert!(history.is_running().unwrap());

        let exec = StubExecutor::new().ok("");
        let history = HistoryManager::new(&exec, "myapp");
        assert!(!history.is_running().unwrap());
    }

    #[test]
    fn ensure_running_skips_creation_when_already_up() {
        let exec = StubExecutor::new().ok("myapp-history\n");
        let history = HistoryManager::new(&exec, "myapp");
        history.ensure_running().unwrap();

        let commands = exec.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("docker ps"));
    }

    #[test]
    fn ensure_running_creates_only_on_first_call() {
        let exec = StubExecutor::new()
            .ok("") // not running
            .ok("abc123") // docker run -d
            .ok("myapp-history\n"); // second call: running
        let history = HistoryManager::new(&exec, "myapp");
        history.ensure_running().unwrap();
        history.ensure_running().unwrap();

        let creates: Vec<_> = exec
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("docker run -d"))
            .collect();
        assert_eq!(creates.len(), 1);
        assert!(creates[0].contains("--name myapp-history"));
        assert!(creates[0].contains("-v myapp_history_data:/data"));
    }

    #[test]
    fn ensure_running_starts_stopped_container() {
        let exec = StubExecutor::new()
            .ok("") // not running
            .exit(125, "name already in use") // docker run -d
            .ok("myapp-history"); // docker start
        let history = HistoryManager::new(&exec, "myapp");
        history.ensure_running().unwrap();

        let commands = exec.commands();
        assert_eq!(commands[2], "docker start myapp-history");
    }

    #[test]
    fn record_transfers_exact_content() {
        let content = b"services:\n  web:\n    image: nginx:1.27 # it's pinned\n";
        let exec = StubExecutor::new().ok("myapp-history\n");
        let history = HistoryManager::new(&exec, "myapp");

        let mut images = BTreeMap::new();
        images.insert("web".to_string(), "nginx:1.27".to_string());
        history.record(content, &images).unwrap();

        let written = exec.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, "/tmp/myapp-compose-record.yaml");
        assert_eq!(written[0].1, content);

        let commands = exec.commands();
        assert!(commands.iter().any(|c| c.starts_with("docker cp")));
        let record_cmd = commands
            .iter()
            .find(|c| c.contains("/app/history record"))
            .unwrap();
        assert!(record_cmd.contains("--stack myapp"));
        assert!(record_cmd.contains("nginx:1.27"));
    }

    #[test]
    fn record_cleans_up_both_transient_paths() {
        let exec = StubExecutor::new().ok("myapp-history\n");
        let history = HistoryManager::new(&exec, "myapp");
        history.record(b"services: {}\n", &BTreeMap::new()).unwrap();

        let commands = exec.commands();
        assert!(commands
            .iter()
            .any(|c| c.starts_with("rm -f") && c.contains("myapp-compose-record.yaml")));
        assert!(commands
            .iter()
            .any(|c| c.contains("docker exec myapp-history rm -f")));
    }

    #[test]
    fn list_parses_records_newest_first() {
        let json = format!("[{},{}]", record_json(2, "v2"), record_json(1, "v1"));
        let exec = StubExecutor::new().ok("myapp-history\n").ok(&json);
        let history = HistoryManager::new(&exec, "myapp");

        let records = history.list(10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 2);
        assert_eq!(records[1].compose_content, "v1");
    }

    #[test]
    fn list_distinguishes_parse_failures() {
        let exec = StubExecutor::new().ok("myapp-history\n").ok("not json at all");
        let history = HistoryManager::new(&exec, "myapp");

        let err = history.list(10).unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
    }

    #[test]
    fn get_compose_content_round_trips_bytes() {
        let content = "services:\n  web:\n    command: [\"sh\", \"-c\", \"echo 'hi'\"]\n";
        let exec = StubExecutor::new()
            .ok("myapp-history\n")
            .ok(&record_json(1, content));
        let history = HistoryManager::new(&exec, "myapp");

        let bytes = history.get_compose_content(-1).unwrap();
        assert_eq!(bytes, content.as_bytes());

        let commands = exec.commands();
        assert!(commands.iter().any(|c| c.contains("--offset -1")));
    }

    #[test]
    fn get_previous_requires_two_records() {
        let json = format!("[{}]", record_json(1, "only"));
        let exec = StubExecutor::new().ok("myapp-history\n").ok(&json);
        let history = HistoryManager::new(&exec, "myapp");

        let err = history.get_previous().unwrap_err();
        assert!(matches!(err, Error::NoPreviousDeploy));
    }

    #[test]
    fn get_previous_returns_second_most_recent() {
        let json = format!("[{},{}]", record_json(5, "current"), record_json(4, "previous"));
        let exec = StubExecutor::new().ok("myapp-history\n").ok(&json);
        let history = HistoryManager::new(&exec, "myapp");

        let record = history.get_previous().unwrap();
        assert_eq!(record.id, 4);
        assert_eq!(record.compose_content, "previous");
    }

    #[test]
    fn stop_and_remove_swallow_failures() {
        let exec = StubExecutor::new().err("connection reset");
        let history = HistoryManager::new(&exec, "myapp");
        history.stop();

        let exec = StubExecutor::new().err("gone").err("gone").err("gone");
        let history = HistoryManager::new(&exec, "myapp");
        history.remove();

        let commands = exec.commands();
        assert!(commands.iter().any(|c| c.contains("docker volume rm myapp_history_data")));
    }
}
