use std::io::Write;

use serde::Deserialize;

use super::{ContainerInfo, ContainerStatus, ServiceStatus, StackManager};
use crate::composefile;
use crate::config::DeploymentMode;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::history::HistoryManager;
use crate::log_status;

/// Deployment strategy for docker compose on a single host.
///
/// Compose has no native multi-version rollback, so deploys are recorded
/// in the history sidecar and rollback re-submits the previous record as
/// a fresh deploy. History bookkeeping is best effort and never blocks a
/// deploy.
pub struct ComposeManager<'a> {
    exec: &'a dyn Executor,
    project_name: String,
    history: HistoryManager<'a>,
}

// One line of `docker compose ps --format json` output.
#[derive(Deserialize)]
struct PsRecord {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Service", default)]
    service: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "Ports", default)]
    ports: String,
}

impl<'a> ComposeManager<'a> {
    pub fn new(exec: &'a dyn Executor, project_name: &str) -> Self {
        Self {
            exec,
            project_name: project_name.to_string(),
            history: HistoryManager::new(exec, project_name),
        }
    }

    pub fn history(&self) -> &HistoryManager<'a> {
        &self.history
    }

    fn logs_command(&self, service_name: &str, follow: bool, since: &str, tail: u32) -> String {
        let mut cmd = format!(
            "docker compose -p {} logs {}",
            self.project_name, service_name
        );
        if tail > 0 {
            cmd.push_str(&format!(" --tail {}", tail));
        }
        if !since.is_empty() {
            cmd.push_str(&format!(" --since {}", since));
        }
        if follow {
            cmd.push_str(" --follow");
        }
        cmd
    }

    fn ps_records(&self) -> Result<Vec<PsRecord>> {
        let cmd = format!(
            "docker compose -p {} ps --format json",
            self.project_name
        );
        let result = self.exec.run(&cmd)?;

        // One JSON document per line.
        let mut records = Vec::new();
        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<PsRecord>(line) {
                Ok(record) => records.push(record),
                Err(_) => continue,
            }
        }
        Ok(records)
    }
}

impl StackManager for ComposeManager<'_> {
    fn deploy(&self, compose_content: &[u8]) -> Result<()> {
        // Bookkeeping must never block a deploy.
        if let Err(e) = self.history.ensure_running() {
            log_status!("deploy", "Warning: failed to start history container: {}", e);
        }

        let compose_path = format!("/tmp/{}-compose.yaml", self.project_name);
        self.exec.write_file(&compose_path, compose_content)?;

        let cmd = format!(
            "docker compose -p {} -f {} up -d --remove-orphans",
            self.project_name, compose_path
        );
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }

        let images = composefile::extract_images(compose_content);
        if let Err(e) = self.history.record(compose_content, &images) {
            log_status!("deploy", "Warning: failed to record deploy in history: {}", e);
        }

        self.exec.run(&format!("rm -f {}", compose_path)).ok();
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let cmd = format!("docker compose -p {} down", self.project_name);
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }
        Ok(())
    }

    fn exists(&self) -> Result<bool> {
        let cmd = format!("docker compose -p {} ps -q", self.project_name);
        let result = self.exec.run(&cmd)?;
        Ok(!result.stdout.trim().is_empty())
    }

    fn list_services(&self) -> Result<Vec<ServiceStatus>> {
        // Compose reports containers, not services: collapse multiple
        // container records per declared service into one row with a
        // simplified single-instance replica descriptor.
        let mut services: Vec<ServiceStatus> = Vec::new();
        for record in self.ps_records()? {
            let name = format!("{}_{}", self.project_name, record.service);
            if services.iter().any(|s| s.name == name) {
                continue;
            }
            services.push(ServiceStatus {
                name,
                mode: "replicated".to_string(),
                replicas: "1/1".to_string(),
                image: record.image,
                ports: record.ports,
            });
        }
        Ok(services)
    }

    fn get_service_logs(&self, service_name: &str, since: &str, tail: u32) -> Result<String> {
        let cmd = self.logs_command(service_name, false, since, tail);
        let result = self.exec.run(&cmd)?;
        Ok(format!("{}{}", result.stdout, result.stderr))
    }

    fn stream_service_logs(
        &self,
        service_name: &str,
        follow: bool,
        tail: u32,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<()> {
        let cmd = self.logs_command(service_name, follow, "", tail);
        self.exec.run_stream(&cmd, stdout, stderr)
    }

    fn find_running_container(&self, service_name: &str) -> Result<String> {
        let cmd = format!(
            "docker compose -p {} ps -q {}",
            self.project_name, service_name
        );
        let result = self.exec.run(&cmd)?;

        let container_id = result
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no running container found for service {}",
                    service_name
                ))
            })?;

        Ok(container_id.chars().take(12).collect())
    }

    fn find_running_container_with_node(&self, service_name: &str) -> Result<ContainerInfo> {
        // Single host: no placement to report.
        Ok(ContainerInfo {
            container_id: self.find_running_container(service_name)?,
            node_name: None,
            node_ip: None,
        })
    }

    fn current_node_hostname(&self) -> Result<String> {
        let result = self.exec.run("hostname")?;
        Ok(result.stdout.trim().to_string())
    }

    fn get_container_status(&self) -> Result<Vec<ContainerStatus>> {
        Ok(self
            .ps_records()?
            .into_iter()
            .map(|record| ContainerStatus {
                id: record.id,
                name: record.name,
                service: record.service,
                state: record.state,
                error: String::new(),
            })
            .collect())
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    fn supports_scale(&self) -> bool {
        false
    }

    // Per-service rollback is whole-stack here: the history record is the
    // unit of rollback, not the service.
    fn rollback_service(&self, _service_name: &str) -> Result<()> {
        self.rollback_all()
    }

    fn rollback_all(&self) -> Result<()> {
        let content = self.history.get_compose_content(-1)?;
        self.deploy(&content)
    }

    fn scale_service(&self, _service_name: &str, _replicas: u32) -> Result<()> {
        Err(Error::unsupported("scale", DeploymentMode::Compose))
    }

    fn stack_name(&self) -> &str {
        &self.project_name
    }

    fn mode(&self) -> DeploymentMode {
        DeploymentMode::Compose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::StubExecutor;

    #[test]
    fn deploy_applies_with_orphan_pruning() {
        let exec = StubExecutor::new().ok("myapp-history\n");
        let manager = ComposeManager::new(&exec, "myapp");
        manager.deploy(b"services:\n  web:\n    image: nginx:1.27\n").unwrap();

        let commands = exec.commands();
        assert!(commands.iter().any(|c| c
            == "docker compose -p myapp -f /tmp/myapp-compose.yaml up -d --remove-orphans"));

        // deploy content and extracted images are recorded in history
        let record_cmd = commands
            .iter()
            .find(|c| c.contains("/app/history record"))
            .unwrap();
        assert!(record_cmd.contains("nginx:1.27"));
    }

    #[test]
    fn deploy_succeeds_when_history_is_unavailable() {
        // history: ps fails, docker run fails, docker start fails; the
        // deploy itself succeeds and the recording failure is swallowed
        let exec = StubExecutor::new()
            .err("history down") // ensure_running: docker ps
            .ok("") // compose up
            .err("history still down"); // record: docker ps
        let manager = ComposeManager::new(&exec, "myapp");

        manager.deploy(b"services: {}\n").unwrap();
    }

    #[test]
    fn deploy_surfaces_backend_failure() {
        let exec = StubExecutor::new()
            .ok("myapp-history\n") // ensure_running
            .exit(1, "port is already allocated"); // compose up
        let manager = ComposeManager::new(&exec, "myapp");

        let err = manager.deploy(b"services: {}\n").unwrap_err();
        assert_eq!(err.code(), "COMMAND_FAILED");
        assert!(err.to_string().contains("port is already allocated"));
    }

    #[test]
    fn list_services_dedupes_containers_per_service() {
        let exec = StubExecutor::new().ok(concat!(
            r#"{"ID":"aaa","Name":"myapp-web-1","Service":"web","State":"running","Image":"nginx:1.27","Ports":"80/tcp"}"#,
            "\n",
            r#"{"ID":"bbb","Name":"myapp-web-2","Service":"web","State":"running","Image":"nginx:1.27","Ports":"80/tcp"}"#,
            "\n",
            r#"{"ID":"ccc","Name":"myapp-db-1","Service":"db","State":"running","Image":"postgres:16","Ports":""}"#,
            "\n",
        ));
        let manager = ComposeManager::new(&exec, "myapp");

        let services = manager.list_services().unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "myapp_web");
        assert_eq!(services[0].replicas, "1/1");
        assert_eq!(services[0].mode, "replicated");
        assert_eq!(services[1].name, "myapp_db");
    }

    #[test]
    fn container_status_parses_json_lines() {
        let exec = StubExecutor::new().ok(concat!(
            r#"{"ID":"aaa","Name":"myapp-web-1","Service":"web","State":"running","Image":"nginx:1.27"}"#,
            "\n",
            "garbage line\n",
            r#"{"ID":"bbb","Name":"myapp-db-1","Service":"db","State":"exited","Image":"postgres:16"}"#,
            "\n",
        ));
        let manager = ComposeManager::new(&exec, "myapp");

        let statuses = manager.get_container_status().unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].service, "web");
        assert_eq!(statuses[1].state, "exited");
    }

    #[test]
    fn find_running_container_takes_first_and_truncates() {
        let exec = StubExecutor::new().ok("0123456789abcdef\nfedcba9876543210\n");
        let manager = ComposeManager::new(&exec, "myapp");
        assert_eq!(
            manager.find_running_container("web").unwrap(),
            "0123456789ab"
        );
    }

    #[test]
    fn placement_is_never_reported() {
        let exec = StubExecutor::new().ok("0123456789abcdef\n");
        let manager = ComposeManager::new(&exec, "myapp");
        let info = manager.find_running_container_with_node("web").unwrap();
        assert!(info.node_name.is_none());
        assert!(info.node_ip.is_none());
    }

    #[test]
    fn scale_fails_with_typed_unsupported_signal() {
        let exec = StubExecutor::new();
        let manager = ComposeManager::new(&exec, "myapp");
        assert!(!manager.supports_scale());

        let err = manager.scale_service("web", 3).unwrap_err();
        match err {
            Error::Unsupported { operation, mode } => {
                assert_eq!(operation, "scale");
                assert_eq!(mode, DeploymentMode::Compose);
            }
            other => panic!("expected Unsupported, got {:?}", other),
        }
    }

    #[test]
    fn rollback_redeploys_previous_content() {
        let previous = r#"{"id":1,"stack_name":"myapp","deployed_at":"2026-08-01T10:00:00Z","compose_content":"services:\n  web:\n    image: nginx:1.26\n","images":{"web":"nginx:1.26"}}"#;
        let exec = StubExecutor::new()
            .ok("myapp-history\n") // get: ensure_running
            .ok(previous) // get record
            .ok("myapp-history\n") // deploy: ensure_running
            .ok(""); // compose up
        let manager = ComposeManager::new(&exec, "myapp");

        manager.rollback_all().unwrap();

        let written = exec.written();
        let deployed = written
            .iter()
            .find(|(path, _)| path == "/tmp/myapp-compose.yaml")
            .unwrap();
        assert_eq!(deployed.1, b"services:\n  web:\n    image: nginx:1.26\n");
    }

    #[test]
    fn per_service_rollback_is_whole_stack() {
        let previous = r#"{"id":1,"stack_name":"myapp","deployed_at":"2026-08-01T10:00:00Z","compose_content":"services: {}\n","images":{}}"#;
        let exec = StubExecutor::new()
            .ok("myapp-history\n")
            .ok(previous)
            .ok("myapp-history\n")
            .ok("");
        let manager = ComposeManager::new(&exec, "myapp");

        manager.rollback_service("web").unwrap();

        assert!(exec
            .commands()
            .iter()
            .any(|c| c.contains("up -d --remove-orphans")));
    }
}
