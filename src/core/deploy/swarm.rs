use std::io::Write;

use super::{ContainerInfo, ContainerStatus, ServiceStatus, StackManager};
use crate::config::DeploymentMode;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::utils::shell;

/// Deployment strategy for Docker Swarm. Every mutating operation maps
/// onto a native primitive; rollback uses the engine's own version
/// history.
pub struct SwarmManager<'a> {
    exec: &'a dyn Executor,
    stack_name: String,
}

impl<'a> SwarmManager<'a> {
    pub fn new(exec: &'a dyn Executor, stack_name: &str) -> Self {
        Self {
            exec,
            stack_name: stack_name.to_string(),
        }
    }

    fn full_service_name(&self, service_name: &str) -> String {
        format!("{}_{}", self.stack_name, service_name)
    }

    fn logs_command(&self, service_name: &str, follow: bool, since: &str, tail: u32) -> String {
        let mut cmd = format!("docker service logs {}", self.full_service_name(service_name));
        if tail > 0 {
            cmd.push_str(&format!(" --tail {}", tail));
        }
        if !since.is_empty() {
            cmd.push_str(&format!(" --since {}", shell::quote_arg(since)));
        }
        if follow {
            cmd.push_str(" --follow");
        }
        cmd
    }
}

impl StackManager for SwarmManager<'_> {
    fn deploy(&self, compose_content: &[u8]) -> Result<()> {
        let compose_path = format!("/tmp/{}-compose.yaml", self.stack_name);
        self.exec.write_file(&compose_path, compose_content)?;

        let cmd = format!(
            "docker stack deploy -c {} {} --with-registry-auth",
            compose_path, self.stack_name
        );
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }

        self.exec.run(&format!("rm -f {}", compose_path)).ok();
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let cmd = format!("docker stack rm {}", self.stack_name);
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }
        Ok(())
    }

    fn exists(&self) -> Result<bool> {
        let result = self.exec.run("docker stack ls --format '{{.Name}}'")?;
        Ok(result
            .stdout
            .lines()
            .any(|stack| stack.trim() == self.stack_name))
    }

    fn list_services(&self) -> Result<Vec<ServiceStatus>> {
        let cmd = format!(
            "docker stack services {} --format '{{{{.Name}}}}|{{{{.Mode}}}}|{{{{.Replicas}}}}|{{{{.Image}}}}|{{{{.Ports}}}}'",
            self.stack_name
        );
        let result = self.exec.run(&cmd)?;

        let mut services = Vec::new();
        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() >= 4 {
                services.push(ServiceStatus {
                    name: parts[0].to_string(),
                    mode: parts[1].to_string(),
                    replicas: parts[2].to_string(),
                    image: parts[3].to_string(),
                    ports: parts.get(4).unwrap_or(&"").to_string(),
                });
            }
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
        Ok(self.find_running_container_with_node(service_name)?.container_id)
    }

    fn find_running_container_with_node(&self, service_name: &str) -> Result<ContainerInfo> {
        let full_name = self.full_service_name(service_name);

        // First running task wins.
        let cmd = format!(
            "docker service ps {} --filter 'desired-state=running' --format '{{{{.ID}}}}|{{{{.Node}}}}' | head -1",
            full_name
        );
        let result = self.exec.run(&cmd)?;
        let line = result.stdout.trim().to_string();
        if line.is_empty() {
            return Err(Error::NotFound(format!(
                "no running tasks found for service {}",
                service_name
            )));
        }
        let mut fields = line.split('|');
        let task_id = fields.next().unwrap_or("").trim().to_string();
        let node_name = fields.next().map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        // Resolve the task's backing container.
        let cmd = format!(
            "docker inspect --format '{{{{.Status.ContainerStatus.ContainerID}}}}' {}",
            task_id
        );
        let result = self.exec.run(&cmd)?;
        let container_id = result.stdout.trim().to_string();
        if container_id.is_empty() {
            return Err(Error::NotFound(format!(
                "container not found for task {}",
                task_id
            )));
        }
        let container_id = container_id.chars().take(12).collect::<String>();

        let node_ip = match &node_name {
            Some(node) => {
                let cmd = format!(
                    "docker node inspect --format '{{{{.Status.Addr}}}}' {}",
                    shell::quote_arg(node)
                );
                match self.exec.run(&cmd) {
                    Ok(result) if result.success() => {
                        let addr = result.stdout.trim().to_string();
                        (!addr.is_empty()).then_some(addr)
                    }
                    _ => None,
                }
            }
            None => None,
        };

        Ok(ContainerInfo {
            container_id,
            node_name,
            node_ip,
        })
    }

    fn current_node_hostname(&self) -> Result<String> {
        let result = self.exec.run("hostname")?;
        Ok(result.stdout.trim().to_string())
    }

    fn get_container_status(&self) -> Result<Vec<ContainerStatus>> {
        let cmd = format!(
            "docker stack ps {} --format '{{{{.ID}}}}|{{{{.Name}}}}|{{{{.CurrentState}}}}|{{{{.Error}}}}'",
            self.stack_name
        );
        let result = self.exec.run(&cmd)?;

        let mut containers = Vec::new();
        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() >= 3 {
                containers.push(ContainerStatus {
                    id: parts[0].to_string(),
                    name: parts[1].to_string(),
                    service: service_from_task_name(parts[1]),
                    state: parts[2].to_string(),
                    error: parts.get(3).unwrap_or(&"").to_string(),
                });
            }
        }
        Ok(containers)
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    fn supports_scale(&self) -> bool {
        true
    }

    fn rollback_service(&self, service_name: &str) -> Result<()> {
        let cmd = format!(
            "docker service update --rollback {}",
            self.full_service_name(service_name)
        );
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }
        Ok(())
    }

    fn rollback_all(&self) -> Result<()> {
        let prefix = format!("{}_", self.stack_name);
        for service in self.list_services()? {
            let name = service
                .name
                .strip_prefix(&prefix)
                .unwrap_or(&service.name)
                .to_string();
            self.rollback_service(&name)?;
        }
        Ok(())
    }

    fn scale_service(&self, service_name: &str, replicas: u32) -> Result<()> {
        let cmd = format!(
            "docker service scale {}={}",
            self.full_service_name(service_name),
            replicas
        );
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }
        Ok(())
    }

    fn stack_name(&self) -> &str {
        &self.stack_name
    }

    fn mode(&self) -> DeploymentMode {
        DeploymentMode::Swarm
    }
}

// Task names look like "myapp_web.1"; the service part is between the
// first underscore and the last dot.
fn service_from_task_name(task_name: &str) -> String {
    let mut service = task_name;
    if let Some(idx) = service.find('_') {
        service = &service[idx + 1..];
    }
    if let Some(idx) = service.rfind('.') {
        service = &service[..idx];
    }
    service.to_string()
}
