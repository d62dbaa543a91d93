//! Cluster-level helpers that sit outside the per-stack deployment
//! strategies: engine checks, swarm initialization, networks, registry
//! login and task-level status.

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::utils::shell;

/// Status of one task (a running instance of a service).
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub id: String,
    pub name: String,
    pub image: String,
    pub node: String,
    pub desired_state: String,
    pub current_state: String,
    pub error: String,
}

pub struct SwarmOps<'a> {
    exec: &'a dyn Executor,
    stack_name: String,
}

impl<'a> SwarmOps<'a> {
    pub fn new(exec: &'a dyn Executor, stack_name: &str) -> Self {
        Self {
            exec,
            stack_name: stack_name.to_string(),
        }
    }

    pub fn is_docker_installed(&self) -> Result<bool> {
        let result = self.exec.run("docker --version")?;
        Ok(result.success())
    }

    pub fn docker_version(&self) -> Result<String> {
        let result = self.exec.run("docker --version")?;
        Ok(result.stdout.trim().to_string())
    }

    pub fn is_initialized(&self) -> Result<bool> {
        let result = self
            .exec
            .run("docker info --format '{{.Swarm.LocalNodeState}}'")?;
        Ok(result.stdout.trim() == "active")
    }

    pub fn init(&self) -> Result<()> {
        let result = self.exec.run("docker swarm init")?;
        if !result.success() {
            return Err(Error::command_failed(
                "docker swarm init",
                result.exit_code,
                &result.stderr,
            ));
        }
        Ok(())
    }

    /// Create an attachable overlay network, if it does not exist yet.
    pub fn create_network(&self, name: &str) -> Result<()> {
        let check = format!(
            "docker network ls --filter name=^{}$ --format '{{{{.Name}}}}'",
            name
        );
        let result = self.exec.run(&check)?;
        if result.stdout.trim() == name {
            return Ok(());
        }

        let create = format!(
            "docker network create --driver overlay --attachable {}",
            shell::quote_arg(name)
        );
        let result = self.exec.run(&create)?;
        if !result.success() {
            return Err(Error::command_failed(&create, result.exit_code, &result.stderr));
        }
        Ok(())
    }

    /// Log into a container registry. A no-op without credentials; the
    /// password travels over stdin, never argv.
    pub fn registry_login(&self, url: &str, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            return Ok(());
        }

        let cmd = format!(
            "echo {} | docker login {} -u {} --password-stdin",
            shell::quote_arg(password),
            shell::quote_arg(url),
            shell::quote_arg(username)
        );
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(
                "docker login",
                result.exit_code,
                &result.stderr,
            ));
        }
        Ok(())
    }

    /// All tasks for the stack.
    pub fn stack_tasks(&self) -> Result<Vec<TaskStatus>> {
        let cmd = format!(
            "docker stack ps {} --format '{{{{.ID}}}}|{{{{.Name}}}}|{{{{.Image}}}}|{{{{.Node}}}}|{{{{.DesiredState}}}}|{{{{.CurrentState}}}}|{{{{.Error}}}}'",
            self.stack_name
        );
        let result = self.exec.run(&cmd)?;
        Ok(parse_task_lines(&result.stdout))
    }

    /// Tasks for one service in the stack.
    pub fn service_tasks(&self, service_name: &str) -> Result<Vec<TaskStatus>> {
        let cmd = format!(
            "docker service ps {}_{} --format '{{{{.ID}}}}|{{{{.Name}}}}|{{{{.Image}}}}|{{{{.Node}}}}|{{{{.DesiredState}}}}|{{{{.CurrentState}}}}|{{{{.Error}}}}'",
            self.stack_name, service_name
        );
        let result = self.exec.run(&cmd)?;
        Ok(parse_task_lines(&result.stdout))
    }

    /// One-shot convergence check: every task whose desired state is
    /// running must currently be running.
    pub fn is_converged(&self) -> Result<bool> {
        let cmd = format!(
            "docker stack ps {} --filter 'desired-state=running' --format '{{{{.CurrentState}}}}'",
            self.stack_name
        );
        let result = self.exec.run(&cmd)?;
        Ok(result
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .all(|l| l.trim().starts_with("Running")))
    }

    pub fn current_node_hostname(&self) -> Result<String> {
        let result = self.exec.run("hostname")?;
        Ok(result.stdout.trim().to_string())
    }

    /// Raw node table for display.
    pub fn node_info(&self) -> Result<String> {
        let result = self.exec.run(
            "docker node ls --format 'table {{.Hostname}}\t{{.Status}}\t{{.Availability}}\t{{.ManagerStatus}}'",
        )?;
        Ok(result.stdout)
    }
}

// Field order is a hard contract with the --format strings above.
fn parse_task_lines(stdout: &str) -> Vec<TaskStatus> {
    let mut tasks = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() >= 6 {
            tasks.push(TaskStatus {
                id: parts[0].to_string(),
                name: parts[1].to_string(),
                image: parts[2].to_string(),
                node: parts[3].to_string(),
                desired_state: parts[4].to_string(),
                current_state: parts[5].to_string(),
                error: parts.get(6).unwrap_or(&"").to_string(),
            });
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::StubExecutor;

    #[test]
    fn is_initialized_checks_node_state() {
        let exec = StubExecutor::new().ok("active\n");
        assert!(SwarmOps::new(&exec, "myapp").is_initialized().unwrap());

        let exec = StubExecutor::new().ok("inactive\n");
        assert!(!SwarmOps::new(&exec, "myapp").is_initialized().unwrap());
    }

    #[test]
    fn init_surfaces_failure() {
        let exec = StubExecutor::new().exit(1, "already part of a swarm");
        let err = SwarmOps::new(&exec, "myapp").init().unwrap_err();
        assert_eq!(err.code(), "COMMAND_FAILED");
    }

    #[test]
    fn create_network_is_idempotent() {
        let exec = StubExecutor::new().ok("myapp-net\n");
        SwarmOps::new(&exec, "myapp").create_network("myapp-net").unwrap();
        assert_eq!(exec.commands().len(), 1);
    }

    #[test]
    fn create_network_creates_when_missing() {
        let exec = StubExecutor::new().ok("").ok("");
        SwarmOps::new(&exec, "myapp").create_network("myapp-net").unwrap();

        let commands = exec.commands();
        assert_eq!(
            commands[1],
            "docker network create --driver overlay --attachable myapp-net"
        );
    }

    #[test]
    fn registry_login_skips_without_credentials() {
        let exec = StubExecutor::new();
        SwarmOps::new(&exec, "myapp")
            .registry_login("ghcr.io", "", "")
            .unwrap();
        assert!(exec.commands().is_empty());
    }

    #[test]
    fn registry_login_pipes_quoted_password() {
        let exec = StubExecutor::new().ok("Login Succeeded\n");
        SwarmOps::new(&exec, "myapp")
            .registry_login("ghcr.io", "deployer", "p@ss 'word'")
            .unwrap();

        let cmd = &exec.commands()[0];
        assert!(cmd.contains("--password-stdin"));
        assert!(cmd.contains("'p@ss '\\''word'\\'''"));
    }

    #[test]
    fn stack_tasks_parse_pipe_delimited_fields() {
        let exec = StubExecutor::new().ok(
            "t1|myapp_web.1|nginx:1.27|node-1|Running|Running 2 hours ago|\nt2|myapp_web.2|nginx:1.27|node-2|Running|Failed 5 minutes ago|non-zero exit\n",
        );
        let tasks = SwarmOps::new(&exec, "myapp").stack_tasks().unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].node, "node-1");
        assert_eq!(tasks[0].error, "");
        assert_eq!(tasks[1].error, "non-zero exit");
    }

    #[test]
    fn convergence_requires_all_running() {
        let exec = StubExecutor::new().ok("Running 2 hours ago\nRunning 1 minute ago\n");
        assert!(SwarmOps::new(&exec, "myapp").is_converged().unwrap());

        let exec = StubExecutor::new().ok("Running 2 hours ago\nStarting 3 seconds ago\n");
        assert!(!SwarmOps::new(&exec, "myapp").is_converged().unwrap());
    }
}
