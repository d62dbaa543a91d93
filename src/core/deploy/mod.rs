// Backend-polymorphic deployment orchestration. The strategy is selected
// once from configuration; callers never branch on the backend again.

mod compose;
mod swarm;

use std::io::Write;

pub use compose::ComposeManager;
pub use swarm::SwarmManager;

use crate::config::{Config, DeploymentMode};
use crate::error::Result;
use crate::executor::Executor;

/// Live status of one service. Always derived from the backend, never
/// cached.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub name: String,
    pub mode: String,
    pub replicas: String,
    pub image: String,
    pub ports: String,
}

/// Live status of one container or task.
#[derive(Debug, Clone)]
pub struct ContainerStatus {
    pub id: String,
    pub name: String,
    pub service: String,
    pub state: String,
    pub error: String,
}

/// A running container resolved for a service, with placement when the
/// backend exposes it.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub container_id: String,
    pub node_name: Option<String>,
    pub node_ip: Option<String>,
}

/// Whether a replica descriptor such as "2/3" counts as running.
///
/// Deliberately lenient: any non-zero numerator counts, even past the
/// desired count. Full convergence is not required.
pub fn replicas_running(replicas: &str) -> bool {
    replicas
        .split('/')
        .next()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .is_some_and(|n| n > 0)
}

/// Uniform operation set over both backends.
pub trait StackManager {
    /// Deploy the stack from declarative content.
    fn deploy(&self, compose_content: &[u8]) -> Result<()>;

    /// Remove the stack.
    fn remove(&self) -> Result<()>;

    /// Whether the stack is currently deployed.
    fn exists(&self) -> Result<bool>;

    /// All services in the stack.
    fn list_services(&self) -> Result<Vec<ServiceStatus>>;

    /// Collected logs from a service.
    fn get_service_logs(&self, service_name: &str, since: &str, tail: u32) -> Result<String>;

    /// Stream logs from a service into the provided sinks.
    fn stream_service_logs(
        &self,
        service_name: &str,
        follow: bool,
        tail: u32,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<()>;

    /// A short container id suitable for `docker exec`.
    fn find_running_container(&self, service_name: &str) -> Result<String>;

    /// Like `find_running_container`, with placement information when the
    /// backend tracks it.
    fn find_running_container_with_node(&self, service_name: &str) -> Result<ContainerInfo>;

    /// Hostname of the node this executor is talking to.
    fn current_node_hostname(&self) -> Result<String>;

    /// Container/task status for all services.
    fn get_container_status(&self) -> Result<Vec<ContainerStatus>>;

    fn supports_rollback(&self) -> bool;

    fn supports_scale(&self) -> bool;

    /// Roll back one service to its previous version.
    fn rollback_service(&self, service_name: &str) -> Result<()>;

    /// Roll back every service in the stack.
    fn rollback_all(&self) -> Result<()>;

    /// Scale a service to the given replica count.
    fn scale_service(&self, service_name: &str, replicas: u32) -> Result<()>;

    fn stack_name(&self) -> &str;

    fn mode(&self) -> DeploymentMode;
}

/// Create the strategy for the configured mode. Swarm is the default when
/// nothing is specified.
pub fn from_config<'a>(cfg: &Config, exec: &'a dyn Executor) -> Box<dyn StackManager + 'a> {
    match cfg.mode {
        DeploymentMode::Compose => Box::new(ComposeManager::new(exec, &cfg.stack)),
        DeploymentMode::Swarm => Box::new(SwarmManager::new(exec, &cfg.stack)),
    }
}
