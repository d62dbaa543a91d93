pub mod accessory;
pub mod deploy;
pub mod exec;
pub mod logs;
pub mod remove;
pub mod rollback;
pub mod scale;
pub mod secrets;
pub mod setup;
pub mod status;

use clap::Args;

use dockhand::config::{self, Config};
use dockhand::executor::{self, Executor};
use dockhand::log_status;
use dockhand::Result;

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Config file path
    #[arg(short, long, global = true, default_value = "dockhand.yaml")]
    pub config: String,

    /// Deployment destination (e.g. staging, production); uses
    /// dockhand.<destination>.yaml
    #[arg(short, long, global = true)]
    pub destination: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn config_path(&self) -> String {
        match &self.destination {
            Some(dest) if self.config == "dockhand.yaml" => format!("dockhand.{}.yaml", dest),
            _ => self.config.clone(),
        }
    }

    pub fn load_config(&self) -> Result<Config> {
        config::load(&self.config_path())
    }
}

/// Build the executor for this invocation: one connection, released by the
/// caller when the command finishes.
pub fn connect(cfg: &Config, global: &GlobalArgs) -> Result<Box<dyn Executor>> {
    let exec = executor::from_config(cfg)?;
    exec.set_verbose(global.verbose);

    if exec.is_local() {
        log_status!("connect", "Running locally");
    } else {
        log_status!("connect", "Connected to {}", cfg.ssh.host);
    }
    Ok(exec)
}

pub fn print_service_table(services: &[dockhand::deploy::ServiceStatus]) {
    println!("  {:<30} {:<12} {:<15} {}", "NAME", "MODE", "REPLICAS", "IMAGE");
    for service in services {
        println!(
            "  {:<30} {:<12} {:<15} {}",
            service.name,
            service.mode,
            service.replicas,
            truncate(&service.image, 50)
        );
    }
}

pub fn truncate(value: &str, max_len: usize) -> String {
    if value.chars().count() > max_len {
        let head: String = value.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}
