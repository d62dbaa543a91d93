use clap::Args;

use dockhand::config::DeploymentMode;
use dockhand::deploy::{self, StackManager};
use dockhand::swarm::SwarmOps;
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct StatusArgs {
    /// Show detailed status for this service only
    service: Option<String>,
}

pub fn run(args: StatusArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    let exec = commands::connect(&cfg, global)?;
    let result = status(&cfg, exec.as_ref(), &args);
    exec.close().ok();
    result
}

fn status(cfg: &dockhand::Config, exec: &dyn dockhand::Executor, args: &StatusArgs) -> Result<()> {
    let manager = deploy::from_config(cfg, exec);

    if !manager.exists()? {
        println!("Stack {} not found. Run 'dockhand deploy' first.", cfg.stack);
        return Ok(());
    }

    println!("Stack: {} ({} mode)\n", cfg.stack, manager.mode());

    if let Some(service) = &args.service {
        return service_status(cfg, exec, manager.as_ref(), service);
    }

    println!("Services:");
    let services = manager.list_services()?;
    println!("  {:<30} {:<12} {:<15} {}", "NAME", "MODE", "REPLICAS", "PORTS");
    for service in &services {
        let marker = if deploy::replicas_running(&service.replicas) {
            " "
        } else {
            "!"
        };
        println!(
            "{} {:<30} {:<12} {:<15} {}",
            marker, service.name, service.mode, service.replicas, service.ports
        );
    }

    match cfg.mode {
        DeploymentMode::Compose => print_containers(manager.as_ref())?,
        DeploymentMode::Swarm => print_tasks(&SwarmOps::new(exec, &cfg.stack))?,
    }

    Ok(())
}

fn service_status(
    cfg: &dockhand::Config,
    exec: &dyn dockhand::Executor,
    manager: &dyn StackManager,
    service: &str,
) -> Result<()> {
    println!("Service: {}\n", service);

    match cfg.mode {
        DeploymentMode::Compose => {
            let containers: Vec<_> = manager
                .get_container_status()?
                .into_iter()
                .filter(|c| c.service == service)
                .collect();

            if containers.is_empty() {
                println!("  No containers found for service {}", service);
                return Ok(());
            }

            println!("  {:<15} {:<25} {:<20} {}", "ID", "NAME", "SERVICE", "STATE");
            for c in containers {
                println!(
                    "  {:<15} {:<25} {:<20} {}",
                    commands::truncate(&c.id, 12),
                    commands::truncate(&c.name, 25),
                    c.service,
                    c.state
                );
            }
        }
        DeploymentMode::Swarm => {
            let tasks = SwarmOps::new(exec, &cfg.stack).service_tasks(service)?;
            if tasks.is_empty() {
                println!("  No tasks found for service {}", service);
                return Ok(());
            }

            println!(
                "  {:<15} {:<25} {:<15} {:<25} {}",
                "ID", "NAME", "NODE", "STATE", "ERROR"
            );
            for task in tasks {
                println!(
                    "  {:<15} {:<25} {:<15} {:<25} {}",
                    commands::truncate(&task.id, 12),
                    commands::truncate(&task.name, 25),
                    task.node,
                    task.current_state,
                    task.error
                );
            }
        }
    }
    Ok(())
}

fn print_containers(manager: &dyn StackManager) -> Result<()> {
    println!("\nContainers:");
    let containers = manager.get_container_status()?;
    if containers.is_empty() {
        println!("  No containers running");
        return Ok(());
    }

    println!("  {:<15} {:<25} {:<20} {}", "ID", "NAME", "SERVICE", "STATE");
    for c in containers {
        println!(
            "  {:<15} {:<25} {:<20} {}",
            commands::truncate(&c.id, 12),
            commands::truncate(&c.name, 25),
            c.service,
            c.state
        );
    }
    Ok(())
}

fn print_tasks(ops: &SwarmOps) -> Result<()> {
    println!("\nTasks:");
    let tasks = ops.stack_tasks()?;
    if tasks.is_empty() {
        println!("  No tasks running");
        return Ok(());
    }

    println!(
        "  {:<15} {:<25} {:<15} {:<25} {}",
        "ID", "NAME", "NODE", "STATE", "ERROR"
    );
    for task in tasks {
        println!(
            "  {:<15} {:<25} {:<15} {:<25} {}",
            commands::truncate(&task.id, 12),
            commands::truncate(&task.name, 25),
            task.node,
            task.current_state,
            task.error
        );
    }
    Ok(())
}
