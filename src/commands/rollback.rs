use clap::Args;

use dockhand::config::DeploymentMode;
use dockhand::deploy::{self, StackManager};
use dockhand::history::{HistoryManager, DEFAULT_LIST_LIMIT};
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct RollbackArgs {
    /// Roll back only this service (swarm mode; compose rollback is
    /// always whole-stack)
    service: Option<String>,

    /// Show recent deploy history instead of rolling back (compose mode)
    #[arg(long)]
    list: bool,
}

pub fn run(args: RollbackArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    let exec = commands::connect(&cfg, global)?;
    let result = rollback(&cfg, exec.as_ref(), &args);
    exec.close().ok();
    result
}

fn rollback(
    cfg: &dockhand::Config,
    exec: &dyn dockhand::Executor,
    args: &RollbackArgs,
) -> Result<()> {
    let manager = deploy::from_config(cfg, exec);

    println!("Stack: {} ({} mode)", cfg.stack, manager.mode());

    if args.list {
        if cfg.mode != DeploymentMode::Compose {
            println!("Deploy history is tracked by the engine in swarm mode; nothing to list");
            return Ok(());
        }
        let history = HistoryManager::new(exec, &cfg.stack);
        let records = history.list(DEFAULT_LIST_LIMIT)?;
        if records.is_empty() {
            println!("No deploys recorded");
            return Ok(());
        }
        println!("  {:<5} {:<25} {}", "ID", "DEPLOYED AT", "IMAGES");
        for record in records {
            let images = record
                .images
                .values()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "  {:<5} {:<25} {}",
                record.id,
                record.deployed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                commands::truncate(&images, 60)
            );
        }
        return Ok(());
    }

    if !manager.exists()? {
        println!("Stack {} not found", cfg.stack);
        return Ok(());
    }

    match cfg.mode {
        DeploymentMode::Compose => {
            if args.service.is_some() {
                println!("In compose mode, rollback affects all services (individual service rollback not supported)");
            }
            println!("Rolling back to previous deploy...");
            manager.rollback_all()?;
        }
        DeploymentMode::Swarm => match &args.service {
            Some(service) => {
                println!("Rolling back {}...", service);
                manager.rollback_service(service)?;
            }
            None => {
                println!("Rolling back all services...");
                manager.rollback_all()?;
            }
        },
    }

    println!("\nServices after rollback:");
    match manager.list_services() {
        Ok(services) => commands::print_service_table(&services),
        Err(e) => eprintln!("  failed to list services: {}", e),
    }

    println!("\nRollback completed");
    Ok(())
}
