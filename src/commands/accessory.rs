use clap::{Args, Subcommand};

use dockhand::accessories::AccessoryManager;
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct AccessoryArgs {
    #[command(subcommand)]
    command: AccessoryCommand,
}

#[derive(Subcommand)]
pub enum AccessoryCommand {
    /// Start an accessory service
    Start { name: String },
    /// Stop an accessory service
    Stop { name: String },
    /// Restart an accessory service
    Restart { name: String },
    /// Show accessory status (all configured accessories if no name given)
    Status { name: Option<String> },
}

pub fn run(args: AccessoryArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    let exec = commands::connect(&cfg, global)?;
    let result = (|| {
        let manager = AccessoryManager::new(exec.as_ref(), &cfg.stack, cfg.mode);

        match &args.command {
            AccessoryCommand::Start { name } => {
                manager.start(name)?;
                println!("Started {}", name);
            }
            AccessoryCommand::Stop { name } => {
                manager.stop(name)?;
                println!("Stopped {}", name);
            }
            AccessoryCommand::Restart { name } => {
                manager.restart(name)?;
                println!("Restarted {}", name);
            }
            AccessoryCommand::Status { name: Some(name) } => {
                let status = manager.status(name)?;
                print_status_table(&[status]);
            }
            AccessoryCommand::Status { name: None } => {
                if cfg.accessories.is_empty() {
                    println!("No accessories configured");
                    return Ok(());
                }
                let statuses = manager.list_all(&cfg.accessories);
                print_status_table(&statuses);
            }
        }
        Ok(())
    })();
    exec.close().ok();
    result
}

fn print_status_table(statuses: &[dockhand::accessories::AccessoryStatus]) {
    println!("  {:<20} {:<15} {}", "NAME", "REPLICAS", "RUNNING");
    for status in statuses {
        println!(
            "  {:<20} {:<15} {}",
            status.name,
            status.replicas,
            if status.running { "yes" } else { "no" }
        );
    }
}
