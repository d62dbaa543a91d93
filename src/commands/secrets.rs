use std::path::Path;

use clap::{Args, Subcommand};

use dockhand::secrets::{self, SecretsManager};
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct SecretsArgs {
    #[command(subcommand)]
    command: SecretsCommand,
}

#[derive(Subcommand)]
pub enum SecretsCommand {
    /// Push configured secrets from .env or the environment
    Push {
        /// Dotenv file to read values from
        #[arg(long, default_value = ".env")]
        env_file: String,
    },
    /// List secrets for this stack
    List,
    /// Delete a secret
    Delete { name: String },
}

pub fn run(args: SecretsArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    let exec = commands::connect(&cfg, global)?;
    let result = (|| {
        let manager = SecretsManager::new(exec.as_ref(), &cfg.stack);

        match &args.command {
            SecretsCommand::Push { env_file } => {
                if cfg.secrets.is_empty() {
                    println!("No secrets configured");
                    return Ok(());
                }

                let path = Path::new(env_file);
                let secret_list = if path.exists() {
                    secrets::load_from_env_file(path, &cfg.secrets)?
                } else {
                    secrets::load_from_env(&cfg.secrets)
                };

                if secret_list.is_empty() {
                    println!("No secret values found for the configured names");
                    return Ok(());
                }

                for secret in &secret_list {
                    match manager.create(&secret.name, &secret.value) {
                        Ok(()) => println!("  {} ok", secret.name),
                        Err(e) => eprintln!("  {} failed: {}", secret.name, e),
                    }
                }
            }
            SecretsCommand::List => {
                let names = manager.list()?;
                if names.is_empty() {
                    println!("No secrets found for stack {}", cfg.stack);
                } else {
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
            SecretsCommand::Delete { name } => {
                manager.delete(name)?;
                println!("Deleted {}", name);
            }
        }
        Ok(())
    })();
    exec.close().ok();
    result
}
