use clap::Args;

use dockhand::config::DeploymentMode;
use dockhand::swarm::SwarmOps;
use dockhand::{Error, Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct SetupArgs {
    /// Skip overlay network creation
    #[arg(long)]
    skip_network: bool,
}

pub fn run(args: SetupArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;
    cfg.validate()?;

    let exec = commands::connect(&cfg, global)?;
    let result = (|| {
        let ops = SwarmOps::new(exec.as_ref(), &cfg.stack);

        if !ops.is_docker_installed()? {
            return Err(Error::Other(
                "docker is not installed on the target host".to_string(),
            ));
        }
        println!("Found {}", ops.docker_version()?);

        if cfg.mode == DeploymentMode::Swarm {
            if ops.is_initialized()? {
                println!("Swarm already initialized");
            } else {
                println!("Initializing swarm...");
                ops.init()?;
            }

            if !args.skip_network {
                let network = format!("{}-net", cfg.stack);
                println!("Ensuring overlay network {}...", network);
                ops.create_network(&network)?;
            }
        }

        if !cfg.registry.url.is_empty() && !cfg.registry.username.is_empty() {
            println!("Logging into registry {}...", cfg.registry.url);
            ops.registry_login(
                &cfg.registry.url,
                &cfg.registry.username,
                &cfg.registry.password,
            )?;
        }

        println!("Setup complete");
        Ok(())
    })();
    exec.close().ok();
    result
}
