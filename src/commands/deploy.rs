use clap::Args;

use dockhand::composefile;
use dockhand::config::{self, DeploymentMode};
use dockhand::deploy::{self, StackManager};
use dockhand::secrets::{self, SecretsManager};
use dockhand::swarm::SwarmOps;
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct DeployArgs {
    /// Deploy only this service
    #[arg(short, long)]
    service: Option<String>,
}

pub fn run(args: DeployArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;
    cfg.validate()?;

    println!("Stack: {} ({} mode)", cfg.stack, cfg.mode);

    let mut compose_content = config::load_compose_file(&cfg.compose_file)?;

    let exec = commands::connect(&cfg, global)?;
    let result = deploy_stack(&cfg, exec.as_ref(), &args, &mut compose_content);
    exec.close().ok();
    result
}

fn deploy_stack(
    cfg: &dockhand::Config,
    exec: &dyn dockhand::Executor,
    args: &DeployArgs,
    compose_content: &mut Vec<u8>,
) -> Result<()> {
    // Push configured secrets first; individual failures warn but never
    // stop the deploy.
    if !cfg.secrets.is_empty() {
        let secret_list = if std::path::Path::new(".env").exists() {
            secrets::load_from_env_file(std::path::Path::new(".env"), &cfg.secrets)?
        } else {
            secrets::load_from_env(&cfg.secrets)
        };

        if !secret_list.is_empty() {
            println!("Pushing {} secret(s)...", secret_list.len());
            let manager = SecretsManager::new(exec, &cfg.stack);
            for secret in &secret_list {
                match manager.create(&secret.name, &secret.value) {
                    Ok(()) => println!("  {} ok", secret.name),
                    Err(e) => eprintln!("  {} failed: {}", secret.name, e),
                }
            }
        }
    }

    if !cfg.registry.url.is_empty() && !cfg.registry.username.is_empty() {
        println!("Logging into registry {}...", cfg.registry.url);
        SwarmOps::new(exec, &cfg.stack).registry_login(
            &cfg.registry.url,
            &cfg.registry.username,
            &cfg.registry.password,
        )?;
    }

    if let Some(service) = &args.service {
        println!("Deploying service {} in stack {}...", service, cfg.stack);
        *compose_content = composefile::filter_service(compose_content, service);
    } else {
        println!("Deploying stack {}...", cfg.stack);
    }

    let manager = deploy::from_config(cfg, exec);
    manager.deploy(compose_content)?;
    println!("Stack deployed");

    if cfg.mode == DeploymentMode::Swarm {
        let ops = SwarmOps::new(exec, &cfg.stack);
        match ops.is_converged() {
            Ok(true) => println!("All tasks running"),
            Ok(false) => println!("Some tasks are still starting"),
            Err(_) => {}
        }
    }

    println!("\nServices:");
    match manager.list_services() {
        Ok(services) => commands::print_service_table(&services),
        Err(e) => eprintln!("  failed to list services: {}", e),
    }

    Ok(())
}
