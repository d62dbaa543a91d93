use clap::Args;

use dockhand::config::DeploymentMode;
use dockhand::deploy::{self, StackManager};
use dockhand::utils::shell;
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct ExecArgs {
    /// Service name
    service: String,

    /// Command to run (defaults to an interactive shell)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

pub fn run(args: ExecArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    let exec = commands::connect(&cfg, global)?;
    let result = exec_in_service(&cfg, exec.as_ref(), &args);
    exec.close().ok();
    result
}

fn exec_in_service(
    cfg: &dockhand::Config,
    exec: &dyn dockhand::Executor,
    args: &ExecArgs,
) -> Result<()> {
    let command = if args.command.is_empty() {
        vec!["sh".to_string()]
    } else {
        args.command.clone()
    };

    let manager = deploy::from_config(cfg, exec);

    println!("Finding container for service {}...", args.service);
    let info = manager.find_running_container_with_node(&args.service)?;

    let docker_exec = format!(
        "docker exec -it {} {}",
        info.container_id,
        shell::join_args(&command)
    );

    // Under swarm the task may live on a worker node that is only
    // reachable through the connected manager; hop to it with the
    // forwarded agent when that is the case.
    if cfg.mode == DeploymentMode::Swarm {
        if let Some(node) = &info.node_name {
            let local_hostname = manager.current_node_hostname()?;
            if *node != local_hostname {
                let ssh = exec
                    .as_ssh()
                    .ok_or_else(|| dockhand::Error::NotFound(format!(
                        "task for {} runs on node {}, which is only reachable over SSH",
                        args.service, node
                    )))?;
                println!("Task runs on {}; hopping via {}", node, ssh.host());
                return ssh.run_interactive_via_host(node, ssh.user(), &docker_exec);
            }
        }
    }

    exec.run_interactive(&docker_exec)
}
