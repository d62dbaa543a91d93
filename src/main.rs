use clap::{Parser, Subcommand};

mod commands;

use commands::{
    accessory, deploy, exec, logs, remove, rollback, scale, secrets, setup, status, GlobalArgs,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(version = VERSION)]
#[command(about = "Deploy and manage containerized stacks over SSH")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the target host (engine check, swarm init, network, registry)
    Setup(setup::SetupArgs),
    /// Deploy the stack
    Deploy(deploy::DeployArgs),
    /// Remove the stack
    Remove(remove::RemoveArgs),
    /// Roll back to the previous version
    Rollback(rollback::RollbackArgs),
    /// Show stack status
    Status(status::StatusArgs),
    /// Show or follow service logs
    Logs(logs::LogsArgs),
    /// Execute a command in a running container
    Exec(exec::ExecArgs),
    /// Scale a service to a replica count
    Scale(scale::ScaleArgs),
    /// Manage accessory services
    Accessory(accessory::AccessoryArgs),
    /// Manage stack secrets
    Secrets(secrets::SecretsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Setup(args) => setup::run(args, &cli.global),
        Commands::Deploy(args) => deploy::run(args, &cli.global),
        Commands::Remove(args) => remove::run(args, &cli.global),
        Commands::Rollback(args) => rollback::run(args, &cli.global),
        Commands::Status(args) => status::run(args, &cli.global),
        Commands::Logs(args) => logs::run(args, &cli.global),
        Commands::Exec(args) => exec::run(args, &cli.global),
        Commands::Scale(args) => scale::run(args, &cli.global),
        Commands::Accessory(args) => accessory::run(args, &cli.global),
        Commands::Secrets(args) => secrets::run(args, &cli.global),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            std::process::ExitCode::FAILURE
        }
    }
}
