use clap::Args;

use dockhand::deploy::{self, StackManager};
use dockhand::history::HistoryManager;
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct RemoveArgs {
    /// Also remove the deploy-history container and its data
    #[arg(long)]
    with_history: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

pub fn run(args: RemoveArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    if !args.yes {
        let answer = dockhand::tty::confirm(&format!(
            "Remove stack {}? This stops all services (yes/no) ",
            cfg.stack
        ))?;
        if !answer {
            println!("Aborted");
            return Ok(());
        }
    }

    let exec = commands::connect(&cfg, global)?;
    let result = (|| {
        let manager = deploy::from_config(&cfg, exec.as_ref());
        manager.remove()?;
        println!("Stack {} removed", cfg.stack);

        // The history sidecar survives a stack removal unless explicitly
        // asked for; it is the only place rollback data lives.
        if args.with_history {
            HistoryManager::new(exec.as_ref(), &cfg.stack).remove();
            println!("Deploy history removed");
        }
        Ok(())
    })();
    exec.close().ok();
    result
}
