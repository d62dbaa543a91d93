use std::io;

use clap::Args;

use dockhand::deploy::{self, StackManager};
use dockhand::{Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct LogsArgs {
    /// Service name
    service: String,

    /// Follow log output
    #[arg(short, long)]
    follow: bool,

    /// Number of lines to show from the end of the logs
    #[arg(short = 'n', long, default_value = "100")]
    tail: u32,

    /// Only logs since this time (e.g. 10m, 2h)
    #[arg(long, default_value = "")]
    since: String,
}

pub fn run(args: LogsArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    let exec = commands::connect(&cfg, global)?;
    let result = (|| {
        let manager = deploy::from_config(&cfg, exec.as_ref());

        if args.follow {
            // Blocks for the duration of the follow; interruption by the
            // caller ends it benignly.
            let mut stdout = io::stdout();
            let mut stderr = io::stderr();
            manager.stream_service_logs(
                &args.service,
                true,
                args.tail,
                &mut stdout,
                &mut stderr,
            )
        } else {
            let logs = manager.get_service_logs(&args.service, &args.since, args.tail)?;
            print!("{}", logs);
            Ok(())
        }
    })();
    exec.close().ok();
    result
}
