use clap::Args;

use dockhand::deploy::{self, StackManager};
use dockhand::{Error, Executor, Result};

use crate::commands::{self, GlobalArgs};

#[derive(Args)]
pub struct ScaleArgs {
    /// Service name
    service: String,

    /// Desired replica count
    replicas: u32,
}

pub fn run(args: ScaleArgs, global: &GlobalArgs) -> Result<()> {
    let cfg = global.load_config()?;

    let exec = commands::connect(&cfg, global)?;
    let result = (|| {
        let manager = deploy::from_config(&cfg, exec.as_ref());

        match manager.scale_service(&args.service, args.replicas) {
            Ok(()) => {
                println!("Scaled {} to {} replicas", args.service, args.replicas);
                Ok(())
            }
            // Capability gaps are structural, not string-matched: tell
            // the user what to do instead of passing the raw error up.
            Err(Error::Unsupported { operation, mode }) => {
                println!(
                    "{} is not supported in {} mode; change the replica count in the compose file and redeploy",
                    operation, mode
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    })();
    exec.close().ok();
    result
}
