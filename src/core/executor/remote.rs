use std::cell::Cell;
use std::io::Write;

use super::{CommandResult, Executor};
use crate::config::SshConfig;
use crate::error::Result;
use crate::ssh::SshClient;

/// Executes commands on a remote machine over an SSH connection.
pub struct SshExecutor {
    client: SshClient,
    verbose: Cell<bool>,
}

impl SshExecutor {
    /// Connect to the configured host and wrap the connection.
    pub fn connect(cfg: &SshConfig) -> Result<Self> {
        let client = SshClient::connect(&cfg.host, cfg.port, &cfg.user, &cfg.key)?;
        Ok(Self {
            client,
            verbose: Cell::new(false),
        })
    }

    pub fn host(&self) -> &str {
        &self.client.host
    }

    pub fn user(&self) -> &str {
        &self.client.user
    }

    pub fn port(&self) -> u16 {
        self.client.port
    }

    /// True when an agent connection is available for forwarding.
    pub fn has_agent_forwarding(&self) -> bool {
        self.client.has_agent_forwarding()
    }

    /// Run a command on a host reachable only through this connection.
    pub fn run_interactive_via_host(&self, host: &str, user: &str, cmd: &str) -> Result<()> {
        self.client.run_interactive_via_host(host, user, cmd)
    }
}

impl Executor for SshExecutor {
    fn run(&self, cmd: &str) -> Result<CommandResult> {
        if self.verbose.get() {
            eprintln!("→ Running on {}: {}", self.client.host, cmd);
        }

        let result = self.client.run(cmd)?;

        if self.verbose.get() {
            if !result.stdout.is_empty() {
                eprintln!("→ Stdout:\n{}", result.stdout);
            }
            if !result.stderr.is_empty() {
                eprintln!("→ Stderr:\n{}", result.stderr);
            }
            eprintln!("→ Exit code: {}", result.exit_code);
        }

        Ok(result)
    }

    fn run_interactive(&self, cmd: &str) -> Result<()> {
        self.client.run_interactive(cmd)
    }

    fn run_stream(
        &self,
        cmd: &str,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<()> {
        self.client.run_stream(cmd, stdout, stderr)
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.client.write_file(path, content)
    }

    fn close(&self) -> Result<()> {
        self.client.close();
        Ok(())
    }

    fn is_local(&self) -> bool {
        false
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.set(verbose);
    }

    fn as_ssh(&self) -> Option<&SshExecutor> {
        Some(self)
    }
}
