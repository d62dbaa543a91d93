// Unified command execution - routes to a local shell or an SSH connection
// based on configuration. Everything above this layer is transport-agnostic.

mod local;
mod remote;

use std::io::Write;

pub use local::LocalExecutor;
pub use remote::SshExecutor;

use crate::config::Config;
use crate::error::Result;

/// The outcome of a completed command.
///
/// Present whenever the command actually ran: a non-zero exit status is a
/// normal result, not an error.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Uniform command execution over either transport.
pub trait Executor {
    /// Execute a command to completion and capture its output. Only a
    /// spawn or transport failure is an error.
    fn run(&self, cmd: &str) -> Result<CommandResult>;

    /// Execute a command with the caller's standard streams attached
    /// (remote transports negotiate a pseudo-terminal).
    fn run_interactive(&self, cmd: &str) -> Result<()>;

    /// Execute a command, streaming output into the provided sinks
    /// without buffering the full output.
    fn run_stream(
        &self,
        cmd: &str,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<()>;

    /// Deliver bytes to a path, fully flushed before returning.
    fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Release any underlying resources. Idempotent.
    fn close(&self) -> Result<()>;

    /// True when commands run on the local machine.
    fn is_local(&self) -> bool;

    /// Toggle command echoing to stderr.
    fn set_verbose(&self, verbose: bool);

    /// Access the SSH transport when this executor is remote, for
    /// operations that only make sense there (agent-forwarded hops).
    fn as_ssh(&self) -> Option<&SshExecutor> {
        None
    }
}

/// Create an Executor from the configuration: no SSH host means local
/// execution, otherwise a connection is established up front.
pub fn from_config(cfg: &Config) -> Result<Box<dyn Executor>> {
    if cfg.ssh.host.is_empty() {
        Ok(Box::new(LocalExecutor::new()))
    } else {
        Ok(Box::new(SshExecutor::connect(&cfg.ssh)?))
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Write;

    use super::{CommandResult, Executor};
    use crate::error::{Error, Result};

    /// Scripted executor for manager tests: responses are consumed in
    /// order, every command is recorded, file writes are captured.
    pub struct StubExecutor {
        script: RefCell<VecDeque<Result<CommandResult>>>,
        commands: RefCell<Vec<String>>,
        files: RefCell<Vec<(String, Vec<u8>)>>,
    }

    impl StubExecutor {
        pub fn new() -> Self {
            Self {
                script: RefCell::new(VecDeque::new()),
                commands: RefCell::new(Vec::new()),
                files: RefCell::new(Vec::new()),
            }
        }

        /// Queue a successful response with the given stdout.
        pub fn ok(self, stdout: &str) -> Self {
            self.script.borrow_mut().push_back(Ok(CommandResult {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            }));
            self
        }

        /// Queue a completed-but-failed response.
        pub fn exit(self, code: i32, stderr: &str) -> Self {
            self.script.borrow_mut().push_back(Ok(CommandResult {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code: code,
            }));
            self
        }

        /// Queue a transport-level failure.
        pub fn err(self, msg: &str) -> Self {
            self.script
                .borrow_mut()
                .push_back(Err(Error::Ssh(msg.to_string())));
            self
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.borrow().clone()
        }

        pub fn written(&self) -> Vec<(String, Vec<u8>)> {
            self.files.borrow().clone()
        }
    }

    impl Executor for StubExecutor {
        fn run(&self, cmd: &str) -> Result<CommandResult> {
            self.commands.borrow_mut().push(cmd.to_string());
            match self.script.borrow_mut().pop_front() {
                Some(response) => response,
                None => Ok(CommandResult::default()),
            }
        }

        fn run_interactive(&self, cmd: &str) -> Result<()> {
            self.commands.borrow_mut().push(cmd.to_string());
            Ok(())
        }

        fn run_stream(
            &self,
            cmd: &str,
            stdout: &mut (dyn Write + Send),
            _stderr: &mut (dyn Write + Send),
        ) -> Result<()> {
            self.commands.borrow_mut().push(cmd.to_string());
            if let Some(response) = self.script.borrow_mut().pop_front() {
                let result = response?;
                stdout.write_all(result.stdout.as_bytes())?;
            }
            Ok(())
        }

        fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
            self.files
                .borrow_mut()
                .push((path.to_string(), content.to_vec()));
            Ok(())
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }

        fn is_local(&self) -> bool {
            true
        }

        fn set_verbose(&self, _verbose: bool) {}
    }
}
