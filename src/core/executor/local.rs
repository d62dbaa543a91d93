use std::cell::Cell;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use super::{CommandResult, Executor};
use crate::error::{Error, Result};

/// Executes commands on the local machine through `sh -c`.
pub struct LocalExecutor {
    verbose: Cell<bool>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            verbose: Cell::new(false),
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for LocalExecutor {
    fn run(&self, cmd: &str) -> Result<CommandResult> {
        if self.verbose.get() {
            eprintln!("→ Running: {}", cmd);
        }

        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .map_err(|e| Error::Other(format!("failed to spawn command: {}", e)))?;

        let result = CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

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
        let status = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Error::Other(format!("failed to spawn command: {}", e)))?;

        if !status.success() {
            return Err(Error::command_failed(cmd, status.code().unwrap_or(-1), ""));
        }
        Ok(())
    }

    fn run_stream(
        &self,
        cmd: &str,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<()> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Other(format!("failed to spawn command: {}", e)))?;

        let (Some(mut child_stdout), Some(mut child_stderr)) =
            (child.stdout.take(), child.stderr.take())
        else {
            return Err(Error::Other("failed to capture command output".to_string()));
        };

        // Both pipes are drained concurrently so neither can fill up and
        // stall the child.
        thread::scope(|scope| {
            let err_pump = scope.spawn(move || copy_stream(&mut child_stderr, stderr));
            copy_stream(&mut child_stdout, stdout);
            err_pump.join().ok();
        });

        let status = child
            .wait()
            .map_err(|e| Error::Other(format!("failed to wait for command: {}", e)))?;
        if !status.success() {
            return Err(Error::command_failed(cmd, status.code().unwrap_or(-1), ""));
        }
        Ok(())
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        std::fs::write(path, content)?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_local(&self) -> bool {
        true
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.set(verbose);
    }
}

// Sink errors (e.g. the consumer went away mid-follow) end the stream;
// they are not worth failing the command over.
fn copy_stream(from: &mut dyn Read, to: &mut (dyn Write + Send)) {
    let mut buf = [0u8; 8192];
    loop {
        match from.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if to.write_all(&buf[..n]).is_err() {
                    break;
                }
            }
        }
    }
}
