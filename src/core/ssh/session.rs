use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use ssh2::{Channel, PtyModeOpcode, PtyModes};

use super::client::SshClient;
use crate::error::{Error, Result};
use crate::executor::CommandResult;
use crate::utils::shell;
use crate::utils::validation::validate_identifier;

/// Idle delay between polls while pumping a non-blocking channel.
const PUMP_IDLE: Duration = Duration::from_millis(15);

/// Validate a hop target (host or user) before it is spliced into a nested
/// ssh invocation. Alphanumerics and underscores only, bounded length.
pub fn validate_hop_param(param: &str) -> Result<()> {
    validate_identifier(param)
}

// Everything that must hold before a hop opens a channel: parameter
// allow-list and an agent connection to forward. No weaker fallback.
fn precheck_hop(agent_available: bool, target_host: &str, target_user: &str) -> Result<()> {
    validate_hop_param(target_host)?;
    validate_hop_param(target_user)?;
    if !agent_available {
        return Err(Error::AgentForwardingUnavailable);
    }
    Ok(())
}

impl SshClient {
    /// Run a command to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit status is data, not an error: it is reported in the
    /// result's `exit_code`. Only transport-level failures return `Err`.
    pub fn run(&self, cmd: &str) -> Result<CommandResult> {
        self.ensure_open()?;

        let mut channel = self.session().channel_session()?;
        channel.exec(cmd)?;

        let mut stdout = Vec::new();
        channel.read_to_end(&mut stdout)?;
        let mut stderr = Vec::new();
        channel.stderr().read_to_end(&mut stderr)?;

        channel.wait_close()?;
        let exit_code = channel.exit_status()?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_code,
        })
    }

    /// Run a command with the process's own stdin/stdout/stderr attached,
    /// under a pseudo-terminal.
    pub fn run_interactive(&self, cmd: &str) -> Result<()> {
        self.ensure_open()?;

        let mut channel = self.session().channel_session()?;
        channel.request_pty("xterm", Some(pty_modes()), Some((80, 40, 0, 0)))?;
        channel.exec(cmd)?;

        self.bridge_stdio(&mut channel)?;

        channel.wait_close()?;
        let status = channel.exit_status()?;
        if status != 0 {
            return Err(Error::command_failed(cmd, status, ""));
        }
        Ok(())
    }

    /// Run a command on a host that is only reachable through this
    /// connection, forwarding the local SSH agent for authentication.
    ///
    /// Fails closed when no agent connection is held: there is no fallback
    /// to password or key-file authentication on the intermediary.
    pub fn run_interactive_via_host(
        &self,
        target_host: &str,
        target_user: &str,
        cmd: &str,
    ) -> Result<()> {
        precheck_hop(self.agent_available(), target_host, target_user)?;
        self.ensure_open()?;

        let mut channel = self.session().channel_session()?;
        channel.request_auth_agent_forwarding()?;
        channel.request_pty("xterm", Some(pty_modes()), Some((80, 40, 0, 0)))?;

        let target = format!("{}@{}", target_user, target_host);
        let inner = format!(
            "ssh -tt -o StrictHostKeyChecking=yes {} {}",
            shell::quote_arg(&target),
            shell::quote_arg(cmd)
        );
        channel.exec(&inner)?;

        self.bridge_stdio(&mut channel)?;

        channel.wait_close()?;
        let status = channel.exit_status()?;
        if status != 0 {
            return Err(Error::command_failed(&inner, status, ""));
        }
        Ok(())
    }

    /// Run a command, streaming output into the caller's sinks without
    /// buffering. Used for unbounded output such as log following; a sink
    /// that goes away (broken pipe) ends the stream benignly.
    pub fn run_stream(
        &self,
        cmd: &str,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<()> {
        self.ensure_open()?;

        let mut channel = self.session().channel_session()?;
        channel.exec(cmd)?;

        self.session().set_blocking(false);
        let outcome = pump_to_sinks(&mut channel, stdout, stderr);
        self.session().set_blocking(true);

        match outcome {
            PumpOutcome::Finished => {
                channel.wait_close()?;
                let status = channel.exit_status()?;
                if status != 0 {
                    return Err(Error::command_failed(cmd, status, ""));
                }
                Ok(())
            }
            // The caller stopped consuming; not a failure.
            PumpOutcome::SinkClosed => {
                channel.close().ok();
                Ok(())
            }
            PumpOutcome::Failed(e) => Err(e),
        }
    }

    /// Write `content` to `path` on the remote host.
    ///
    /// The bytes are streamed into a `cat > path` channel; the write side
    /// is closed and the remote command awaited before returning, so the
    /// content is durable once this call succeeds.
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.ensure_open()?;

        let cmd = format!("cat > {}", shell::quote_path(path));
        let mut channel = self.session().channel_session()?;
        channel.exec(&cmd)?;

        channel.write_all(content)?;
        channel.send_eof()?;
        channel.wait_eof()?;

        let mut stderr = Vec::new();
        channel.stderr().read_to_end(&mut stderr).ok();

        channel.wait_close()?;
        let status = channel.exit_status()?;
        if status != 0 {
            return Err(Error::command_failed(
                &cmd,
                status,
                &String::from_utf8_lossy(&stderr),
            ));
        }
        Ok(())
    }

    /// Bridge the process streams to an interactive channel: a detached
    /// reader thread feeds stdin bytes through a queue while this thread
    /// pumps the channel in non-blocking mode. The reader thread blocks on
    /// stdin and exits with the process.
    fn bridge_stdio(&self, channel: &mut Channel) -> Result<()> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.session().set_blocking(false);

        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        let mut pending: VecDeque<u8> = VecDeque::new();
        let mut stdin_open = true;
        let mut buf = [0u8; 8192];
        let result = loop {
            let mut idle = true;

            match channel.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    idle = false;
                    if stdout.write_all(&buf[..n]).and_then(|_| stdout.flush()).is_err() {
                        break Ok(());
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => break Err(Error::Ssh(format!("channel read failed: {}", e))),
            }

            match channel.stderr().read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    idle = false;
                    if stderr.write_all(&buf[..n]).and_then(|_| stderr.flush()).is_err() {
                        break Ok(());
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => break Err(Error::Ssh(format!("channel read failed: {}", e))),
            }

            if stdin_open && pending.is_empty() {
                match rx.try_recv() {
                    Ok(bytes) => pending.extend(bytes),
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        stdin_open = false;
                        channel.send_eof().ok();
                    }
                }
            }

            if !pending.is_empty() {
                pending.make_contiguous();
                let written = {
                    let (head, _) = pending.as_slices();
                    channel.write(head)
                };
                match written {
                    Ok(n) => {
                        idle = false;
                        pending.drain(..n);
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => break Err(Error::Ssh(format!("channel write failed: {}", e))),
                }
            }

            if channel.eof() {
                break Ok(());
            }
            if idle {
                thread::sleep(PUMP_IDLE);
            }
        };

        self.session().set_blocking(true);
        result
    }
}

enum PumpOutcome {
    Finished,
    SinkClosed,
    Failed(Error),
}

fn pump_to_sinks(
    channel: &mut Channel,
    stdout: &mut (dyn Write + Send),
    stderr: &mut (dyn Write + Send),
) -> PumpOutcome {
    let mut buf = [0u8; 8192];
    loop {
        let mut idle = true;

        match channel.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                idle = false;
                if let Err(e) = stdout.write_all(&buf[..n]) {
                    if is_benign_sink_error(&e) {
                        return PumpOutcome::SinkClosed;
                    }
                    return PumpOutcome::Failed(Error::Io(e));
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return PumpOutcome::Failed(Error::Ssh(format!("channel read failed: {}", e))),
        }

        match channel.stderr().read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                idle = false;
                if let Err(e) = stderr.write_all(&buf[..n]) {
                    if is_benign_sink_error(&e) {
                        return PumpOutcome::SinkClosed;
                    }
                    return PumpOutcome::Failed(Error::Io(e));
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return PumpOutcome::Failed(Error::Ssh(format!("channel read failed: {}", e))),
        }

        if channel.eof() {
            return PumpOutcome::Finished;
        }
        if idle {
            thread::sleep(PUMP_IDLE);
        }
    }
}

fn is_benign_sink_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::Interrupted
    )
}

fn pty_modes() -> PtyModes {
    let mut modes = PtyModes::new();
    modes.set_boolean(PtyModeOpcode::ECHO, true);
    modes.set_u32(PtyModeOpcode::TTY_OP_ISPEED, 14400);
    modes.set_u32(PtyModeOpcode::TTY_OP_OSPEED, 14400);
    modes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_param_accepts_allow_list() {
        for param in ["worker1", "deploy", "a", "node_02", "swarm_manager_1"] {
            assert!(validate_hop_param(param).is_ok(), "rejected {:?}", param);
        }
        let max = "a".repeat(63);
        assert!(validate_hop_param(&max).is_ok());
    }

    #[test]
    fn hop_param_rejects_injection_attempts() {
        for param in [
            "worker1; rm -rf /",
            "worker1 && id",
            "worker1|id",
            "`id`",
            "$(id)",
            "worker 1",
            "user@host",
        ] {
            let err = validate_hop_param(param).unwrap_err();
            assert_eq!(err.code(), "INVALID_PARAM", "accepted {:?}", param);
        }
    }

    #[test]
    fn hop_param_rejects_over_length() {
        let too_long = "a".repeat(64);
        assert!(validate_hop_param(&too_long).is_err());
    }

    #[test]
    fn hop_without_agent_forwarding_fails_closed() {
        let err = precheck_hop(false, "worker1", "deploy").unwrap_err();
        assert!(matches!(err, Error::AgentForwardingUnavailable));
    }

    #[test]
    fn hop_precheck_validates_before_agent_check() {
        let err = precheck_hop(false, "worker1; id", "deploy").unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAM");
    }
}
