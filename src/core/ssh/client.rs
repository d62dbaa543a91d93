use std::cell::{Cell, RefCell};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use ssh2::{Agent, CheckResult, HashType, KnownHostFileKind, Session};

use super::INSECURE_SSH_ENV;
use crate::error::{Error, Result};
use crate::tty;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One authenticated SSH connection to a remote host.
///
/// A value of this type only exists in the connected state: `connect`
/// performs the TCP dial, handshake, host verification and authentication,
/// and `close` is idempotent and terminal. One connection is opened per
/// CLI invocation; each command gets its own session channel.
pub struct SshClient {
    pub host: String,
    pub port: u16,
    pub user: String,

    session: Session,
    // Agent connection retained from credential discovery, kept for
    // agent forwarding on multi-hop commands.
    agent: RefCell<Option<Agent>>,
    closed: Cell<bool>,
}

impl SshClient {
    /// Establish a connection to `user@host:port`.
    ///
    /// `key_path` is the explicitly configured private key, if any; when
    /// empty the default key locations are tried instead.
    pub fn connect(host: &str, port: u16, user: &str, key_path: &str) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Ssh(format!("failed to resolve {}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| Error::Ssh(format!("no address found for {}:{}", host, port)))?;

        let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| Error::Ssh(format!("failed to connect to {}:{}: {}", host, port, e)))?;

        let mut session = Session::new()?;
        // Bound the handshake and authentication; lifted afterwards so
        // long-running remote commands are not cut off.
        session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session.handshake()?;

        verify_host(&session, host, port)?;

        let agent = authenticate(&session, host, user, key_path)?;
        session.set_timeout(0);

        Ok(Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            session,
            agent: RefCell::new(agent),
            closed: Cell::new(false),
        })
    }

    /// True when an agent connection was discovered at connect time and is
    /// still held for forwarding.
    pub fn has_agent_forwarding(&self) -> bool {
        !self.closed.get() && self.agent.borrow().is_some()
    }

    /// Release the agent connection and the underlying transport.
    /// Safe to call more than once.
    pub fn close(&self) {
        if self.closed.get() {
            return;
        }
        self.closed.set(true);

        if let Some(mut agent) = self.agent.borrow_mut().take() {
            agent.disconnect().ok();
        }
        self.session.disconnect(None, "closing", None).ok();
    }

    pub(super) fn session(&self) -> &Session {
        &self.session
    }

    pub(super) fn agent_available(&self) -> bool {
        self.agent.borrow().is_some()
    }

    pub(super) fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(Error::Ssh("connection is closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for SshClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decide whether to trust the host key presented during the handshake.
///
/// Three modes: an explicit insecure opt-in via environment variable, the
/// conventional known-hosts file, or an interactive trust-on-first-use
/// prompt. An unknown host is never trusted silently, and a key mismatch
/// against known_hosts always aborts.
fn verify_host(session: &Session, host: &str, port: u16) -> Result<()> {
    if std::env::var_os(INSECURE_SSH_ENV).is_some() {
        eprintln!(
            "WARNING: SSH host key verification disabled - connection vulnerable to MITM attacks"
        );
        return Ok(());
    }

    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| Error::Ssh("server presented no host key".to_string()))?;

    let mut known_hosts = session.known_hosts()?;
    let file = dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts"));
    let loaded = match &file {
        Some(path) => known_hosts
            .read_file(path, KnownHostFileKind::OpenSSH)
            .is_ok(),
        None => false,
    };

    if loaded {
        match known_hosts.check_port(host, port, key) {
            CheckResult::Match => return Ok(()),
            CheckResult::Mismatch => {
                return Err(Error::HostVerification {
                    host: format!("{}:{}", host, port),
                    reason: "host key mismatch (possible man-in-the-middle attack)".to_string(),
                })
            }
            CheckResult::NotFound | CheckResult::Failure => {}
        }
    }

    confirm_host_key(session, host, port)
}

fn confirm_host_key(session: &Session, host: &str, port: u16) -> Result<()> {
    let fingerprint = session
        .host_key_hash(HashType::Sha256)
        .map(|hash| format!("SHA256:{}", STANDARD_NO_PAD.encode(hash)))
        .unwrap_or_else(|| "<unavailable>".to_string());

    println!(
        "The authenticity of host '{}:{}' can't be established.",
        host, port
    );
    println!("Host key fingerprint is {}.", fingerprint);

    if tty::confirm("Are you sure you want to continue connecting (yes/no)? ")? {
        Ok(())
    } else {
        Err(Error::HostVerification {
            host: format!("{}:{}", host, port),
            reason: "connection aborted by user".to_string(),
        })
    }
}

/// Try authentication methods in discovery order: agent, explicit key,
/// default key locations. The agent connection is kept around even when a
/// key ends up authenticating, so multi-hop commands can forward it.
fn authenticate(
    session: &Session,
    host: &str,
    user: &str,
    key_path: &str,
) -> Result<Option<Agent>> {
    let mut agent_conn: Option<Agent> = None;
    let mut attempted = false;

    if std::env::var_os("SSH_AUTH_SOCK").is_some() {
        if let Ok(mut agent) = session.agent() {
            if agent.connect().is_ok() {
                attempted = true;
                if agent.list_identities().is_ok() {
                    if let Ok(identities) = agent.identities() {
                        for identity in identities {
                            if agent.userauth(user, &identity).is_ok() && session.authenticated() {
                                break;
                            }
                        }
                    }
                }
                agent_conn = Some(agent);
            }
        }
    }

    if !session.authenticated() {
        let candidates = if key_path.is_empty() {
            default_key_paths()
        } else {
            vec![PathBuf::from(key_path)]
        };

        for key in candidates.iter().filter(|path| path.exists()) {
            attempted = true;
            if session.userauth_pubkey_file(user, None, key, None).is_ok()
                && session.authenticated()
            {
                break;
            }
        }
    }

    if !session.authenticated() {
        if !attempted {
            return Err(Error::NoAuthMethods);
        }
        return Err(Error::Ssh(format!(
            "authentication failed for {}@{}",
            user, host
        )));
    }

    Ok(agent_conn)
}

fn default_key_paths() -> Vec<PathBuf> {
    match dirs::home_dir() {
        Some(home) => vec![
            home.join(".ssh").join("id_ed25519"),
            home.join(".ssh").join("id_rsa"),
        ],
        None => Vec::new(),
    }
}
