use thiserror::Error;

use crate::config::DeploymentMode;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("no authentication methods available")]
    NoAuthMethods,

    #[error("host key verification failed for {host}: {reason}")]
    HostVerification { host: String, reason: String },

    #[error("invalid parameter '{0}': must start with an alphanumeric character and contain only alphanumeric characters and underscores (max 63)")]
    InvalidParam(String),

    #[error("agent forwarding is not available on this connection")]
    AgentForwardingUnavailable,

    #[error("command failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("{operation} is not supported in {mode} mode")]
    Unsupported {
        operation: String,
        mode: DeploymentMode,
    },

    #[error("no previous deploy found")]
    NoPreviousDeploy,

    #[error("{0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Ssh(_) => "SSH_ERROR",
            Error::NoAuthMethods => "NO_AUTH_METHODS",
            Error::HostVerification { .. } => "HOST_VERIFICATION_FAILED",
            Error::InvalidParam(_) => "INVALID_PARAM",
            Error::AgentForwardingUnavailable => "AGENT_FORWARDING_UNAVAILABLE",
            Error::CommandFailed { .. } => "COMMAND_FAILED",
            Error::Parse { .. } => "PARSE_ERROR",
            Error::Unsupported { .. } => "UNSUPPORTED_OPERATION",
            Error::NoPreviousDeploy => "NO_PREVIOUS_DEPLOY",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Other(_) => "ERROR",
        }
    }

    pub fn unsupported(operation: &str, mode: DeploymentMode) -> Self {
        Error::Unsupported {
            operation: operation.to_string(),
            mode,
        }
    }

    pub fn command_failed(command: &str, status: i32, stderr: &str) -> Self {
        Error::CommandFailed {
            command: command.to_string(),
            status,
            stderr: stderr.trim_end().to_string(),
        }
    }

    pub fn parse(what: &str, detail: impl std::fmt::Display) -> Self {
        Error::Parse {
            what: what.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl From<ssh2::Error> for Error {
    fn from(e: ssh2::Error) -> Self {
        Error::Ssh(e.to_string())
    }
}

impl From<serde_yml::Error> for Error {
    fn from(e: serde_yml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_carries_operation_and_mode() {
        let err = Error::unsupported("scale", DeploymentMode::Compose);
        match err {
            Error::Unsupported { operation, mode } => {
                assert_eq!(operation, "scale");
                assert_eq!(mode, DeploymentMode::Compose);
            }
            other => panic!("expected Unsupported, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_display_names_the_mode() {
        let err = Error::unsupported("scale", DeploymentMode::Compose);
        assert_eq!(err.to_string(), "scale is not supported in compose mode");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::NoPreviousDeploy.code(), "NO_PREVIOUS_DEPLOY");
        assert_eq!(Error::NoAuthMethods.code(), "NO_AUTH_METHODS");
    }
}
