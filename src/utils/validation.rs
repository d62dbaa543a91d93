use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Allow-list for names that end up inside shell commands: hop hosts and
/// users, accessory service names, secret names. Must start alphanumeric,
/// continue with alphanumerics or underscores, at most 63 characters.
pub fn validate_identifier(value: &str) -> Result<()> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_]{0,62}$").unwrap());

    if re.is_match(value) {
        Ok(())
    } else {
        Err(Error::InvalidParam(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for value in ["worker1", "deploy", "a", "X", "node_02", "0abc"] {
            assert!(validate_identifier(value).is_ok(), "rejected {:?}", value);
        }
    }

    #[test]
    fn accepts_max_length() {
        let value: String = "a".repeat(63);
        assert!(validate_identifier(&value).is_ok());
    }

    #[test]
    fn rejects_over_length() {
        let value: String = "a".repeat(64);
        assert!(validate_identifier(&value).is_err());
    }

    #[test]
    fn rejects_shell_metacharacters() {
        for value in [
            "host; rm -rf /",
            "host&&id",
            "host|cat",
            "`id`",
            "$(id)",
            "host user",
            "-flag",
            "_leading",
            "",
        ] {
            assert!(validate_identifier(value).is_err(), "accepted {:?}", value);
        }
    }
}
