//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection and user prompting.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{Error, Result};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn is_stderr_tty() -> bool {
    io::stderr().is_terminal()
}

/// Print a prompt to stderr and read one trimmed line from stdin.
pub fn prompt(message: &str) -> Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .map_err(|e| Error::Other(format!("failed to read input: {}", e)))?;

    Ok(line.trim().to_string())
}

/// Ask a yes/no question; only a literal "yes" (case-insensitive) is an
/// affirmative answer.
pub fn confirm(message: &str) -> Result<bool> {
    let answer = prompt(message)?;
    Ok(answer.eq_ignore_ascii_case("yes"))
}
