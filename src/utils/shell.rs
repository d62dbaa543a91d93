/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments for shell execution.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| quote_arg(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_plain() {
        assert_eq!(quote_arg("nginx"), "nginx");
        assert_eq!(quote_arg("web_1"), "web_1");
    }

    #[test]
    fn quote_arg_with_spaces() {
        assert_eq!(quote_arg("tail -f /var/log/app"), "'tail -f /var/log/app'");
    }

    #[test]
    fn quote_arg_with_substitution() {
        assert_eq!(quote_arg("$(reboot)"), "'$(reboot)'");
        assert_eq!(quote_arg("`id`"), "'`id`'");
    }

    #[test]
    fn quote_arg_with_single_quote() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }

    #[test]
    fn quote_arg_empty() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn join_args_mixed() {
        let args = vec!["sh".to_string(), "-c".to_string(), "echo 'hi'".to_string()];
        assert_eq!(join_args(&args), "sh -c 'echo '\\''hi'\\'''");
    }

    #[test]
    fn quote_path_always_quotes() {
        assert_eq!(quote_path("/tmp/app-compose.yaml"), "'/tmp/app-compose.yaml'");
        assert_eq!(quote_path("/srv/it's"), "'/srv/it'\\''s'");
    }
}
