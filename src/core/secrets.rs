//! Secret values for swarm services: loaded from a dotenv file or the
//! process environment, pushed as engine-managed secrets named
//! `{stack}_{name}`.

use std::path::Path;

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::utils::shell;
use crate::utils::validation::validate_identifier;

#[derive(Debug, Clone)]
pub struct Secret {
    pub name: String,
    pub value: String,
}

/// Load the named secrets from a dotenv-format file, falling back to the
/// process environment for names missing from the file.
pub fn load_from_env_file(path: &Path, secret_names: &[String]) -> Result<Vec<Secret>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to open {}: {}", path.display(), e)))?;

    let mut env_map = std::collections::HashMap::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            env_map.insert(key.trim().to_string(), value.to_string());
        }
    }

    let mut secrets = Vec::new();
    for name in secret_names {
        let value = match env_map.get(name) {
            Some(value) => value.clone(),
            None => std::env::var(name).unwrap_or_default(),
        };
        if !value.is_empty() {
            secrets.push(Secret {
                name: name.clone(),
                value,
            });
        }
    }
    Ok(secrets)
}

/// Load the named secrets from the process environment only.
pub fn load_from_env(secret_names: &[String]) -> Vec<Secret> {
    secret_names
        .iter()
        .filter_map(|name| {
            let value = std::env::var(name).unwrap_or_default();
            (!value.is_empty()).then(|| Secret {
                name: name.clone(),
                value,
            })
        })
        .collect()
}

/// Manages engine-side secrets for one stack.
pub struct SecretsManager<'a> {
    exec: &'a dyn Executor,
    stack_name: String,
}

impl<'a> SecretsManager<'a> {
    pub fn new(exec: &'a dyn Executor, stack_name: &str) -> Self {
        Self {
            exec,
            stack_name: stack_name.to_string(),
        }
    }

    fn secret_name(&self, name: &str) -> String {
        format!("{}_{}", self.stack_name, name.to_lowercase())
    }

    /// Create a secret, replacing any existing one of the same name. The
    /// value travels over stdin, never argv.
    pub fn create(&self, name: &str, value: &str) -> Result<()> {
        validate_identifier(name)?;
        let secret_name = self.secret_name(name);

        let check = format!(
            "docker secret ls --filter name={} --format '{{{{.Name}}}}'",
            secret_name
        );
        let result = self.exec.run(&check)?;
        if !result.stdout.trim().is_empty() {
            self.exec
                .run(&format!("docker secret rm {}", secret_name))
                .ok();
        }

        let create = format!(
            "printf %s {} | docker secret create {} -",
            shell::quote_arg(value),
            secret_name
        );
        let result = self.exec.run(&create)?;
        if !result.success() {
            return Err(Error::command_failed(
                "docker secret create",
                result.exit_code,
                &result.stderr,
            ));
        }
        Ok(())
    }

    /// All secret names carrying this stack's prefix.
    pub fn list(&self) -> Result<Vec<String>> {
        let cmd = format!(
            "docker secret ls --filter name={}_ --format '{{{{.Name}}}}'",
            self.stack_name
        );
        let result = self.exec.run(&cmd)?;
        Ok(result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        validate_identifier(name)?;
        let cmd = format!("docker secret rm {}", self.secret_name(name));
        let result = self.exec.run(&cmd)?;
        if !result.success() {
            return Err(Error::command_failed(&cmd, result.exit_code, &result.stderr));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::StubExecutor;
    use std::io::Write;

    #[test]
    fn env_file_parsing_strips_quotes_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# comment").unwrap();
        writeln!(f, "DB_PASSWORD=\"s3cret\"").unwrap();
        writeln!(f, "API_KEY='abc123'").unwrap();
        writeln!(f, "EMPTY=").unwrap();

        let names = vec![
            "DB_PASSWORD".to_string(),
            "API_KEY".to_string(),
            "EMPTY".to_string(),
        ];
        let secrets = load_from_env_file(&path, &names).unwrap();

        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets[0].name, "DB_PASSWORD");
        assert_eq!(secrets[0].value, "s3cret");
        assert_eq!(secrets[1].value, "abc123");
    }

    #[test]
    fn env_file_falls_back_to_process_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "OTHER=x\n").unwrap();

        std::env::set_var("DOCKHAND_TEST_FALLBACK_SECRET", "from-env");
        let secrets =
            load_from_env_file(&path, &["DOCKHAND_TEST_FALLBACK_SECRET".to_string()]).unwrap();
        std::env::remove_var("DOCKHAND_TEST_FALLBACK_SECRET");

        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].value, "from-env");
    }

    #[test]
    fn create_replaces_existing_secret() {
        let exec = StubExecutor::new()
            .ok("myapp_db_password\n") // ls: exists
            .ok("") // rm
            .ok("abc"); // create
        let manager = SecretsManager::new(&exec, "myapp");
        manager.create("DB_PASSWORD", "s3cret").unwrap();

        let commands = exec.commands();
        assert_eq!(commands[1], "docker secret rm myapp_db_password");
        assert!(commands[2].contains("docker secret create myapp_db_password -"));
        assert!(commands[2].starts_with("printf %s s3cret |"));
    }

    #[test]
    fn create_validates_name() {
        let exec = StubExecutor::new();
        let manager = SecretsManager::new(&exec, "myapp");
        assert!(manager.create("bad name", "v").is_err());
        assert!(exec.commands().is_empty());
    }

    #[test]
    fn list_returns_stack_prefixed_names() {
        let exec = StubExecutor::new().ok("myapp_db_password\nmyapp_api_key\n");
        let manager = SecretsManager::new(&exec, "myapp");
        let secrets = manager.list().unwrap();
        assert_eq!(secrets, vec!["myapp_db_password", "myapp_api_key"]);
    }
}
