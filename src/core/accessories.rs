//! Accessory services: long-lived supporting containers (databases,
//! caches) managed individually rather than through a full redeploy.

use serde::Deserialize;

use crate::config::DeploymentMode;
use crate::deploy::replicas_running;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::utils::validation::validate_identifier;

#[derive(Debug, Clone)]
pub struct AccessoryStatus {
    pub name: String,
    pub replicas: String,
    pub running: bool,
}

pub struct AccessoryManager<'a> {
    exec: &'a dyn Executor,
    stack_name: String,
    mode: DeploymentMode,
}

impl<'a> AccessoryManager<'a> {
    pub fn new(exec: &'a dyn Executor, stack_name: &str, mode: DeploymentMode) -> Self {
        Self {
            exec,
            stack_name: stack_name.to_string(),
            mode,
        }
    }

    pub fn start(&self, name: &str) -> Result<()> {
        validate_identifier(name)?;

        let cmd = match self.mode {
            DeploymentMode::Compose => {
                format!("docker compose -p {} start {}", self.stack_name, name)
            }
            DeploymentMode::Swarm => {
                format!("docker service scale {}_{}=1", self.stack_name, name)
            }
        };
        self.run_checked(&cmd)
    }

    pub fn stop(&self, name: &str) -> Result<()> {
        validate_identifier(name)?;

        let cmd = match self.mode {
            DeploymentMode::Compose => {
                format!("docker compose -p {} stop {}", self.stack_name, name)
            }
            DeploymentMode::Swarm => {
                format!("docker service scale {}_{}=0", self.stack_name, name)
            }
        };
        self.run_checked(&cmd)
    }

    pub fn restart(&self, name: &str) -> Result<()> {
        validate_identifier(name)?;

        let cmd = match self.mode {
            DeploymentMode::Compose => {
                format!("docker compose -p {} restart {}", self.stack_name, name)
            }
            DeploymentMode::Swarm => {
                format!("docker service update --force {}_{}", self.stack_name, name)
            }
        };
        self.run_checked(&cmd)
    }

    pub fn status(&self, name: &str) -> Result<AccessoryStatus> {
        validate_identifier(name)?;

        match self.mode {
            DeploymentMode::Compose => self.compose_status(name),
            DeploymentMode::Swarm => self.swarm_status(name),
        }
    }

    /// Status for every accessory. One failing accessory degrades to a
    /// "not deployed" row; the batch never aborts.
    pub fn list_all(&self, names: &[String]) -> Vec<AccessoryStatus> {
        names
            .iter()
            .map(|name| {
                self.status(name).unwrap_or_else(|_| AccessoryStatus {
                    name: name.clone(),
                    replicas: "not deployed".to_string(),
                    running: false,
                })
            })
            .collect()
    }

    fn run_checked(&self, cmd: &str) -> Result<()> {
        let result = self.exec.run(cmd)?;
        if !result.success() {
            return Err(Error::command_failed(cmd, result.exit_code, &result.stderr));
        }
        Ok(())
    }

    fn swarm_status(&self, name: &str) -> Result<AccessoryStatus> {
        let cmd = format!(
            "docker service ls --filter name={}_{} --format '{{{{.Name}}}}|{{{{.Replicas}}}}'",
            self.stack_name, name
        );
        let result = self.exec.run(&cmd)?;

        let line = result.stdout.trim();
        if line.is_empty() {
            return Err(Error::NotFound(format!("accessory {} not found", name)));
        }

        let replicas = line
            .split('|')
            .nth(1)
            .ok_or_else(|| Error::parse("service replicas", line))?
            .to_string();

        Ok(AccessoryStatus {
            name: name.to_string(),
            running: replicas_running(&replicas),
            replicas,
        })
    }

    fn compose_status(&self, name: &str) -> Result<AccessoryStatus> {
        let cmd = format!(
            "docker compose -p {} ps {} --format json",
            self.stack_name, name
        );
        let result = self.exec.run(&cmd)?;

        if result.stdout.trim().is_empty() {
            return Err(Error::NotFound(format!("accessory {} not found", name)));
        }

        #[derive(Deserialize)]
        struct PsState {
            #[serde(rename = "State", default)]
            state: String,
        }

        let mut count = 0usize;
        let mut running = false;
        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(record) = serde_json::from_str::<PsState>(line) else {
                continue;
            };
            count += 1;
            if record.state.eq_ignore_ascii_case("running") {
                running = true;
            }
        }

        let replicas = if count == 0 {
            "not running".to_string()
        } else if running {
            format!("{}/{}", count, count)
        } else {
            format!("0/{}", count)
        };

        Ok(AccessoryStatus {
            name: name.to_string(),
            replicas,
            running,
        })
    }
}
