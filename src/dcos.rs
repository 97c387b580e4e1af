//! Process-backed clients that drive the `dcos` CLI.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;
use which::which;

use crate::agents::{Agent, AgentClient, NodeRecord};
use crate::config::{self, FixtureConfig};
use crate::error::{Error, Result};
use crate::registry::{RegistryClient, Repository, RepositoryListing};
use crate::util::json;
use crate::util::process::{self, CommandOutput, CommandSpec};

const TOOL_NAME: &str = "dcos";
pub const BIN_ENV: &str = "UNIVERSE_FIXTURE_DCOS_BIN";

#[derive(Debug, Clone)]
pub struct DcosCli {
    program: OsString,
}

impl DcosCli {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &FixtureConfig) -> Result<Self> {
        Ok(Self::new(resolve_program(config)?))
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    fn spec<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        CommandSpec::new(self.program.clone()).args(args)
    }

    fn exec(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec.display(), "running");
        process::run(spec).map_err(|source| Error::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        })
    }

    /// Run a read-only command and decode its JSON stdout.
    fn query<T: serde::de::DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let spec = self.spec(args);
        let output = self.exec(&spec)?;
        if !output.status.success() {
            return Err(Error::Query {
                command: spec.display(),
                code: output.code(),
                stderr: output.stderr_lossy(),
            });
        }
        json::parse_json_bytes(&output.stdout).map_err(|message| Error::Parse {
            command: spec.display(),
            message,
        })
    }

    fn mutate(&self, spec: CommandSpec) -> Result<()> {
        let output = self.exec(&spec)?;
        if output.status.success() {
            return Ok(());
        }
        Err(Error::Mutation {
            command: spec.display(),
            code: output.code(),
            stderr: output.stderr_lossy(),
        })
    }
}

impl RegistryClient for DcosCli {
    fn list_repositories(&self) -> Result<Vec<Repository>> {
        let listing: RepositoryListing = self.query(&["package", "repo", "list", "--json"])?;
        Ok(listing.repositories)
    }

    fn add_repository(&self, name: &str, uri: &str, index: usize) -> Result<()> {
        self.mutate(
            self.spec(["package", "repo", "add"])
                .arg(format!("--index={index}"))
                .args([name, uri]),
        )
    }

    fn remove_repository(&self, name: &str) -> Result<()> {
        self.mutate(self.spec(["package", "repo", "remove", name]))
    }
}

impl AgentClient for DcosCli {
    fn list_agents(&self) -> Result<Vec<Agent>> {
        let nodes: Vec<NodeRecord> = self.query(&["node", "--json"])?;
        Ok(nodes.into_iter().filter_map(NodeRecord::into_agent).collect())
    }

    fn run_on_agent(&self, agent: &Agent, command: &str) -> Result<()> {
        self.mutate(
            self.spec(["node", "ssh", "--master-proxy"])
                .arg(format!("--mesos-id={}", agent.id))
                .args(["--option", "StrictHostKeyChecking=no", command]),
        )
    }
}

fn resolve_program(config: &FixtureConfig) -> Result<OsString> {
    if let Some(env_override) = std::env::var_os(BIN_ENV) {
        let path = PathBuf::from(env_override);
        if !path.exists() {
            return Err(Error::Config(format!(
                "{BIN_ENV} points to `{}` but it does not exist",
                path.display()
            )));
        }
        return Ok(path.into_os_string());
    }

    if let Some(custom) = config.tools.dcos.path.as_ref() {
        if !custom.exists() {
            return Err(Error::Config(format!(
                "configured dcos path `{}` does not exist",
                custom.display()
            )));
        }
        return Ok(custom.as_os_str().to_os_string());
    }

    match which(TOOL_NAME) {
        Ok(path) => Ok(path.into_os_string()),
        Err(error) => {
            let config_hint = config::config_path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "~/.config/universe-fixture/config.toml".to_string());
            Err(Error::Config(format!(
                "failed to locate `{TOOL_NAME}` on PATH ({error}). Install the DC/OS CLI, set \
                 {BIN_ENV}, or set [tools.dcos].path in {config_hint}."
            )))
        }
    }
}
