//! Reclaiming agent disk space left behind by terminated frameworks.
//!
//! Mesos keeps framework sandboxes on each agent until its own garbage
//! collector gets to them. Suites that install and uninstall the same
//! framework repeatedly run out of disk long before that happens, so the
//! sandboxes are removed eagerly on every private agent.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const FRAMEWORK_GC_COMMAND: &str = "sudo rm -rf /var/lib/mesos/slave/slaves/*/frameworks/*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub hostname: String,
    pub public: bool,
}

/// One element of `node --json`. Masters show up without an id.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeRecord {
    id: Option<String>,
    #[serde(default)]
    hostname: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, Value>,
}

impl NodeRecord {
    pub(crate) fn into_agent(self) -> Option<Agent> {
        if self.kind.as_deref().is_some_and(|kind| kind.contains("master")) {
            return None;
        }
        let id = self.id?;
        let public = match self.attributes.get("public_ip") {
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        };
        Some(Agent {
            id,
            hostname: self.hostname,
            public,
        })
    }
}

pub trait AgentClient {
    fn list_agents(&self) -> Result<Vec<Agent>>;

    fn run_on_agent(&self, agent: &Agent, command: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct GcReport {
    pub cleaned: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

/// Remove framework sandboxes on every private agent.
///
/// Every agent is attempted; the call fails afterwards if any of them did.
pub fn gc_frameworks<C: AgentClient + ?Sized>(client: &C) -> Result<GcReport> {
    let agents = client.list_agents()?;
    let mut report = GcReport::default();
    for agent in agents.iter().filter(|agent| !agent.public) {
        info!(agent = %agent.hostname, "reclaiming framework sandboxes");
        match client.run_on_agent(agent, FRAMEWORK_GC_COMMAND) {
            Ok(()) => report.cleaned.push(agent.hostname.clone()),
            Err(err) => {
                warn!(agent = %agent.hostname, error = %err, "framework cleanup failed");
                report.failed.push((agent.hostname.clone(), err));
            }
        }
    }
    if !report.failed.is_empty() {
        return Err(Error::AgentCleanup(report.failed.len()));
    }
    Ok(report)
}
