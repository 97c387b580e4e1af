use anyhow::{Context, Result};
use universe_fixture::agents;
use universe_fixture::config;
use universe_fixture::dcos::DcosCli;

pub fn run() -> Result<()> {
    let config = config::load()?;
    let client = DcosCli::from_config(&config)?;
    let report = agents::gc_frameworks(&client).context("agent framework cleanup failed")?;
    println!(
        "Reclaimed framework sandboxes on {} private agent(s)",
        report.cleaned.len()
    );
    Ok(())
}
