use anyhow::Result;
use serde_json::json;
use universe_fixture::cli::ListArgs;
use universe_fixture::config;
use universe_fixture::dcos::DcosCli;
use universe_fixture::registry::RegistryClient;

pub fn run(args: &ListArgs) -> Result<()> {
    let config = config::load()?;
    let client = DcosCli::from_config(&config)?;
    let repositories = client.list_repositories()?;

    if args.json {
        let payload = json!({ "repositories": repositories });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if repositories.is_empty() {
        println!("No package repositories registered.");
        return Ok(());
    }
    for (index, repo) in repositories.iter().enumerate() {
        println!("{index}: {} {}", repo.name, repo.uri);
    }
    Ok(())
}
