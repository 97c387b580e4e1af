use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use toml_edit::{DocumentMut, Item, Table, Value, value};
use universe_fixture::cli::{ConfigCommand, ConfigSetArgs};
use universe_fixture::config::{self, FixtureConfig};

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Set(args) => set_value(&args),
    }
}

fn set_value(args: &ConfigSetArgs) -> Result<()> {
    let path = match &args.file {
        Some(path) => path.clone(),
        None => config::config_path().ok_or_else(|| {
            anyhow!("failed to resolve the universe-fixture config path (no config directory found)")
        })?,
    };

    ensure_parent(&path)?;

    let doc = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if raw.trim().is_empty() {
            DocumentMut::new()
        } else {
            raw.parse::<DocumentMut>()
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
    } else {
        DocumentMut::new()
    };

    let rendered = render_valid(&doc, &args.key, &args.value)?;

    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Updated {}", path.display());
    Ok(())
}

/// Apply `key = raw` and check the result still loads.
///
/// A bare value is tried with its inferred TOML type first, then as a
/// string, so `registrar.prefix 2024` stays a string prefix.
fn render_valid(doc: &DocumentMut, key: &str, raw: &str) -> Result<String> {
    let typed = typed_value(raw);
    let mut candidates = vec![typed.clone()];
    if !typed.is_str() {
        candidates.push(Value::from(raw));
    }

    let mut last_err = None;
    for candidate in candidates {
        let mut attempt = doc.clone();
        apply_key(&mut attempt, key, candidate)?;
        let rendered = attempt.to_string();
        match toml::from_str::<FixtureConfig>(&rendered) {
            Ok(_) => return Ok(rendered),
            Err(err) => last_err = Some(err),
        }
    }
    let err = last_err.map_or_else(|| anyhow!("no value to apply"), anyhow::Error::from);
    Err(err.context(format!("`{key}` = `{raw}` is not a valid setting")))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn apply_key(doc: &mut DocumentMut, key: &str, new_value: Value) -> Result<()> {
    let segments = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    let Some((last, parents)) = segments.split_last() else {
        bail!("config key cannot be empty");
    };

    let mut current = doc.as_table_mut();
    for segment in parents {
        current = current
            .entry(segment)
            .or_insert(Item::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow!("path `{segment}` is not a table in the config"))?;
    }

    current.insert(last, value(new_value));
    Ok(())
}

/// Integers and booleans keep their TOML type; everything else is a string.
/// A double-quoted value is always a string.
fn typed_value(raw: &str) -> Value {
    if let Some(quoted) = raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        return Value::from(quoted);
    }
    if let Ok(number) = raw.parse::<i64>() {
        return Value::from(number);
    }
    match raw {
        "true" => Value::from(true),
        "false" => Value::from(false),
        _ => Value::from(raw),
    }
}
