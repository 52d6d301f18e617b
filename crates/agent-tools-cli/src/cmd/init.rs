use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{CONFIG_FILE_NAME, Config};

/// Write a sample `agent-tools.toml`, or print the JSON schema.
pub fn run(output: Option<&Path>, schema: bool, force: bool) -> Result<()> {
    if schema {
        println!("{}", Config::json_schema_string()?);
        return Ok(());
    }

    let path = output.unwrap_or(Path::new(CONFIG_FILE_NAME));
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let content = Config::sample().to_toml_with_schema()?;
    fs::write(path, content).with_context(|| format!("Failed to write: {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
