use anyhow::{Context, Result};
use std::path::Path;

/// Run flatten command on a saved response
pub fn run_flatten(path: &Path, group_by: &[String], metrics: &[String]) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let response: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {:?}", path))?;

    let rows = pulse::flatten(&response, group_by, metrics).with_context(|| {
        format!(
            "Response does not hold nested aggregations [{}]",
            group_by.join(" > ")
        )
    })?;

    tracing::info!("{} rows from {} grouping levels", rows.len(), group_by.len());
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
