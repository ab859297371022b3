use anyhow::{Context, Result};
use pulse::{Config, QueryDescriptor, SearchClient};
use serde_json::Value;
use std::path::Path;

/// How `query` runs and prints its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    Normalized,
    Raw,
    Rows,
    AllPages(String),
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

pub fn read_descriptor(path: &Path) -> Result<QueryDescriptor> {
    serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{:?} is not a query descriptor", path))
}

/// A batch file holds an array of descriptors; a single object is a batch of one.
pub fn read_descriptors(path: &Path) -> Result<Vec<QueryDescriptor>> {
    let descriptors = match read_json(path)? {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<serde_json::Result<Vec<QueryDescriptor>>>(),
        single => serde_json::from_value(single).map(|d| vec![d]),
    };
    descriptors.with_context(|| format!("{:?} does not hold query descriptors", path))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run render command: build the query without sending it
pub fn run_render(config: &Config, path: &Path) -> Result<()> {
    let descriptor = read_descriptor(path)?;
    let client = SearchClient::from_config(config)?;
    let query = client.render(&descriptor)?;

    // Pretty-print when the query is JSON, otherwise print it as built
    match serde_json::from_str::<Value>(&query) {
        Ok(parsed) => print_json(&parsed),
        Err(_) => {
            println!("{}", query);
            Ok(())
        }
    }
}

/// Run query command
pub async fn run_query(config: &Config, path: &Path, mode: QueryMode) -> Result<()> {
    let descriptor = read_descriptor(path)?;
    let client = SearchClient::from_config(config)?;

    tracing::info!("Running {} against {}", descriptor.template_file, descriptor.path());
    match mode {
        QueryMode::Normalized => print_json(&client.execute(&descriptor).await?),
        QueryMode::Raw => print_json(&client.execute_raw(&descriptor).await?),
        QueryMode::Rows => print_json(&client.execute_rows(&descriptor).await?),
        QueryMode::AllPages(aggregation) => {
            let result = client.execute_all_pages(&descriptor, &aggregation).await?;
            tracing::info!(
                "Collected {} buckets",
                result.res().and_then(serde_json::Value::as_array).map_or(0, Vec::len)
            );
            print_json(&result)
        }
    }
}

/// Run batch command
pub async fn run_batch(config: &Config, path: &Path) -> Result<()> {
    let descriptors = read_descriptors(path)?;
    let client = SearchClient::from_config(config)?;

    let responses = client.execute_batch(&descriptors).await?;
    if responses.len() < descriptors.len() {
        tracing::warn!(
            "{} of {} descriptors were skipped",
            descriptors.len() - responses.len(),
            descriptors.len()
        );
    }
    print_json(&responses)
}
