use anyhow::Result;
use pulse::{Config, LookupClient};

/// Run get command: direct fetch with index fallback, or a pattern search
pub async fn run_get(
    config: &Config,
    id: &str,
    indices: &[String],
    pattern: Option<&str>,
) -> Result<()> {
    let client = LookupClient::from_config(config)?;

    let lookup = match pattern {
        Some(pattern) => client.find(pattern, id).await,
        None => client.get_any(indices, id).await,
    };

    match lookup {
        Ok(document) => {
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!("{}", e);
            anyhow::bail!("No document with id '{}'", id)
        }
        Err(e) => Err(e.into()),
    }
}
