use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::debug;

pub mod cli;
pub mod gcl;
pub mod network;
pub mod traffic;

pub fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} from {}", path.display()))?;
    let parsed = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {what} from {}", path.display()))?;
    debug!("loaded {what} from {} ({} bytes)", path.display(), json.len());
    Ok(parsed)
}
