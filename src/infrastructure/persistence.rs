// On-disk session and portal state
use crate::domain::error::{EnlightenError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Discovered system id and device ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalState {
    pub system_id: String,
    pub device_index: Vec<String>,
}

/// Cookies of an authenticated portal session, as `name=value` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<String>,
}

pub async fn save_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let text = toml::to_string_pretty(value)
        .map_err(|e| EnlightenError::Serialization(e.to_string()))?;
    tokio::fs::write(path, text).await?;
    tracing::debug!("Saved {}", path.display());
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub async fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = toml::from_str(&text)
        .map_err(|e| EnlightenError::Serialization(format!("{}: {}", path.display(), e)))?;
    Ok(Some(value))
}
