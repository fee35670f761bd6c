//! Reading configuration files.

use tokio::io::{AsyncWrite, AsyncWriteExt as _};

use crate::prelude::*;

/// Is this data JSON? We look at the extension first, then sniff the first
/// non-whitespace character.
fn looks_like_json(path: &Path, data: &str) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => true,
        Some("toml") => false,
        _ => data.trim_start().starts_with('{'),
    }
}

/// Read TOML or JSON from a file.
pub async fn read_json_or_toml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    // Read all at once because our parsing libraries don't do async I/O.
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))?;
    if looks_like_json(path, &data) {
        serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse JSON from file at path: {:?}", path)
        })
    } else {
        toml::from_str(&data).with_context(|| {
            format!("Failed to parse TOML from file at path: {:?}", path)
        })
    }
}

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write `line` plus a newline to a file or stdout, then flush.
pub async fn write_line(path: Option<&Path>, line: &str) -> Result<()> {
    let mut wtr = create_writer(path).await?;
    wtr.write_all(line.as_bytes())
        .await
        .context("Failed to write output")?;
    wtr.write_all(b"\n")
        .await
        .context("Failed to write newline to output")?;
    wtr.flush().await.context("Failed to flush output")?;
    Ok(())
}
