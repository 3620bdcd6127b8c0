use anyhow::{Context, Result};

/// Prints build metadata; the sealed blob is never opened.
pub fn run() -> Result<()> {
    let payload = super::embedded_payload()?;
    let rendered = serde_json::to_string_pretty(&payload.metadata)
        .context("failed to render build metadata")?;
    println!("{rendered}");
    Ok(())
}
