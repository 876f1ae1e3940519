use std::path::PathBuf;

use crate::{Error, Result};

/// Capture the simulated screen to a PNG. When no path is given, a unique
/// file in the temp directory is used.
pub async fn capture(device_id: &str, output_path: Option<PathBuf>) -> Result<PathBuf> {
    let path = output_path.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("simtap-screenshot-{}.png", uuid::Uuid::new_v4()))
    });

    let output = tokio::process::Command::new("xcrun")
        .args(["simctl", "io", device_id, "screenshot"])
        .arg(&path)
        .output()
        .await
        .map_err(|e| Error::Automation(format!("failed to run simctl screenshot: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Automation(format!(
            "screenshot capture failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    tracing::debug!(device_id, path = %path.display(), "captured screenshot");
    Ok(path)
}
