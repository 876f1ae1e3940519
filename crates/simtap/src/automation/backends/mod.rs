mod applescript;
mod axe;
mod cliclick;
mod idb;
mod wda;

pub use applescript::AppleScriptBackend;
pub use axe::AxeBackend;
pub use cliclick::CliclickBackend;
pub use idb::IdbBackend;
pub use wda::WdaBackend;

use crate::{Error, Result};

/// `which`-style existence check for a command-line bridge.
pub(crate) async fn binary_exists(name: &str) -> bool {
    match tokio::process::Command::new("which").arg(name).output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Run a bridge command, treating a spawn failure or non-zero exit as one
/// failed attempt.
pub(crate) async fn run_expect_success(program: &str, args: &[&str]) -> Result<()> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::Automation(format!("failed to run {}: {}", program, e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Automation(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
