use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::{Error, Result};

/// A simulator known to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimDevice {
    pub udid: String,
    pub name: String,
    pub state: String,
}

impl SimDevice {
    pub fn is_booted(&self) -> bool {
        self.state == "Booted"
    }
}

/// Resolves the default target device. The dispatcher consumes this boundary
/// only; device lifecycle (boot, shutdown, install) lives elsewhere.
pub struct DeviceBroker {
    active_override: Mutex<Option<String>>,
}

impl DeviceBroker {
    pub fn new() -> Self {
        Self { active_override: Mutex::new(None) }
    }

    /// Broker pinned to a known udid. Used by tests and by callers that
    /// already resolved a device.
    pub fn with_fixed_device(udid: &str) -> Self {
        Self {
            active_override: Mutex::new(Some(udid.to_string())),
        }
    }

    pub fn set_active(&self, udid: &str) {
        *self.active_override.lock().unwrap() = Some(udid.to_string());
    }

    /// The udid actions should target: the pinned device if one was set,
    /// otherwise the first booted simulator.
    pub async fn active_device_id(&self) -> Result<String> {
        if let Some(udid) = self.active_override.lock().unwrap().clone() {
            return Ok(udid);
        }
        match self.booted_device().await? {
            Some(device) => Ok(device.udid),
            None => Err(Error::Automation("no booted simulator found".to_string())),
        }
    }

    pub async fn is_device_active(&self) -> bool {
        self.active_device_id().await.is_ok()
    }

    /// First booted simulator, per `simctl list`.
    pub async fn booted_device(&self) -> Result<Option<SimDevice>> {
        let output = tokio::process::Command::new("xcrun")
            .args(["simctl", "list", "devices", "-j"])
            .output()
            .await
            .map_err(|e| Error::Automation(format!("failed to list devices: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Automation(format!(
                "simctl list failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        Ok(first_booted(&parsed))
    }
}

impl Default for DeviceBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn first_booted(parsed: &serde_json::Value) -> Option<SimDevice> {
    let runtimes = parsed.get("devices")?.as_object()?;
    for device_list in runtimes.values() {
        let Some(devices) = device_list.as_array() else { continue };
        for device in devices {
            let state = device.get("state").and_then(|s| s.as_str()).unwrap_or("");
            if state != "Booted" {
                continue;
            }
            let udid = device.get("udid").and_then(|u| u.as_str())?;
            let name = device.get("name").and_then(|n| n.as_str()).unwrap_or("Unknown");
            return Some(SimDevice {
                udid: udid.to_string(),
                name: name.to_string(),
                state: state.to_string(),
            });
        }
    }
    None
}
