use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_WDA_PORT: u16 = 8100;

const STATUS_TIMEOUT: Duration = Duration::from_secs(2);
const SESSION_TIMEOUT: Duration = Duration::from_secs(10);
const INTERACTION_TIMEOUT: Duration = Duration::from_secs(10);
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(30);
const BOOTSTRAP_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Handle to a live WebDriverAgent session. Created lazily on first use,
/// reused for the rest of the process, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WdaSessionHandle {
    pub session_id: String,
    pub bundle_id: Option<String>,
    pub port: u16,
}

/// Client for a locally-running WebDriverAgent. All calls carry fixed
/// timeouts; a timeout or non-2xx response surfaces as an error so the
/// dispatcher can advance its fallback chain.
pub struct WdaClient {
    http: reqwest::Client,
    port: u16,
    session: Mutex<Option<WdaSessionHandle>>,
}

impl WdaClient {
    pub fn new(port: u16) -> Self {
        Self {
            http: reqwest::Client::new(),
            port,
            session: Mutex::new(None),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Status probe. True only if `/status` answers 2xx within the short
    /// probe timeout.
    pub async fn is_responding(&self) -> bool {
        let url = format!("{}/status", self.base_url());
        match self.http.get(&url).timeout(STATUS_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Returns the current session id, creating a session on first use.
    pub async fn ensure_session(&self, bundle_id: Option<&str>) -> Result<String> {
        let mut guard = self.session.lock().await;
        if let Some(handle) = guard.as_ref() {
            return Ok(handle.session_id.clone());
        }

        let capabilities = match bundle_id {
            Some(id) => json!({"capabilities": {"alwaysMatch": {"bundleId": id}}}),
            None => json!({"capabilities": {}}),
        };

        let url = format!("{}/session", self.base_url());
        let resp = self
            .http
            .post(&url)
            .timeout(SESSION_TIMEOUT)
            .json(&capabilities)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Automation(format!(
                "WDA session creation failed with status {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await?;
        let session_id = parse_session_id(&body).ok_or_else(|| {
            Error::Automation("WDA session response carried no session id".to_string())
        })?;

        tracing::debug!(session_id = %session_id, port = self.port, "created WDA session");

        *guard = Some(WdaSessionHandle {
            session_id: session_id.clone(),
            bundle_id: bundle_id.map(String::from),
            port: self.port,
        });
        Ok(session_id)
    }

    pub async fn tap(&self, x: f64, y: f64) -> Result<()> {
        let session_id = self.ensure_session(None).await?;
        let url = format!("{}/session/{}/wda/tap/0", self.base_url(), session_id);
        self.post_expect_success(&url, json!({"x": x, "y": y})).await
    }

    pub async fn type_text(&self, text: &str) -> Result<()> {
        let session_id = self.ensure_session(None).await?;
        let url = format!("{}/session/{}/wda/keys", self.base_url(), session_id);
        self.post_expect_success(&url, json!({"value": [text]})).await
    }

    pub async fn drag(&self, from_x: f64, from_y: f64, to_x: f64, to_y: f64, duration_secs: f64) -> Result<()> {
        let session_id = self.ensure_session(None).await?;
        let url = format!(
            "{}/session/{}/wda/dragfromtoforduration",
            self.base_url(),
            session_id
        );
        self.post_expect_success(
            &url,
            json!({
                "fromX": from_x,
                "fromY": from_y,
                "toX": to_x,
                "toY": to_y,
                "duration": duration_secs,
            }),
        )
        .await
    }

    /// Fetch the element hierarchy as JSON. Returns the root node.
    pub async fn source_tree(&self) -> Result<Value> {
        let url = format!("{}/source?format=json", self.base_url());
        let resp = self
            .http
            .get(&url)
            .timeout(INTERACTION_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Automation(format!(
                "WDA source fetch failed with status {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await?;
        // WDA wraps the tree in {"value": ...}; tolerate a bare tree too.
        Ok(body.get("value").cloned().unwrap_or(body))
    }

    /// Build and launch the WebDriverAgent runner on the given device, then
    /// poll `/status` until it answers or the bootstrap window closes. Used
    /// by the probe when the caller asked for a lazy start-up.
    pub async fn bootstrap(&self, device_id: &str) -> Result<()> {
        if self.is_responding().await {
            return Ok(());
        }

        tracing::info!(device_id, port = self.port, "launching WebDriverAgent runner");

        let mut child = tokio::process::Command::new("xcodebuild")
            .args([
                "test",
                "-project",
                "WebDriverAgent.xcodeproj",
                "-scheme",
                "WebDriverAgentRunner",
                "-destination",
                &format!("id={}", device_id),
            ])
            .env("USE_PORT", self.port.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| Error::Automation(format!("failed to spawn xcodebuild: {}", e)))?;

        let deadline = tokio::time::Instant::now() + BOOTSTRAP_TIMEOUT;
        loop {
            if self.is_responding().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                let _ = child.start_kill();
                return Err(Error::Timeout(BOOTSTRAP_TIMEOUT));
            }
            tokio::time::sleep(BOOTSTRAP_POLL_INTERVAL).await;
        }
    }

    async fn post_expect_success(&self, url: &str, body: Value) -> Result<()> {
        let resp = self
            .http
            .post(url)
            .timeout(INTERACTION_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Automation(format!(
                "WDA call {} failed with status {}",
                url,
                resp.status()
            )))
        }
    }
}

/// WDA has returned the session id both at the top level and nested under
/// "value" across versions.
fn parse_session_id(body: &Value) -> Option<String> {
    body.get("sessionId")
        .or_else(|| body.pointer("/value/sessionId"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_top_level_session_id() {
        let body = json!({"sessionId": "ABC-123", "status": 0});
        assert_eq!(parse_session_id(&body).as_deref(), Some("ABC-123"));
    }

    #[test]
    fn parses_nested_session_id() {
        let body = json!({"value": {"sessionId": "DEF-456", "capabilities": {}}});
        assert_eq!(parse_session_id(&body).as_deref(), Some("DEF-456"));
    }

    #[test]
    fn missing_session_id_is_none() {
        let body = json!({"value": {}});
        assert_eq!(parse_session_id(&body), None);
    }

    #[tokio::test]
    async fn status_probe_is_false_when_nothing_listens() {
        // Port 1 is never a WDA endpoint.
        let client = WdaClient::new(1);
        assert!(!client.is_responding().await);
    }
}
