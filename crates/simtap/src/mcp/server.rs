use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::timeout;

const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool_name: String,
    pub result: Value,
    pub success: bool,
}

#[async_trait]
pub trait Tool: Send + Sync {
    async fn execute(&self, params: Value) -> Result<Value>;
    fn schema(&self) -> &ToolSchema;
}

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registry and entry point for the tool surface. Tools are thin wrappers
/// over the dispatcher; every call is bounded and returns the uniform
/// `{success, ...}` payload.
pub struct AutomationToolServer {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for AutomationToolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationToolServer")
            .field("tools", &"<tools>")
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl AutomationToolServer {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name.clone();
        let mut tools = self
            .tools
            .write()
            .map_err(|e| Error::Automation(format!("failed to acquire tool lock: {}", e)))?;
        tools.insert(name, tool);
        Ok(())
    }

    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .read()
            .map(|tools| tools.values().map(|t| t.schema().clone()).collect())
            .unwrap_or_default()
    }

    pub async fn call_tool(&self, request: ToolRequest) -> Result<ToolResponse> {
        self.metrics.record_tool_call(&request.tool_name);

        let result = timeout(
            TOOL_CALL_TIMEOUT,
            self.execute_tool(&request.tool_name, request.params),
        )
        .await
        .map_err(|_| Error::Timeout(TOOL_CALL_TIMEOUT))??;

        Ok(ToolResponse {
            result,
            tool_name: request.tool_name,
            success: true,
        })
    }

    async fn execute_tool(&self, tool_name: &str, params: Value) -> Result<Value> {
        let tool = {
            let tools = self
                .tools
                .read()
                .map_err(|e| Error::Automation(format!("failed to acquire tool lock: {}", e)))?;
            tools
                .get(tool_name)
                .ok_or_else(|| Error::Automation(format!("tool not found: {}", tool_name)))?
                .clone()
        };

        tool.execute(params).await
    }
}

impl Default for AutomationToolServer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Metrics {
    tool_calls: RwLock<HashMap<String, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tool_calls: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_tool_call(&self, tool_name: &str) {
        if let Ok(mut calls) = self.tool_calls.write() {
            *calls.entry(tool_name.to_string()).or_insert(0) += 1;
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        schema: ToolSchema,
    }

    #[async_trait]
    impl Tool for EchoTool {
        async fn execute(&self, params: Value) -> Result<Value> {
            Ok(json!({"success": true, "echo": params}))
        }

        fn schema(&self) -> &ToolSchema {
            &self.schema
        }
    }

    #[tokio::test]
    async fn registered_tool_is_callable() {
        let server = AutomationToolServer::new();
        server
            .register_tool(Arc::new(EchoTool {
                schema: ToolSchema {
                    name: "echo".to_string(),
                    description: "Echo params".to_string(),
                    parameters: json!({"type": "object"}),
                },
            }))
            .unwrap();

        let response = server
            .call_tool(ToolRequest {
                tool_name: "echo".to_string(),
                params: json!({"x": 1}),
            })
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.result["echo"]["x"], json!(1));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let server = AutomationToolServer::new();
        let err = server
            .call_tool(ToolRequest {
                tool_name: "missing".to_string(),
                params: json!({}),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tool not found"));
    }
}
