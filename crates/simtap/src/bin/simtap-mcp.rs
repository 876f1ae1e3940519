use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use simtap::automation::dispatcher::Dispatcher;
use simtap::automation::probe::BackendRegistry;
use simtap::automation::recording::Recorder;
use simtap::automation::wda::{DEFAULT_WDA_PORT, WdaClient};
use simtap::device::DeviceBroker;
use simtap::mcp::tools::{
    CodegenKit, RecordingKit, ScreenCaptureKit, SessionArchive, UiInteractionKit, UiQueryKit,
};
use simtap::mcp::{AutomationToolServer, ToolRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let wda = Arc::new(WdaClient::new(DEFAULT_WDA_PORT));
    let registry = BackendRegistry::standard(wda);
    let broker = Arc::new(DeviceBroker::new());
    let recorder = Arc::new(Recorder::new());
    let dispatcher = Arc::new(Dispatcher::new(registry, broker, recorder));

    let archive: SessionArchive = Arc::new(Mutex::new(None));
    let server = AutomationToolServer::new();
    server.register_tool(Arc::new(UiInteractionKit::new(dispatcher.clone())))?;
    server.register_tool(Arc::new(UiQueryKit::new(dispatcher.clone())))?;
    server.register_tool(Arc::new(ScreenCaptureKit::new(dispatcher.clone())))?;
    server.register_tool(Arc::new(RecordingKit::new(dispatcher.clone(), archive.clone())))?;
    server.register_tool(Arc::new(CodegenKit::new(archive)))?;

    tracing::info!("simtap tool server ready on stdio");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => match server.call_tool(request).await {
                Ok(response) => serde_json::to_value(response)?,
                Err(e) => json!({"success": false, "error": e.to_string()}),
            },
            Err(e) => json!({"success": false, "error": format!("invalid request: {}", e)}),
        };

        let mut bytes = serde_json::to_vec(&reply)?;
        bytes.push(b'\n');
        stdout.write_all(&bytes).await?;
        stdout.flush().await?;
    }

    Ok(())
}
