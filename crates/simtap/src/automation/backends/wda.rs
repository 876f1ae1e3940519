use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::automation::backend::{
    BackendAction, BackendDescriptor, Capability, CoordinateSpace, InteractionBackend,
};
use crate::automation::wda::WdaClient;

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    name: "webdriveragent",
    capabilities: &[
        Capability::Discovery,
        Capability::Tap,
        Capability::TypeText,
        Capability::Swipe,
    ],
    coordinate_space: CoordinateSpace::DeviceNative,
};

/// Session-based remote driver. The only backend that supports element
/// discovery; first in the priority order for everything it can do.
pub struct WdaBackend {
    client: Arc<WdaClient>,
}

impl WdaBackend {
    pub fn new(client: Arc<WdaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InteractionBackend for WdaBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self) -> bool {
        self.client.is_responding().await
    }

    async fn execute(&self, _device_id: &str, action: &BackendAction) -> Result<()> {
        match action {
            BackendAction::Tap { at } => self.client.tap(at.x, at.y).await,
            BackendAction::TypeText { text } => self.client.type_text(text).await,
            BackendAction::Swipe { from, to, duration_secs } => {
                self.client.drag(from.x, from.y, to.x, to.y, *duration_secs).await
            }
        }
    }

    async fn element_tree(&self) -> Result<serde_json::Value> {
        self.client.source_tree().await
    }
}
