use async_trait::async_trait;

use super::{binary_exists, run_expect_success};
use crate::Result;
use crate::automation::backend::{
    BackendAction, BackendDescriptor, Capability, CoordinateSpace, InteractionBackend,
};

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    name: "idb",
    capabilities: &[Capability::Tap, Capability::TypeText, Capability::Swipe],
    coordinate_space: CoordinateSpace::DeviceNative,
};

/// Direct command-line bridge over Facebook's idb. Interaction only;
/// discovery is routed through the session backend.
pub struct IdbBackend;

#[async_trait]
impl InteractionBackend for IdbBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self) -> bool {
        binary_exists("idb").await
    }

    async fn execute(&self, device_id: &str, action: &BackendAction) -> Result<()> {
        match action {
            BackendAction::Tap { at } => {
                let x = at.x.round().to_string();
                let y = at.y.round().to_string();
                run_expect_success("idb", &["ui", "tap", &x, &y, "--udid", device_id]).await
            }
            BackendAction::TypeText { text } => {
                run_expect_success("idb", &["ui", "text", text, "--udid", device_id]).await
            }
            BackendAction::Swipe { from, to, duration_secs } => {
                let x1 = from.x.round().to_string();
                let y1 = from.y.round().to_string();
                let x2 = to.x.round().to_string();
                let y2 = to.y.round().to_string();
                let duration = duration_secs.to_string();
                run_expect_success(
                    "idb",
                    &[
                        "ui", "swipe", &x1, &y1, &x2, &y2, "--duration", &duration, "--udid",
                        device_id,
                    ],
                )
                .await
            }
        }
    }
}
