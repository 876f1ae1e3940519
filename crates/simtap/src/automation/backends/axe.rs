use async_trait::async_trait;

use super::{binary_exists, run_expect_success};
use crate::Result;
use crate::automation::backend::{
    BackendAction, BackendDescriptor, Capability, CoordinateSpace, InteractionBackend,
};

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    name: "axe",
    capabilities: &[Capability::Tap, Capability::TypeText, Capability::Swipe],
    coordinate_space: CoordinateSpace::DeviceNative,
};

/// Accessibility-bridge CLI. Drives the simulator through the accessibility
/// APIs with device-native coordinates.
pub struct AxeBackend;

#[async_trait]
impl InteractionBackend for AxeBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self) -> bool {
        binary_exists("axe").await
    }

    async fn execute(&self, device_id: &str, action: &BackendAction) -> Result<()> {
        match action {
            BackendAction::Tap { at } => {
                let x = at.x.round().to_string();
                let y = at.y.round().to_string();
                run_expect_success("axe", &["tap", "-x", &x, "-y", &y, "--udid", device_id]).await
            }
            BackendAction::TypeText { text } => {
                run_expect_success("axe", &["type", text, "--udid", device_id]).await
            }
            BackendAction::Swipe { from, to, duration_secs } => {
                let x1 = from.x.round().to_string();
                let y1 = from.y.round().to_string();
                let x2 = to.x.round().to_string();
                let y2 = to.y.round().to_string();
                let duration = duration_secs.to_string();
                run_expect_success(
                    "axe",
                    &[
                        "swipe",
                        "--start-x",
                        &x1,
                        "--start-y",
                        &y1,
                        "--end-x",
                        &x2,
                        "--end-y",
                        &y2,
                        "--duration",
                        &duration,
                        "--udid",
                        device_id,
                    ],
                )
                .await
            }
        }
    }
}
