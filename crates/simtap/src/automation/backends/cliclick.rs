use async_trait::async_trait;

use super::{binary_exists, run_expect_success};
use crate::{Error, Result};
use crate::automation::backend::{
    BackendAction, BackendDescriptor, Capability, CoordinateSpace, InteractionBackend,
};

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    name: "cliclick",
    capabilities: &[Capability::Tap, Capability::TypeText],
    coordinate_space: CoordinateSpace::HostAbsolute,
};

/// Host coordinate-click utility. Window-relative: points arriving here have
/// already been offset by the simulator window origin.
pub struct CliclickBackend;

#[async_trait]
impl InteractionBackend for CliclickBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self) -> bool {
        binary_exists("cliclick").await
    }

    async fn execute(&self, _device_id: &str, action: &BackendAction) -> Result<()> {
        match action {
            BackendAction::Tap { at } => {
                let spec = format!("c:{},{}", at.x.round() as i64, at.y.round() as i64);
                run_expect_success("cliclick", &[&spec]).await
            }
            BackendAction::TypeText { text } => {
                let spec = format!("t:{}", text);
                run_expect_success("cliclick", &[&spec]).await
            }
            BackendAction::Swipe { .. } => Err(Error::Automation(
                "cliclick does not support swipe".to_string(),
            )),
        }
    }
}
