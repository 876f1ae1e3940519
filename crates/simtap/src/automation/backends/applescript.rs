use async_trait::async_trait;

use super::{binary_exists, run_expect_success};
use crate::{Error, Result};
use crate::automation::backend::{
    BackendAction, BackendDescriptor, Capability, CoordinateSpace, InteractionBackend,
};

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    name: "applescript",
    capabilities: &[Capability::Tap, Capability::TypeText],
    coordinate_space: CoordinateSpace::HostAbsolute,
};

/// OS scripting fallback: System Events clicks and keystrokes through
/// osascript. Last in the priority order.
pub struct AppleScriptBackend;

impl AppleScriptBackend {
    fn escape(text: &str) -> String {
        text.replace('\\', "\\\\").replace('"', "\\\"")
    }
}

#[async_trait]
impl InteractionBackend for AppleScriptBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self) -> bool {
        binary_exists("osascript").await
    }

    async fn execute(&self, _device_id: &str, action: &BackendAction) -> Result<()> {
        match action {
            BackendAction::Tap { at } => {
                let script = format!(
                    r#"tell application "System Events"
    click at {{{}, {}}}
end tell"#,
                    at.x.round() as i64,
                    at.y.round() as i64
                );
                run_expect_success("osascript", &["-e", &script]).await
            }
            BackendAction::TypeText { text } => {
                let script = format!(
                    r#"tell application "System Events"
    keystroke "{}"
end tell"#,
                    Self::escape(text)
                );
                run_expect_success("osascript", &["-e", &script]).await
            }
            BackendAction::Swipe { .. } => Err(Error::Automation(
                "System Events cannot synthesize a drag gesture".to_string(),
            )),
        }
    }
}
