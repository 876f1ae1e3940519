pub mod backend;
pub mod backends;
pub mod codegen;
pub mod dispatcher;
pub mod element;
pub mod probe;
pub mod recording;
pub mod wda;
pub mod window;

pub use backend::{BackendAction, BackendDescriptor, Capability, CoordinateSpace, InteractionBackend, Point};
pub use dispatcher::{Action, Dispatcher};
pub use element::{ElementQuery, UiElement};
pub use probe::{BackendRegistry, ProbeOptions};
pub use recording::{AutomationSession, RecordedAction, Recorder};
