use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A point in device pixels. Whether a backend receives this as-is or
/// translated to host-screen coordinates is decided by its coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// What a backend can do. Discovery is element-tree retrieval; the rest are
/// interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Discovery,
    Tap,
    TypeText,
    Swipe,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Capability::Discovery => "discovery",
            Capability::Tap => "tap",
            Capability::TypeText => "type_text",
            Capability::Swipe => "swipe",
        };
        write!(f, "{}", s)
    }
}

/// Addressing scheme a backend expects. DeviceNative points pass through
/// untranslated; HostAbsolute points must be offset by the simulator window
/// origin before the backend sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    DeviceNative,
    HostAbsolute,
}

/// Static description of a backend: its name, what it supports, and which
/// coordinate space it addresses.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub name: &'static str,
    pub capabilities: &'static [Capability],
    pub coordinate_space: CoordinateSpace,
}

impl BackendDescriptor {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A fully-resolved low-level action. Points are already in the executing
/// backend's coordinate space by the time `execute` sees them.
#[derive(Debug, Clone)]
pub enum BackendAction {
    Tap { at: Point },
    TypeText { text: String },
    Swipe { from: Point, to: Point, duration_secs: f64 },
}

impl BackendAction {
    pub fn capability(&self) -> Capability {
        match self {
            BackendAction::Tap { .. } => Capability::Tap,
            BackendAction::TypeText { .. } => Capability::TypeText,
            BackendAction::Swipe { .. } => Capability::Swipe,
        }
    }

    /// Bound on a single backend attempt. Taps are quick; typing and swipes
    /// take longer on slow hosts.
    pub fn attempt_timeout(&self) -> Duration {
        match self {
            BackendAction::Tap { .. } => Duration::from_secs(5),
            BackendAction::TypeText { .. } => Duration::from_secs(10),
            BackendAction::Swipe { .. } => Duration::from_secs(10),
        }
    }
}

/// One interaction provider in the fallback chain. Implementations are
/// probed, never owned: `probe` must be side-effect-free and must not error,
/// and `execute` performs exactly one bounded attempt.
#[async_trait]
pub trait InteractionBackend: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;

    /// Whether the backend is currently usable (installed, running,
    /// responding). Never errors; unusable is just `false`.
    async fn probe(&self) -> bool;

    /// Perform one low-level action against the device. Points in `action`
    /// are already in this backend's coordinate space.
    async fn execute(&self, device_id: &str, action: &BackendAction) -> Result<()>;

    /// Retrieve the on-screen element hierarchy. Only discovery-capable
    /// backends override this; there is no element-level fallback for
    /// interaction-only backends.
    async fn element_tree(&self) -> Result<serde_json::Value> {
        Err(Error::Automation(format!(
            "{} does not support element discovery",
            self.descriptor().name
        )))
    }
}
