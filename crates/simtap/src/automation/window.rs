use crate::{Error, Result};
use async_trait::async_trait;

use super::backend::{CoordinateSpace, Point};

/// Height of the simulator window's title bar in host pixels. Window-relative
/// backends tap below it. This assumes device pixels equal host-window pixels
/// (no Retina scale correction), which only holds for specific device/host
/// pairings; callers supply coordinates already in the backend's scale.
pub const TITLE_BAR_OFFSET: f64 = 28.0;

/// On-screen bounds of the host window showing the simulated screen.
/// Recomputed on every window-relative action; the window may move between
/// calls, so these values are never cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WindowBounds {
    /// Map a device-pixel point into host-absolute coordinates.
    pub fn to_host(&self, point: Point) -> Point {
        Point::new(self.x + point.x, self.y + TITLE_BAR_OFFSET + point.y)
    }
}

/// Total function over the coordinate-space tag: identity for device-native
/// backends, window-origin offset for host-absolute ones.
#[async_trait]
pub trait CoordinateTranslator: Send + Sync {
    async fn translate(&self, point: Point, space: CoordinateSpace) -> Result<Point>;
}

/// Translator backed by the real Simulator.app window, queried through
/// System Events.
pub struct SimulatorWindowTranslator;

#[async_trait]
impl CoordinateTranslator for SimulatorWindowTranslator {
    async fn translate(&self, point: Point, space: CoordinateSpace) -> Result<Point> {
        match space {
            CoordinateSpace::DeviceNative => Ok(point),
            CoordinateSpace::HostAbsolute => {
                let bounds = simulator_window_bounds().await?;
                Ok(bounds.to_host(point))
            }
        }
    }
}

/// Bring the Simulator to the foreground and read its front window's bounds.
/// Failure here is a hard failure for the requesting backend; the dispatcher
/// advances to the next backend in the chain.
pub async fn simulator_window_bounds() -> Result<WindowBounds> {
    let activate = r#"
    tell application "Simulator"
        activate
    end tell
    delay 0.1
    "#;
    let _ = tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(activate)
        .output()
        .await;

    let script = r#"
    tell application "System Events"
        tell process "Simulator"
            set windowPosition to position of front window
            set windowSize to size of front window
            return (item 1 of windowPosition as text) & "," & (item 2 of windowPosition as text) & "," & (item 1 of windowSize as text) & "," & (item 2 of windowSize as text)
        end tell
    end tell
    "#;

    let output = tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .await
        .map_err(|e| Error::WindowBounds(format!("failed to run osascript: {}", e)))?;

    if !output.status.success() {
        return Err(Error::WindowBounds(format!(
            "System Events query failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    parse_bounds(&text)
        .ok_or_else(|| Error::WindowBounds(format!("unparseable window bounds: {:?}", text)))
}

fn parse_bounds(text: &str) -> Option<WindowBounds> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return None;
    }
    Some(WindowBounds {
        x: parts[0].parse().ok()?,
        y: parts[1].parse().ok()?,
        width: parts[2].parse().ok()?,
        height: parts[3].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_bounds_string() {
        let bounds = parse_bounds("100, 50, 400, 800").unwrap();
        assert_eq!(bounds.x, 100.0);
        assert_eq!(bounds.y, 50.0);
        assert_eq!(bounds.width, 400.0);
        assert_eq!(bounds.height, 800.0);
    }

    #[test]
    fn rejects_malformed_bounds() {
        assert!(parse_bounds("").is_none());
        assert!(parse_bounds("1,2,3").is_none());
        assert!(parse_bounds("a,b,c,d").is_none());
    }

    #[test]
    fn host_translation_adds_origin_and_title_bar() {
        let bounds = WindowBounds { x: 100.0, y: 50.0, width: 400.0, height: 800.0 };
        let p = bounds.to_host(Point::new(10.0, 20.0));
        assert_eq!(p.x, 110.0);
        assert_eq!(p.y, 50.0 + TITLE_BAR_OFFSET + 20.0);
    }

    #[tokio::test]
    async fn device_native_translation_is_identity() {
        let translator = SimulatorWindowTranslator;
        let p = translator
            .translate(Point::new(12.0, 34.0), CoordinateSpace::DeviceNative)
            .await
            .unwrap();
        assert_eq!(p, Point::new(12.0, 34.0));
    }
}
