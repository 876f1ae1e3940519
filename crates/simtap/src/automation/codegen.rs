use std::fmt::Write;

use super::backend::Point;
use super::recording::{ActionRecord, AutomationSession, ElementSummary};

/// Options for XCUITest source generation.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub class_name: String,
    pub test_name: String,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            class_name: "GeneratedUITests".to_string(),
            test_name: "testRecordedFlow".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Classify a swipe by its dominant axis; ties favor vertical. Generated
/// code keeps only the direction, not the coordinates.
pub fn classify_swipe(from: Point, to: Point) -> SwipeDirection {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dy.abs() >= dx.abs() {
        if dy >= 0.0 { SwipeDirection::Down } else { SwipeDirection::Up }
    } else if dx >= 0.0 {
        SwipeDirection::Right
    } else {
        SwipeDirection::Left
    }
}

impl SwipeDirection {
    fn swift_call(&self) -> &'static str {
        match self {
            SwipeDirection::Up => "swipeUp()",
            SwipeDirection::Down => "swipeDown()",
            SwipeDirection::Left => "swipeLeft()",
            SwipeDirection::Right => "swipeRight()",
        }
    }
}

/// XCUIElementQuery accessor for a recorded element type. Unrecognized types
/// fall back to the generic otherElements query.
fn accessor_for(element_type: &str) -> &'static str {
    match element_type {
        "Button" => "buttons",
        "TextField" => "textFields",
        "SecureTextField" => "secureTextFields",
        "StaticText" => "staticTexts",
        "Switch" => "switches",
        "Cell" => "cells",
        "Link" => "links",
        "Image" => "images",
        "SearchField" => "searchFields",
        "TextView" => "textViews",
        "Slider" => "sliders",
        _ => "otherElements",
    }
}

/// Escape for a Swift string literal.
fn escape_swift(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn tap_statement(element: &Option<ElementSummary>, at: Point) -> String {
    match element {
        Some(summary) => match &summary.label {
            Some(label) => format!(
                "app.{}[\"{}\"].tap()",
                accessor_for(&summary.element_type),
                escape_swift(label)
            ),
            // Element known but unlabeled: fall back to its coordinates.
            None => coordinate_tap(at),
        },
        None => coordinate_tap(at),
    }
}

fn coordinate_tap(at: Point) -> String {
    format!(
        "app.coordinate(withNormalizedOffset: CGVector(dx: 0, dy: 0)).withOffset(CGVector(dx: {}, dy: {})).tap()",
        at.x, at.y
    )
}

/// Compile a recorded session into XCUITest Swift source: one setup routine
/// launching the target app, one test method with one statement per action
/// in chronological order. Purely textual; no verification that the output
/// compiles or that the labels still exist.
pub fn synthesize(session: &AutomationSession, options: &SynthesisOptions) -> String {
    let mut out = String::new();

    out.push_str("import XCTest\n\n");
    let _ = writeln!(out, "final class {}: XCTestCase {{", options.class_name);
    out.push_str("    var app: XCUIApplication!\n\n");
    out.push_str("    override func setUpWithError() throws {\n");
    out.push_str("        continueAfterFailure = false\n");
    match &session.bundle_id {
        Some(bundle_id) => {
            let _ = writeln!(
                out,
                "        app = XCUIApplication(bundleIdentifier: \"{}\")",
                escape_swift(bundle_id)
            );
        }
        None => out.push_str("        app = XCUIApplication()\n"),
    }
    out.push_str("        app.launch()\n");
    out.push_str("    }\n\n");

    let _ = writeln!(out, "    func {}() throws {{", options.test_name);
    if session.actions.is_empty() {
        out.push_str("        // No actions were recorded in this session.\n");
    }
    for action in &session.actions {
        for line in statements_for(&action.record) {
            let _ = writeln!(out, "        {}", line);
        }
    }
    out.push_str("    }\n");
    out.push_str("}\n");
    out
}

fn statements_for(record: &ActionRecord) -> Vec<String> {
    match record {
        ActionRecord::Tap { element, at } => vec![tap_statement(element, *at)],
        ActionRecord::TypeText { text } => {
            vec![format!("app.typeText(\"{}\")", escape_swift(text))]
        }
        ActionRecord::Swipe { from, to } => {
            vec![format!("app.{}", classify_swipe(*from, *to).swift_call())]
        }
        ActionRecord::Wait { seconds } => {
            vec![format!("Thread.sleep(forTimeInterval: {})", seconds)]
        }
        ActionRecord::Screenshot { .. } => vec![
            "let attachment = XCTAttachment(screenshot: app.screenshot())".to_string(),
            "attachment.lifetime = .keepAlways".to_string(),
            "add(attachment)".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::recording::{RecordedAction, Recorder};
    use std::path::PathBuf;

    fn session_with(records: Vec<ActionRecord>, bundle_id: Option<&str>) -> AutomationSession {
        let recorder = Recorder::new();
        recorder.start(bundle_id.map(String::from));
        for record in records {
            recorder.record(RecordedAction::now(record));
        }
        recorder.stop().unwrap()
    }

    #[test]
    fn swipe_classification_is_symmetric() {
        let o = Point::new(0.0, 0.0);
        assert_eq!(classify_swipe(o, Point::new(0.0, 100.0)), SwipeDirection::Down);
        assert_eq!(classify_swipe(Point::new(0.0, 100.0), o), SwipeDirection::Up);
        assert_eq!(classify_swipe(o, Point::new(100.0, 0.0)), SwipeDirection::Right);
        assert_eq!(classify_swipe(Point::new(100.0, 0.0), o), SwipeDirection::Left);
        // Vertical dominates a diagonal.
        assert_eq!(classify_swipe(o, Point::new(30.0, 100.0)), SwipeDirection::Down);
        // Exact ties favor vertical.
        assert_eq!(classify_swipe(o, Point::new(50.0, 50.0)), SwipeDirection::Down);
    }

    #[test]
    fn tap_by_label_and_type_appear_in_output() {
        let session = session_with(
            vec![
                ActionRecord::Tap {
                    element: Some(ElementSummary {
                        element_type: "Button".to_string(),
                        label: Some("Login".to_string()),
                    }),
                    at: Point::new(70.0, 122.0),
                },
                ActionRecord::TypeText { text: "hello".to_string() },
            ],
            Some("com.example.demo"),
        );

        let source = synthesize(&session, &SynthesisOptions::default());
        assert!(source.contains("app.buttons[\"Login\"].tap()"));
        assert!(source.contains("app.typeText(\"hello\")"));
        assert!(source.contains("XCUIApplication(bundleIdentifier: \"com.example.demo\")"));
        assert!(source.contains("func testRecordedFlow() throws"));
    }

    #[test]
    fn coordinate_tap_is_anchored_at_app_origin() {
        let session = session_with(
            vec![ActionRecord::Tap { element: None, at: Point::new(10.0, 20.0) }],
            None,
        );
        let source = synthesize(&session, &SynthesisOptions::default());
        assert!(source.contains("withOffset(CGVector(dx: 10, dy: 20)).tap()"));
        assert!(source.contains("app = XCUIApplication()\n"));
    }

    #[test]
    fn unknown_element_type_uses_other_elements() {
        assert_eq!(accessor_for("Map"), "otherElements");
        assert_eq!(accessor_for("SecureTextField"), "secureTextFields");
    }

    #[test]
    fn typed_text_is_escaped_for_swift() {
        let session = session_with(
            vec![ActionRecord::TypeText { text: "say \"hi\"\\now".to_string() }],
            None,
        );
        let source = synthesize(&session, &SynthesisOptions::default());
        assert!(source.contains(r#"app.typeText("say \"hi\"\\now")"#));
    }

    #[test]
    fn swipe_wait_and_screenshot_statements() {
        let session = session_with(
            vec![
                ActionRecord::Swipe { from: Point::new(200.0, 600.0), to: Point::new(200.0, 200.0) },
                ActionRecord::Wait { seconds: 1.5 },
                ActionRecord::Screenshot { path: PathBuf::from("/tmp/s.png") },
            ],
            None,
        );
        let source = synthesize(&session, &SynthesisOptions::default());
        assert!(source.contains("app.swipeUp()"));
        assert!(source.contains("Thread.sleep(forTimeInterval: 1.5)"));
        assert!(source.contains("XCTAttachment(screenshot: app.screenshot())"));
    }

    #[test]
    fn statements_are_emitted_in_chronological_order() {
        let session = session_with(
            vec![
                ActionRecord::TypeText { text: "first".to_string() },
                ActionRecord::TypeText { text: "second".to_string() },
            ],
            None,
        );
        let source = synthesize(&session, &SynthesisOptions::default());
        let first = source.find("first").unwrap();
        let second = source.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn empty_session_still_produces_a_test_shell() {
        let session = session_with(vec![], None);
        let source = synthesize(&session, &SynthesisOptions::default());
        assert!(source.contains("final class GeneratedUITests"));
        assert!(source.contains("No actions were recorded"));
    }
}
