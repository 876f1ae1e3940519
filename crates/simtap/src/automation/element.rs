use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Error, Result};

use super::backend::Point;

/// Element types that are interactive on their own, without the backend
/// having to mark them accessible.
static INTERACTIVE_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Button",
        "Cell",
        "Checkbox",
        "Key",
        "Link",
        "PickerWheel",
        "SearchField",
        "SecureTextField",
        "SegmentedControl",
        "Slider",
        "Stepper",
        "Switch",
        "TextField",
        "TextView",
    ]
    .into_iter()
    .collect()
});

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A discovered on-screen control, flattened out of the backend's hierarchy.
/// The tree itself is not retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiElement {
    pub id: u64,
    pub element_type: String,
    pub label: Option<String>,
    pub value: Option<String>,
    pub placeholder: Option<String>,
    pub frame: Frame,
    pub center: Point,
    pub enabled: bool,
    pub visible: bool,
    pub interactable: bool,
}

/// Conjunctive element filter. All provided fields must match; text matching
/// is case-insensitive substring. `index` disambiguates multiple matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementQuery {
    pub label: Option<String>,
    pub element_type: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub index: usize,
}

impl ElementQuery {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    fn matches(&self, element: &UiElement) -> bool {
        if let Some(label) = &self.label {
            if !contains_ci(element.label.as_deref(), label) {
                return false;
            }
        }
        if let Some(element_type) = &self.element_type {
            if !element
                .element_type
                .to_lowercase()
                .contains(&element_type.to_lowercase())
            {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let in_label = contains_ci(element.label.as_deref(), text);
            let in_value = contains_ci(element.value.as_deref(), text);
            let in_placeholder = contains_ci(element.placeholder.as_deref(), text);
            if !(in_label || in_value || in_placeholder) {
                return false;
            }
        }
        true
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(l) = &self.label {
            parts.push(format!("label~={:?}", l));
        }
        if let Some(t) = &self.element_type {
            parts.push(format!("type~={:?}", t));
        }
        if let Some(t) = &self.text {
            parts.push(format!("text~={:?}", t));
        }
        if parts.is_empty() {
            parts.push("any".to_string());
        }
        format!("{} index={}", parts.join(" "), self.index)
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// Pre-order flatten of a WDA-style source tree. Each node gets a synthetic,
/// process-unique id and the derived center/interactable fields.
pub fn flatten(root: &Value) -> Vec<UiElement> {
    let mut elements = Vec::new();
    flatten_into(root, &mut elements);
    elements
}

fn flatten_into(node: &Value, out: &mut Vec<UiElement>) {
    if let Some(element) = parse_node(node) {
        out.push(element);
    }
    if let Some(children) = node.get("children").and_then(|c| c.as_array()) {
        for child in children {
            flatten_into(child, out);
        }
    }
}

fn parse_node(node: &Value) -> Option<UiElement> {
    let raw_type = node.get("type")?.as_str()?;
    let element_type = raw_type
        .strip_prefix("XCUIElementType")
        .unwrap_or(raw_type)
        .to_string();

    let rect = node.get("rect").or_else(|| node.get("frame"))?;
    let frame = Frame {
        x: num(rect, "x")?,
        y: num(rect, "y")?,
        width: num(rect, "width")?,
        height: num(rect, "height")?,
    };

    let enabled = flag(node, "isEnabled").or_else(|| flag(node, "enabled")).unwrap_or(true);
    let visible = flag(node, "isVisible").or_else(|| flag(node, "visible")).unwrap_or(true);
    let accessible = flag(node, "isAccessible")
        .or_else(|| flag(node, "accessible"))
        .unwrap_or(false);

    let interactable =
        enabled && visible && (INTERACTIVE_TYPES.contains(element_type.as_str()) || accessible);

    Some(UiElement {
        id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
        element_type,
        label: text(node, "label"),
        value: text(node, "value"),
        placeholder: text(node, "placeholderValue"),
        center: frame.center(),
        frame,
        enabled,
        visible,
        interactable,
    })
}

fn num(node: &Value, key: &str) -> Option<f64> {
    match node.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// WDA has emitted attribute flags as booleans and as "1"/"0" strings across
/// versions.
fn flag(node: &Value, key: &str) -> Option<bool> {
    match node.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(s == "1" || s.eq_ignore_ascii_case("true")),
        Value::Number(n) => Some(n.as_i64() == Some(1)),
        _ => None,
    }
}

fn text(node: &Value, key: &str) -> Option<String> {
    node.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// One linear pass over the flattened list, preserving its order.
pub fn matching(elements: &[UiElement], query: &ElementQuery) -> Vec<UiElement> {
    elements
        .iter()
        .filter(|e| query.matches(e))
        .cloned()
        .collect()
}

/// Resolve a query to a single element, honoring `query.index`. Errors when
/// the index is out of range for the match count.
pub fn select(elements: &[UiElement], query: &ElementQuery) -> Result<UiElement> {
    let matches = matching(elements, query);
    matches.get(query.index).cloned().ok_or_else(|| {
        Error::ElementNotFound(format!(
            "{} ({} of {} matches)",
            query.describe(),
            query.index,
            matches.len()
        ))
    })
}
