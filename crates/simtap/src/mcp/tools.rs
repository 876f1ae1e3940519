use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::Result;
use crate::automation::backend::Point;
use crate::automation::codegen::{self, SynthesisOptions};
use crate::automation::dispatcher::Dispatcher;
use crate::automation::element::ElementQuery;
use crate::automation::probe::ProbeOptions;
use crate::automation::recording::AutomationSession;

use super::server::{Tool, ToolSchema};

/// Last stopped recording, shared between the recording and codegen kits so
/// a session can be synthesized after it ends.
pub type SessionArchive = Arc<Mutex<Option<AutomationSession>>>;

fn failure(message: impl std::fmt::Display) -> Value {
    json!({"success": false, "error": message.to_string()})
}

fn query_from(params: &Value) -> Option<ElementQuery> {
    let target = params.get("target")?;
    let query = ElementQuery {
        label: target.get("label").and_then(|v| v.as_str()).map(String::from),
        element_type: target.get("type").and_then(|v| v.as_str()).map(String::from),
        text: target.get("text").and_then(|v| v.as_str()).map(String::from),
        index: target.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
    };
    if query.label.is_none() && query.element_type.is_none() && query.text.is_none() {
        return None;
    }
    Some(query)
}

fn point_from(params: &Value, x_key: &str, y_key: &str) -> Option<Point> {
    let x = params.get(x_key).and_then(|v| v.as_f64())?;
    let y = params.get(y_key).and_then(|v| v.as_f64())?;
    Some(Point::new(x, y))
}

pub struct UiInteractionKit {
    schema: ToolSchema,
    dispatcher: Arc<Dispatcher>,
}

impl UiInteractionKit {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            schema: ToolSchema {
                name: "ui_interaction".to_string(),
                description: "Tap, type, swipe, and wait on the simulator, with backend fallback"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "action": {
                            "type": "string",
                            "enum": ["tap", "type_text", "swipe", "wait"],
                            "description": "UI interaction type"
                        },
                        "coordinates": {
                            "type": "object",
                            "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
                            "description": "Device-pixel coordinates for tap"
                        },
                        "target": {
                            "type": "object",
                            "properties": {
                                "label": {"type": "string"},
                                "type": {"type": "string"},
                                "text": {"type": "string"},
                                "index": {"type": "integer", "default": 0}
                            },
                            "description": "Element query; all given fields must match"
                        },
                        "value": {"type": "string", "description": "Text to type"},
                        "swipe": {
                            "type": "object",
                            "properties": {
                                "x1": {"type": "number"}, "y1": {"type": "number"},
                                "x2": {"type": "number"}, "y2": {"type": "number"},
                                "duration": {"type": "number", "default": 0.5}
                            }
                        },
                        "seconds": {"type": "number", "description": "Wait duration"}
                    },
                    "required": ["action"]
                }),
            },
            dispatcher,
        }
    }
}

#[async_trait]
impl Tool for UiInteractionKit {
    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(action) = params.get("action").and_then(|v| v.as_str()) else {
            return Ok(failure("missing action parameter"));
        };

        let outcome = match action {
            "tap" => {
                if let Some(query) = query_from(&params) {
                    self.dispatcher.tap_element(&query).await
                } else if let Some(coords) = params.get("coordinates") {
                    match point_from(coords, "x", "y") {
                        Some(at) => self.dispatcher.tap_at(at).await,
                        None => return Ok(failure("coordinates require numeric x and y")),
                    }
                } else {
                    return Ok(failure("tap requires either target or coordinates"));
                }
            }
            "type_text" => {
                let Some(text) = params.get("value").and_then(|v| v.as_str()) else {
                    return Ok(failure("type_text requires a value"));
                };
                self.dispatcher.type_text(text, query_from(&params).as_ref()).await
            }
            "swipe" => {
                let Some(spec) = params.get("swipe") else {
                    return Ok(failure("swipe requires a swipe object"));
                };
                let (Some(from), Some(to)) =
                    (point_from(spec, "x1", "y1"), point_from(spec, "x2", "y2"))
                else {
                    return Ok(failure("swipe requires numeric x1, y1, x2, y2"));
                };
                let duration = spec.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.5);
                self.dispatcher.swipe(from, to, duration).await
            }
            "wait" => {
                let Some(seconds) = params.get("seconds").and_then(|v| v.as_f64()) else {
                    return Ok(failure("wait requires seconds"));
                };
                self.dispatcher.wait(Duration::from_secs_f64(seconds)).await
            }
            other => return Ok(failure(format!("unsupported action: {}", other))),
        };

        Ok(outcome.unwrap_or_else(|e| failure(e)))
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }
}

pub struct UiQueryKit {
    schema: ToolSchema,
    dispatcher: Arc<Dispatcher>,
}

impl UiQueryKit {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            schema: ToolSchema {
                name: "ui_query".to_string(),
                description: "Describe on-screen elements, optionally filtered by an element query"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "target": {
                            "type": "object",
                            "properties": {
                                "label": {"type": "string"},
                                "type": {"type": "string"},
                                "text": {"type": "string"},
                                "index": {"type": "integer"}
                            }
                        },
                        "interactable_only": {"type": "boolean", "default": false},
                        "ensure_remote_driver": {
                            "type": "boolean",
                            "default": false,
                            "description": "Lazily start the remote driver before querying"
                        }
                    }
                }),
            },
            dispatcher,
        }
    }
}

#[async_trait]
impl Tool for UiQueryKit {
    async fn execute(&self, params: Value) -> Result<Value> {
        let options = ProbeOptions {
            ensure_remote_driver: params
                .get("ensure_remote_driver")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        };
        let elements = match self.dispatcher.ui_elements_with_options(options).await {
            Ok(elements) => elements,
            Err(e) => return Ok(failure(e)),
        };

        let filtered = match query_from(&params) {
            Some(query) => crate::automation::element::matching(&elements, &query),
            None => elements,
        };

        let interactable_only = params
            .get("interactable_only")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let visible: Vec<_> = filtered
            .into_iter()
            .filter(|e| !interactable_only || e.interactable)
            .collect();

        Ok(json!({
            "success": true,
            "count": visible.len(),
            "elements": visible,
        }))
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }
}

pub struct ScreenCaptureKit {
    schema: ToolSchema,
    dispatcher: Arc<Dispatcher>,
}

impl ScreenCaptureKit {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            schema: ToolSchema {
                name: "screen_capture".to_string(),
                description: "Capture the simulated screen to a PNG".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "output_path": {"type": "string", "description": "Optional destination path"}
                    }
                }),
            },
            dispatcher,
        }
    }
}

#[async_trait]
impl Tool for ScreenCaptureKit {
    async fn execute(&self, params: Value) -> Result<Value> {
        let output_path = params
            .get("output_path")
            .and_then(|v| v.as_str())
            .map(PathBuf::from);
        Ok(self
            .dispatcher
            .screenshot(output_path)
            .await
            .unwrap_or_else(|e| failure(e)))
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }
}

pub struct RecordingKit {
    schema: ToolSchema,
    dispatcher: Arc<Dispatcher>,
    archive: SessionArchive,
}

impl RecordingKit {
    pub fn new(dispatcher: Arc<Dispatcher>, archive: SessionArchive) -> Self {
        Self {
            schema: ToolSchema {
                name: "recording".to_string(),
                description: "Start or stop recording dispatched actions for test generation"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "action": {
                            "type": "string",
                            "enum": ["start", "stop", "status"],
                            "description": "Recording control action"
                        },
                        "bundle_id": {
                            "type": "string",
                            "description": "Target application identifier for start"
                        }
                    },
                    "required": ["action"]
                }),
            },
            dispatcher,
            archive,
        }
    }
}

#[async_trait]
impl Tool for RecordingKit {
    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(action) = params.get("action").and_then(|v| v.as_str()) else {
            return Ok(failure("missing action parameter"));
        };
        let recorder = self.dispatcher.recorder();

        match action {
            "start" => {
                let bundle_id = params
                    .get("bundle_id")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                let discarded = recorder.start(bundle_id.clone());
                Ok(json!({
                    "success": true,
                    "recording": true,
                    "bundle_id": bundle_id,
                    "discarded_actions": discarded,
                }))
            }
            "stop" => match recorder.stop() {
                Some(session) => {
                    let summary = json!({
                        "success": true,
                        "recording": false,
                        "actions": session.actions.len(),
                        "screenshots": session.screenshots.len(),
                        "started_at": session.started_at,
                        "stopped_at": session.stopped_at,
                    });
                    *self.archive.lock().unwrap() = Some(session);
                    Ok(summary)
                }
                // No active session: informational, not an error.
                None => Ok(json!({
                    "success": true,
                    "recording": false,
                    "actions": 0,
                    "message": "no active recording session",
                })),
            },
            "status" => Ok(json!({
                "success": true,
                "recording": recorder.is_recording(),
                "actions": recorder.action_count(),
            })),
            other => Ok(failure(format!("unsupported action: {}", other))),
        }
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }
}

pub struct CodegenKit {
    schema: ToolSchema,
    archive: SessionArchive,
}

impl CodegenKit {
    pub fn new(archive: SessionArchive) -> Self {
        Self {
            schema: ToolSchema {
                name: "generate_test_code".to_string(),
                description: "Compile the last stopped recording into XCUITest Swift source"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "class_name": {"type": "string", "default": "GeneratedUITests"},
                        "test_name": {"type": "string", "default": "testRecordedFlow"}
                    }
                }),
            },
            archive,
        }
    }
}

#[async_trait]
impl Tool for CodegenKit {
    async fn execute(&self, params: Value) -> Result<Value> {
        let session = self.archive.lock().unwrap().clone();
        let Some(session) = session else {
            return Ok(failure("no stopped recording session to synthesize"));
        };

        let mut options = SynthesisOptions::default();
        if let Some(name) = params.get("class_name").and_then(|v| v.as_str()) {
            options.class_name = name.to_string();
        }
        if let Some(name) = params.get("test_name").and_then(|v| v.as_str()) {
            options.test_name = name.to_string();
        }

        let source = codegen::synthesize(&session, &options);
        Ok(json!({
            "success": true,
            "language": "swift",
            "actions": session.actions.len(),
            "source": source,
        }))
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }
}
