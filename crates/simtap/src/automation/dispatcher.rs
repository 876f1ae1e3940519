use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::timeout;

use crate::device::DeviceBroker;
use crate::screenshot;
use crate::{Error, Result};

use super::backend::{BackendAction, Capability, InteractionBackend, Point};
use super::element::{self, ElementQuery, UiElement};
use super::probe::{BackendRegistry, ProbeOptions};
use super::recording::{ActionRecord, ElementSummary, RecordedAction, Recorder};
use super::window::{CoordinateTranslator, SimulatorWindowTranslator};

/// A logical action as issued by the caller. Targets are either raw
/// device-pixel coordinates or element queries resolved against the current
/// layout.
#[derive(Debug, Clone)]
pub enum Action {
    Tap { at: Point },
    TapElement { query: ElementQuery },
    TypeText { text: String, target: Option<ElementQuery> },
    Swipe { from: Point, to: Point, duration_secs: f64 },
    Wait { duration: Duration },
    Screenshot { output_path: Option<PathBuf> },
}

/// Resolves logical actions against the best available backend, falling back
/// through the probe order, and records each success into the recorder.
/// One action is in flight at a time; nothing here fans out.
pub struct Dispatcher {
    registry: BackendRegistry,
    broker: Arc<DeviceBroker>,
    recorder: Arc<Recorder>,
    translator: Arc<dyn CoordinateTranslator>,
}

impl Dispatcher {
    pub fn new(registry: BackendRegistry, broker: Arc<DeviceBroker>, recorder: Arc<Recorder>) -> Self {
        Self {
            registry,
            broker,
            recorder,
            translator: Arc::new(SimulatorWindowTranslator),
        }
    }

    /// Swap the coordinate translator. Used by tests and by hosts whose
    /// window layout differs from stock Simulator.app.
    pub fn with_translator(mut self, translator: Arc<dyn CoordinateTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// Dispatch one logical action. Success payloads carry the uniform
    /// `{"success": true, ...}` shape; failures are typed errors for the
    /// tool surface to wrap.
    pub async fn dispatch(&self, action: Action) -> Result<Value> {
        match action {
            Action::Tap { at } => self.tap_at(at).await,
            Action::TapElement { query } => self.tap_element(&query).await,
            Action::TypeText { text, target } => self.type_text(&text, target.as_ref()).await,
            Action::Swipe { from, to, duration_secs } => self.swipe(from, to, duration_secs).await,
            Action::Wait { duration } => self.wait(duration).await,
            Action::Screenshot { output_path } => self.screenshot(output_path).await,
        }
    }

    /// Tap at device-pixel coordinates, no element resolution.
    pub async fn tap_at(&self, at: Point) -> Result<Value> {
        let backend = self.attempt_chain(&BackendAction::Tap { at }).await?;
        self.recorder
            .record(RecordedAction::now(ActionRecord::Tap { element: None, at }));
        Ok(json!({
            "success": true,
            "action": "tap",
            "backend": backend,
            "coordinates": {"x": at.x, "y": at.y},
        }))
    }

    /// Resolve a query against the current layout, then tap the element's
    /// center.
    pub async fn tap_element(&self, query: &ElementQuery) -> Result<Value> {
        let element = self.resolve(query).await?;
        let at = element.center;
        let backend = self.attempt_chain(&BackendAction::Tap { at }).await?;
        self.recorder.record(RecordedAction::now(ActionRecord::Tap {
            element: Some(summary(&element)),
            at,
        }));
        Ok(json!({
            "success": true,
            "action": "tap",
            "backend": backend,
            "element": {"type": element.element_type, "label": element.label},
            "coordinates": {"x": at.x, "y": at.y},
        }))
    }

    /// Type text, optionally focusing a queried element first. The focus tap
    /// is not recorded; only the terminal interaction is.
    pub async fn type_text(&self, text: &str, target: Option<&ElementQuery>) -> Result<Value> {
        let focused = match target {
            Some(query) => {
                let element = self.resolve(query).await?;
                let at = element.center;
                self.attempt_chain(&BackendAction::Tap { at }).await?;
                Some(summary(&element))
            }
            None => None,
        };

        let backend = self
            .attempt_chain(&BackendAction::TypeText { text: text.to_string() })
            .await?;
        self.recorder
            .record(RecordedAction::now(ActionRecord::TypeText { text: text.to_string() }));
        Ok(json!({
            "success": true,
            "action": "type_text",
            "backend": backend,
            "text": text,
            "focused_element": focused.map(|s| json!({"type": s.element_type, "label": s.label})),
        }))
    }

    pub async fn swipe(&self, from: Point, to: Point, duration_secs: f64) -> Result<Value> {
        let backend = self
            .attempt_chain(&BackendAction::Swipe { from, to, duration_secs })
            .await?;
        self.recorder
            .record(RecordedAction::now(ActionRecord::Swipe { from, to }));
        Ok(json!({
            "success": true,
            "action": "swipe",
            "backend": backend,
            "from": {"x": from.x, "y": from.y},
            "to": {"x": to.x, "y": to.y},
            "duration": duration_secs,
        }))
    }

    /// Waits always succeed.
    pub async fn wait(&self, duration: Duration) -> Result<Value> {
        tokio::time::sleep(duration).await;
        self.recorder.record(RecordedAction::now(ActionRecord::Wait {
            seconds: duration.as_secs_f64(),
        }));
        Ok(json!({
            "success": true,
            "action": "wait",
            "seconds": duration.as_secs_f64(),
        }))
    }

    /// Delegates to the screenshot collaborator; succeeds or fails on its
    /// result alone.
    pub async fn screenshot(&self, output_path: Option<PathBuf>) -> Result<Value> {
        let device_id = self.broker.active_device_id().await?;
        let path = screenshot::capture(&device_id, output_path).await?;
        self.recorder
            .record(RecordedAction::now(ActionRecord::Screenshot { path: path.clone() }));
        Ok(json!({
            "success": true,
            "action": "screenshot",
            "path": path,
        }))
    }

    /// Flattened view of the current layout. Degrades to an empty list when
    /// no discovery backend is usable; interaction-only backends have no
    /// element-level fallback.
    pub async fn ui_elements(&self) -> Result<Vec<UiElement>> {
        self.ui_elements_with_options(ProbeOptions::default()).await
    }

    /// Like `ui_elements`, but may lazily start the remote driver first when
    /// the caller asked for it.
    pub async fn ui_elements_with_options(&self, options: ProbeOptions) -> Result<Vec<UiElement>> {
        let device_id = self.broker.active_device_id().await.ok();
        let discovery = self
            .registry
            .probe_with_options(Capability::Discovery, options, device_id.as_deref())
            .await;
        let Some(backend) = discovery.first() else {
            tracing::debug!("no discovery backend usable, returning empty layout");
            return Ok(Vec::new());
        };
        let tree = backend.element_tree().await?;
        Ok(element::flatten(&tree))
    }

    async fn resolve(&self, query: &ElementQuery) -> Result<UiElement> {
        let elements = self.ui_elements().await?;
        element::select(&elements, query)
    }

    /// The fallback chain: one bounded attempt per usable backend in probe
    /// order, never retrying the same backend. Exhaustion surfaces the last
    /// attempt's error.
    async fn attempt_chain(&self, action: &BackendAction) -> Result<&'static str> {
        let capability = action.capability();
        let backends = self.registry.probe(capability).await;
        if backends.is_empty() {
            return Err(Error::BackendUnavailable(capability.to_string()));
        }

        let device_id = self.broker.active_device_id().await?;
        let mut last_error = Error::BackendUnavailable(capability.to_string());

        for backend in backends {
            let name = backend.descriptor().name;
            let translated = match self
                .translate_action(action, backend.as_ref())
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(backend = name, error = %e, "coordinate translation failed");
                    last_error = e;
                    continue;
                }
            };

            match timeout(action.attempt_timeout(), backend.execute(&device_id, &translated)).await {
                Ok(Ok(())) => {
                    tracing::debug!(backend = name, %capability, "action dispatched");
                    return Ok(name);
                }
                Ok(Err(e)) => {
                    tracing::warn!(backend = name, error = %e, "backend attempt failed");
                    last_error = e;
                }
                Err(_) => {
                    let bound = action.attempt_timeout();
                    tracing::warn!(backend = name, ?bound, "backend attempt timed out");
                    last_error = Error::Timeout(bound);
                }
            }
        }

        Err(last_error)
    }

    async fn translate_action(
        &self,
        action: &BackendAction,
        backend: &dyn InteractionBackend,
    ) -> Result<BackendAction> {
        let space = backend.descriptor().coordinate_space;
        Ok(match action {
            BackendAction::Tap { at } => BackendAction::Tap {
                at: self.translator.translate(*at, space).await?,
            },
            BackendAction::TypeText { text } => BackendAction::TypeText { text: text.clone() },
            BackendAction::Swipe { from, to, duration_secs } => BackendAction::Swipe {
                from: self.translator.translate(*from, space).await?,
                to: self.translator.translate(*to, space).await?,
                duration_secs: *duration_secs,
            },
        })
    }
}

fn summary(element: &UiElement) -> ElementSummary {
    ElementSummary {
        element_type: element.element_type.clone(),
        label: element.label.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::backend::{BackendDescriptor, CoordinateSpace};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeBackend {
        descriptor: BackendDescriptor,
        usable: bool,
        fail: bool,
        taps: AtomicUsize,
        types: AtomicUsize,
        tree: Option<Value>,
    }

    impl FakeBackend {
        fn new(name: &'static str) -> Self {
            Self {
                descriptor: BackendDescriptor {
                    name,
                    capabilities: &[Capability::Tap, Capability::TypeText, Capability::Swipe],
                    coordinate_space: CoordinateSpace::DeviceNative,
                },
                usable: true,
                fail: false,
                taps: AtomicUsize::new(0),
                types: AtomicUsize::new(0),
                tree: None,
            }
        }

        fn unusable(mut self) -> Self {
            self.usable = false;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn with_discovery(mut self, tree: Value) -> Self {
            self.descriptor.capabilities = &[
                Capability::Discovery,
                Capability::Tap,
                Capability::TypeText,
                Capability::Swipe,
            ];
            self.tree = Some(tree);
            self
        }
    }

    #[async_trait]
    impl InteractionBackend for FakeBackend {
        fn descriptor(&self) -> &BackendDescriptor {
            &self.descriptor
        }

        async fn probe(&self) -> bool {
            self.usable
        }

        async fn execute(&self, _device_id: &str, action: &BackendAction) -> Result<()> {
            if self.fail {
                return Err(Error::Automation(format!("{} is broken", self.descriptor.name)));
            }
            match action {
                BackendAction::Tap { .. } => {
                    self.taps.fetch_add(1, Ordering::SeqCst);
                }
                BackendAction::TypeText { .. } => {
                    self.types.fetch_add(1, Ordering::SeqCst);
                }
                BackendAction::Swipe { .. } => {}
            }
            Ok(())
        }

        async fn element_tree(&self) -> Result<Value> {
            self.tree
                .clone()
                .ok_or_else(|| Error::Automation("no tree".to_string()))
        }
    }

    fn dispatcher_with(backends: Vec<Arc<dyn InteractionBackend>>) -> Dispatcher {
        let registry = BackendRegistry::with_backends(backends);
        let broker = Arc::new(DeviceBroker::with_fixed_device("TEST-UDID"));
        Dispatcher::new(registry, broker, Arc::new(Recorder::new()))
    }

    fn login_tree() -> Value {
        json!({
            "type": "XCUIElementTypeApplication",
            "rect": {"x": 0, "y": 0, "width": 390, "height": 844},
            "children": [
                {
                    "type": "XCUIElementTypeButton",
                    "label": "Login",
                    "rect": {"x": 20, "y": 100, "width": 100, "height": 44},
                    "isEnabled": true,
                    "isVisible": true
                },
                {
                    "type": "XCUIElementTypeTextField",
                    "label": "Email",
                    "rect": {"x": 20, "y": 160, "width": 350, "height": 44},
                    "isEnabled": true,
                    "isVisible": true
                }
            ]
        })
    }

    #[tokio::test]
    async fn successful_tap_records_exactly_one_action() {
        let primary = Arc::new(FakeBackend::new("primary"));
        let dispatcher = dispatcher_with(vec![primary.clone()]);
        dispatcher.recorder().start(None);

        let result = dispatcher
            .dispatch(Action::Tap { at: Point::new(10.0, 10.0) })
            .await
            .unwrap();
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["backend"], json!("primary"));
        assert_eq!(primary.taps.load(Ordering::SeqCst), 1);

        let session = dispatcher.recorder().stop().unwrap();
        assert_eq!(session.actions.len(), 1);
        assert!(matches!(session.actions[0].record, ActionRecord::Tap { .. }));
    }

    #[tokio::test]
    async fn failed_dispatch_records_nothing() {
        let broken: Arc<dyn InteractionBackend> = Arc::new(FakeBackend::new("broken").failing());
        let dispatcher = dispatcher_with(vec![broken]);
        dispatcher.recorder().start(None);

        let err = dispatcher.tap_at(Point::new(10.0, 10.0)).await.unwrap_err();
        assert!(err.to_string().contains("broken"));

        let session = dispatcher.recorder().stop().unwrap();
        assert!(session.actions.is_empty());
    }

    #[tokio::test]
    async fn fallback_advances_past_failing_and_unusable_backends() {
        let dead = Arc::new(FakeBackend::new("dead").unusable());
        let broken = Arc::new(FakeBackend::new("broken").failing());
        let working = Arc::new(FakeBackend::new("working"));
        let dispatcher = dispatcher_with(vec![dead.clone(), broken.clone(), working.clone()]);

        let result = dispatcher.tap_at(Point::new(10.0, 10.0)).await.unwrap();
        assert_eq!(result["backend"], json!("working"));
        assert_eq!(dead.taps.load(Ordering::SeqCst), 0);
        assert_eq!(working.taps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_surfaces_backend_unavailable() {
        let dead: Arc<dyn InteractionBackend> = Arc::new(FakeBackend::new("dead").unusable());
        let dispatcher = dispatcher_with(vec![dead]);

        match dispatcher.tap_at(Point::new(10.0, 10.0)).await {
            Err(Error::BackendUnavailable(cap)) => assert_eq!(cap, "tap"),
            other => panic!("expected BackendUnavailable, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn tap_element_resolves_query_and_records_summary() {
        let backend = Arc::new(FakeBackend::new("wda").with_discovery(login_tree()));
        let dispatcher = dispatcher_with(vec![backend.clone()]);
        dispatcher.recorder().start(None);

        let result = dispatcher
            .tap_element(&ElementQuery::labeled("Login"))
            .await
            .unwrap();
        assert_eq!(result["element"]["label"], json!("Login"));
        // Center of the 20,100 100x44 button.
        assert_eq!(result["coordinates"], json!({"x": 70.0, "y": 122.0}));

        let session = dispatcher.recorder().stop().unwrap();
        assert_eq!(session.actions.len(), 1);
        match &session.actions[0].record {
            ActionRecord::Tap { element: Some(s), .. } => {
                assert_eq!(s.label.as_deref(), Some("Login"));
                assert_eq!(s.element_type, "Button");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[tokio::test]
    async fn type_with_target_taps_first_but_records_only_the_type() {
        let backend = Arc::new(FakeBackend::new("wda").with_discovery(login_tree()));
        let dispatcher = dispatcher_with(vec![backend.clone()]);
        dispatcher.recorder().start(None);

        dispatcher
            .type_text("hello", Some(&ElementQuery::labeled("Email")))
            .await
            .unwrap();

        assert_eq!(backend.taps.load(Ordering::SeqCst), 1, "focus tap happened");
        assert_eq!(backend.types.load(Ordering::SeqCst), 1);

        let session = dispatcher.recorder().stop().unwrap();
        assert_eq!(session.actions.len(), 1);
        assert!(matches!(
            &session.actions[0].record,
            ActionRecord::TypeText { text } if text == "hello"
        ));
    }

    #[tokio::test]
    async fn query_index_out_of_range_is_element_not_found() {
        let backend = Arc::new(FakeBackend::new("wda").with_discovery(login_tree()));
        let dispatcher = dispatcher_with(vec![backend]);

        let query = ElementQuery {
            label: Some("Login".to_string()),
            index: 1,
            ..Default::default()
        };
        match dispatcher.tap_element(&query).await {
            Err(Error::ElementNotFound(_)) => {}
            other => panic!("expected ElementNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn coordinate_tap_survives_missing_session_backend() {
        // Session-style backend down; a window-relative-style fallback up.
        let dead = Arc::new(FakeBackend::new("wda").unusable());
        let clicker = Arc::new(FakeBackend::new("clicker"));
        let dispatcher = dispatcher_with(vec![dead, clicker.clone()]);

        let result = dispatcher.tap_at(Point::new(10.0, 10.0)).await.unwrap();
        assert_eq!(result["backend"], json!("clicker"));
        assert_eq!(clicker.taps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn discovery_degrades_to_empty_without_session_backend() {
        let tap_only = Arc::new(FakeBackend::new("tap-only"));
        let dispatcher = dispatcher_with(vec![tap_only]);
        let elements = dispatcher.ui_elements().await.unwrap();
        assert!(elements.is_empty());
    }

    #[tokio::test]
    async fn wait_always_succeeds_and_is_recorded() {
        let dispatcher = dispatcher_with(vec![]);
        dispatcher.recorder().start(None);

        let result = dispatcher.wait(Duration::from_millis(10)).await.unwrap();
        assert_eq!(result["success"], json!(true));

        let session = dispatcher.recorder().stop().unwrap();
        assert_eq!(session.actions.len(), 1);
        assert!(matches!(session.actions[0].record, ActionRecord::Wait { .. }));
    }

    #[tokio::test]
    async fn actions_outside_a_recording_window_are_not_logged() {
        let backend = Arc::new(FakeBackend::new("primary"));
        let dispatcher = dispatcher_with(vec![backend]);

        dispatcher.tap_at(Point::new(1.0, 1.0)).await.unwrap();
        assert!(dispatcher.recorder().stop().is_none());
    }
}
