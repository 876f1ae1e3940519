use std::sync::Arc;

use crate::automation::backend::{Capability, InteractionBackend};
use crate::automation::backends::{
    AppleScriptBackend, AxeBackend, CliclickBackend, IdbBackend, WdaBackend,
};
use crate::automation::wda::WdaClient;

/// Probe-time options. `ensure_remote_driver` triggers a lazy start of the
/// WebDriverAgent runner before the chain is assembled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeOptions {
    pub ensure_remote_driver: bool,
}

/// Declarative, priority-ordered list of interaction providers. The order of
/// construction is the fallback order; adding a backend is a pure insertion.
pub struct BackendRegistry {
    backends: Vec<Arc<dyn InteractionBackend>>,
    wda: Option<Arc<WdaClient>>,
}

impl BackendRegistry {
    /// The canonical chain: remote driver, then idb, then the accessibility
    /// bridge, then the coordinate-click utility, then OS scripting.
    pub fn standard(wda: Arc<WdaClient>) -> Self {
        Self {
            backends: vec![
                Arc::new(WdaBackend::new(wda.clone())),
                Arc::new(IdbBackend),
                Arc::new(AxeBackend),
                Arc::new(CliclickBackend),
                Arc::new(AppleScriptBackend),
            ],
            wda: Some(wda),
        }
    }

    /// Registry over an explicit backend list, in the given priority order.
    pub fn with_backends(backends: Vec<Arc<dyn InteractionBackend>>) -> Self {
        Self { backends, wda: None }
    }

    pub fn backends(&self) -> &[Arc<dyn InteractionBackend>] {
        &self.backends
    }

    /// Currently-usable backends for a capability, in priority order.
    /// Probing never errors; an unusable backend is simply absent. Results
    /// are recomputed on every call.
    pub async fn probe(&self, capability: Capability) -> Vec<Arc<dyn InteractionBackend>> {
        self.probe_with_options(capability, ProbeOptions::default(), None)
            .await
    }

    pub async fn probe_with_options(
        &self,
        capability: Capability,
        options: ProbeOptions,
        device_id: Option<&str>,
    ) -> Vec<Arc<dyn InteractionBackend>> {
        if options.ensure_remote_driver {
            if let (Some(wda), Some(device)) = (&self.wda, device_id) {
                if let Err(e) = wda.bootstrap(device).await {
                    tracing::warn!(error = %e, "remote driver bootstrap failed, falling back");
                }
            }
        }

        let mut usable = Vec::new();
        for backend in &self.backends {
            if !backend.descriptor().supports(capability) {
                continue;
            }
            if backend.probe().await {
                usable.push(backend.clone());
            } else {
                tracing::debug!(backend = backend.descriptor().name, %capability, "backend not usable");
            }
        }
        usable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::automation::backend::{BackendAction, BackendDescriptor, CoordinateSpace};
    use async_trait::async_trait;

    struct Probeable {
        descriptor: BackendDescriptor,
        usable: bool,
    }

    impl Probeable {
        fn new(name: &'static str, capabilities: &'static [Capability], usable: bool) -> Self {
            Self {
                descriptor: BackendDescriptor {
                    name,
                    capabilities,
                    coordinate_space: CoordinateSpace::DeviceNative,
                },
                usable,
            }
        }
    }

    #[async_trait]
    impl InteractionBackend for Probeable {
        fn descriptor(&self) -> &BackendDescriptor {
            &self.descriptor
        }

        async fn probe(&self) -> bool {
            self.usable
        }

        async fn execute(&self, _device_id: &str, _action: &BackendAction) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn probe_preserves_priority_order_and_filters_capability() {
        let registry = BackendRegistry::with_backends(vec![
            Arc::new(Probeable::new("first", &[Capability::Tap, Capability::Swipe], true)),
            Arc::new(Probeable::new("second", &[Capability::Tap], false)),
            Arc::new(Probeable::new("third", &[Capability::Tap], true)),
            Arc::new(Probeable::new("type-only", &[Capability::TypeText], true)),
        ]);

        let taps = registry.probe(Capability::Tap).await;
        let names: Vec<_> = taps.iter().map(|b| b.descriptor().name).collect();
        assert_eq!(names, vec!["first", "third"]);

        let swipes = registry.probe(Capability::Swipe).await;
        assert_eq!(swipes.len(), 1);
        assert_eq!(swipes[0].descriptor().name, "first");

        assert!(registry.probe(Capability::Discovery).await.is_empty());
    }
}
