//! Named request/response side-channels carried within the sync envelope.

use std::collections::BTreeMap;

use crate::error::Error;

/// The point in response processing at which an extension's `on_response`
/// runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtensionPhase {
    /// Before room data is emitted.
    ///
    /// For extensions whose payload must be ingested ahead of the
    /// corresponding room events, e.g. to-device messages carrying keys.
    PreProcess,

    /// After room data is emitted, but before the final list events.
    ///
    /// For decorators that depend on the consumer having ingested the
    /// rooms already.
    PostProcess,
}

/// A sliding sync extension.
///
/// Extensions contribute a payload under their name to every request and
/// consume the payload the server returns under that name, without the
/// engine knowing anything about the shape of either.
pub trait Extension: Send {
    /// The unique key this extension's payloads travel under.
    fn name(&self) -> &str;

    /// When [`on_response`][Self::on_response] should be dispatched.
    fn when(&self) -> ExtensionPhase;

    /// Contributes this extension's slice of the next request.
    ///
    /// `is_initial` is true exactly when this is the first request of the
    /// engine's lifetime, i.e. there is no sync position yet. Returning
    /// `None` omits the extension from this request.
    fn on_request(&mut self, is_initial: bool) -> Option<serde_json::Value>;

    /// Consumes the server's payload for this extension.
    ///
    /// Only invoked when the response actually carries a payload under this
    /// extension's name.
    fn on_response(&mut self, data: serde_json::Value);
}

/// The set of registered extensions, keyed by name.
#[derive(Default)]
pub(crate) struct ExtensionRegistry {
    extensions: BTreeMap<String, Box<dyn Extension>>,
}

impl ExtensionRegistry {
    pub(crate) fn register(&mut self, extension: Box<dyn Extension>) -> Result<(), Error> {
        let name = extension.name().to_owned();
        if self.extensions.contains_key(&name) {
            return Err(Error::DuplicateExtension { name });
        }
        self.extensions.insert(name, extension);
        Ok(())
    }

    /// Collects every extension's contribution to the next request.
    pub(crate) fn compose_request(
        &mut self,
        is_initial: bool,
    ) -> BTreeMap<String, serde_json::Value> {
        self.extensions
            .iter_mut()
            .filter_map(|(name, extension)| {
                extension.on_request(is_initial).map(|value| (name.clone(), value))
            })
            .collect()
    }

    /// Hands each extension of the given phase its slice of the response.
    pub(crate) fn dispatch(
        &mut self,
        phase: ExtensionPhase,
        payloads: &BTreeMap<String, serde_json::Value>,
    ) {
        for (name, extension) in &mut self.extensions {
            if extension.when() != phase {
                continue;
            }
            if let Some(data) = payloads.get(name) {
                extension.on_response(data.clone());
            }
        }
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.extensions.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches2::assert_matches;
    use maplit::btreemap;
    use serde_json::json;

    use super::{Extension, ExtensionPhase, ExtensionRegistry};
    use crate::error::Error;

    struct Recording {
        name: &'static str,
        phase: ExtensionPhase,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Extension for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn when(&self) -> ExtensionPhase {
            self.phase
        }

        fn on_request(&mut self, is_initial: bool) -> Option<serde_json::Value> {
            Some(json!({ "enabled": true, "initial": is_initial }))
        }

        fn on_response(&mut self, data: serde_json::Value) {
            self.log.lock().unwrap().push(format!("{}:{data}", self.name));
        }
    }

    fn recording(
        name: &'static str,
        phase: ExtensionPhase,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Box<Recording> {
        Box::new(Recording { name, phase, log: Arc::clone(log) })
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let log = Arc::default();
        let mut registry = ExtensionRegistry::default();

        registry.register(recording("to_device", ExtensionPhase::PreProcess, &log)).unwrap();
        let err = registry
            .register(recording("to_device", ExtensionPhase::PostProcess, &log))
            .unwrap_err();

        assert_matches!(err, Error::DuplicateExtension { name });
        assert_eq!(name, "to_device");
    }

    #[test]
    fn compose_request_merges_contributions() {
        let log = Arc::default();
        let mut registry = ExtensionRegistry::default();
        registry.register(recording("to_device", ExtensionPhase::PreProcess, &log)).unwrap();
        registry.register(recording("receipts", ExtensionPhase::PostProcess, &log)).unwrap();

        let composed = registry.compose_request(true);

        assert_eq!(composed.len(), 2);
        assert_eq!(composed["to_device"], json!({ "enabled": true, "initial": true }));
    }

    #[test]
    fn dispatch_filters_by_phase_and_payload_presence() {
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let mut registry = ExtensionRegistry::default();
        registry.register(recording("to_device", ExtensionPhase::PreProcess, &log)).unwrap();
        registry.register(recording("receipts", ExtensionPhase::PostProcess, &log)).unwrap();
        registry.register(recording("typing", ExtensionPhase::PostProcess, &log)).unwrap();

        let payloads = btreemap! {
            "to_device".to_owned() => json!({ "events": [] }),
            "receipts".to_owned() => json!({ "rooms": {} }),
        };

        registry.dispatch(ExtensionPhase::PreProcess, &payloads);
        assert_eq!(log.lock().unwrap().as_slice(), [r#"to_device:{"events":[]}"#]);

        registry.dispatch(ExtensionPhase::PostProcess, &payloads);
        // typing had no payload in the response, so only receipts fired
        assert_eq!(log.lock().unwrap().len(), 2);
        assert!(log.lock().unwrap()[1].starts_with("receipts:"));
    }
}
