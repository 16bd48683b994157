// ── Component (device group) ──

use serde_json::Value;
use tokio::sync::watch;

use crate::stream::StateStream;

/// A logical grouping of devices maintained by the bridge.
///
/// Components have no commands of their own; the bridge pushes group
/// state which is published raw.
pub struct Component {
    comp_id: i64,
    comp_type: i32,
    name: String,
    state: watch::Sender<Option<Value>>,
}

impl Component {
    pub(crate) fn new(comp_id: i64, comp_type: i32, name: String) -> Self {
        let (state, _) = watch::channel(None);
        Self { comp_id, comp_type, name, state }
    }

    pub fn comp_id(&self) -> i64 {
        self.comp_id
    }

    pub fn comp_type(&self) -> i32 {
        self.comp_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last raw payload the bridge sent for this component.
    pub fn state(&self) -> Option<Value> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<Value> {
        StateStream::new(self.state.subscribe())
    }

    pub(crate) fn apply_state(&self, payload: &Value) {
        self.state.send_replace(Some(payload.clone()));
    }
}
