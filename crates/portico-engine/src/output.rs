//! Render instructions and the host's enqueue primitive.

use std::collections::BTreeMap;
use std::sync::Mutex;

use portico_dataplane::EncodedPayload;
use serde_json::Value;

/// Instruction kind for a bidirectional component mount.
pub const BIDI_COMPONENT_KIND: &str = "bidi_component";

/// Everything the frontend needs to render one mounted component.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderInstruction {
    pub component_name: String,
    pub widget_id: String,
    pub html: Option<String>,
    pub css_content: Option<String>,
    /// Basename of the file-backed stylesheet, served by the host.
    pub css_url: Option<String>,
    pub js_content: Option<String>,
    /// Basename of the file-backed script, served by the host.
    pub js_url: Option<String>,
    pub data: Option<EncodedPayload>,
    pub state_defaults: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Width {
    /// Fill the container.
    #[default]
    Stretch,
    /// Size to the component's own content.
    Content,
    Pixels(u32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutHints {
    pub width: Width,
    /// Fixed height in pixels; content height when unset.
    pub height: Option<u32>,
}

/// Append-only output stream owned by the host.
///
/// Fire-and-forget: implementations preserve call order and never fail
/// back into the mount.
pub trait Enqueue: Send + Sync {
    fn enqueue(&self, kind: &str, instruction: RenderInstruction, layout: LayoutHints);
}

/// One enqueued element.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedElement {
    pub kind: String,
    pub instruction: RenderInstruction,
    pub layout: LayoutHints,
}

/// [`Enqueue`] that keeps every element in memory, in order.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    elements: Mutex<Vec<QueuedElement>>,
}

impl BufferedOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything enqueued so far.
    #[must_use]
    pub fn elements(&self) -> Vec<QueuedElement> {
        self.elements
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything enqueued so far.
    pub fn drain(&self) -> Vec<QueuedElement> {
        std::mem::take(
            &mut *self
                .elements
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Enqueue for BufferedOutput {
    fn enqueue(&self, kind: &str, instruction: RenderInstruction, layout: LayoutHints) {
        tracing::trace!(kind, widget_id = instruction.widget_id, "Enqueued element");
        self.elements
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(QueuedElement {
                kind: kind.to_string(),
                instruction,
                layout,
            });
    }
}
