//! Field events and update passes
//!
//! Field events are notifications for the host. The form never reacts to its
//! own notifications; it drives every pass from an [`UpdateEvent`].

use std::collections::HashMap;
use std::fmt;

use combo_core::{FieldType, Record, WidgetHandle};

/// Kinds of field notifications
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldEventKind {
    /// Value changed
    Change,
    /// Field was examined by an update pass
    Update,
    Enabled,
    Disabled,
    /// Busy flag toggled
    Busy,
}

/// Notification delivered to field listeners
#[derive(Clone, Debug, PartialEq)]
pub struct FieldEvent {
    pub kind: FieldEventKind,
    pub field_type: FieldType,
    pub handle: WidgetHandle,
    pub added: Vec<Record>,
    pub removed: Vec<Record>,
    /// Type of the field that started the pass, for `Update` events
    pub origin: Option<FieldType>,
}

impl FieldEvent {
    pub fn new(kind: FieldEventKind, field_type: FieldType, handle: WidgetHandle) -> Self {
        FieldEvent {
            kind,
            field_type,
            handle,
            added: Vec::new(),
            removed: Vec::new(),
            origin: None,
        }
    }
}

pub type Listener = Box<dyn FnMut(&FieldEvent)>;

/// Listener table keyed by event kind
#[derive(Default)]
pub struct Listeners {
    table: HashMap<FieldEventKind, Vec<Listener>>,
}

impl Listeners {
    pub fn on(&mut self, kind: FieldEventKind, listener: Listener) {
        self.table.entry(kind).or_default().push(listener);
    }

    pub fn emit(&mut self, event: &FieldEvent) {
        if let Some(listeners) = self.table.get_mut(&event.kind) {
            for listener in listeners.iter_mut() {
                listener(event);
            }
        }
    }

    pub fn count(&self, kind: FieldEventKind) -> usize {
        self.table.get(&kind).map(Vec::len).unwrap_or(0)
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

/// What started an update pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateEvent {
    /// Field that changed
    pub origin: Option<WidgetHandle>,
    pub origin_type: Option<FieldType>,
    pub added: Vec<Record>,
    pub removed: Vec<Record>,
    /// Examine the origin field too
    pub force: bool,
    /// Programmatic change: no propagation, no forced clearing of dependents
    pub no_affect: bool,
}

impl UpdateEvent {
    /// The user picked or removed a value
    pub fn user_change(
        origin: WidgetHandle,
        origin_type: FieldType,
        added: Vec<Record>,
        removed: Vec<Record>,
    ) -> Self {
        UpdateEvent {
            origin: Some(origin),
            origin_type: Some(origin_type),
            added,
            removed,
            force: false,
            no_affect: false,
        }
    }

    /// The value was set by code (initial values, resolved lookups)
    pub fn programmatic(
        origin: WidgetHandle,
        origin_type: FieldType,
        added: Vec<Record>,
        removed: Vec<Record>,
    ) -> Self {
        UpdateEvent {
            no_affect: true,
            ..Self::user_change(origin, origin_type, added, removed)
        }
    }

    /// Re-evaluate every field including the origin, e.g. on registration
    pub fn forced(origin: WidgetHandle, origin_type: FieldType) -> Self {
        UpdateEvent {
            origin: Some(origin),
            origin_type: Some(origin_type),
            force: true,
            ..Default::default()
        }
    }

    /// Follow-up pass after a dirty one
    pub fn settle() -> Self {
        UpdateEvent {
            force: true,
            ..Default::default()
        }
    }

    #[inline]
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Outcome of one `update` call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Passes run, including the final clean one
    pub passes: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub cleared: usize,
    /// Targets whose value was written by `affects`
    pub propagated: usize,
}

impl UpdateReport {
    /// Total field mutations
    pub fn mutations(&self) -> usize {
        self.enabled + self.disabled + self.cleared + self.propagated
    }
}
