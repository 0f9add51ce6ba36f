//! Combo field - one widget bound to a field config
//!
//! A field owns its widget and exposes value access, enable/disable and
//! clear. Every mutation reports whether anything actually changed so the
//! form can count passes and detect a settled state.

use std::fmt;
use std::sync::Arc;

use combo_core::{ConfigId, FieldConfig, FieldType, FieldValue, KeyPolicy, Record, WidgetHandle};
use combo_transport::RemoteRecord;

use crate::{FieldEvent, FieldEventKind, Listeners, UpdateEvent, Widget};

/// Records a value change added and removed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueChange {
    pub added: Vec<Record>,
    pub removed: Vec<Record>,
}

pub struct ComboField {
    handle: WidgetHandle,
    config_id: ConfigId,
    config: Arc<FieldConfig>,
    widget: Box<dyn Widget>,
    /// Display text for the next id-keyed resolution
    hint: Option<String>,
    /// Bumped on every lookup start so stale results can be recognized
    ticket: u64,
    listeners: Listeners,
}

impl ComboField {
    pub fn new(
        handle: WidgetHandle,
        config_id: ConfigId,
        config: Arc<FieldConfig>,
        mut widget: Box<dyn Widget>,
    ) -> Self {
        let empty = FieldValue::empty(config.multiple);
        if widget.value().is_multiple() != config.multiple || !widget.value().is_empty() {
            widget.set_value(empty);
        }
        ComboField {
            handle,
            config_id,
            config,
            widget,
            hint: None,
            ticket: 0,
            listeners: Listeners::default(),
        }
    }

    #[inline]
    pub fn handle(&self) -> WidgetHandle {
        self.handle
    }

    pub fn config_id(&self) -> &ConfigId {
        &self.config_id
    }

    pub fn config(&self) -> &Arc<FieldConfig> {
        &self.config
    }

    pub fn field_type(&self) -> &FieldType {
        &self.config.field_type
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn key_policy(&self) -> &KeyPolicy {
        &self.config.has_id
    }

    #[inline]
    pub fn is_multiple(&self) -> bool {
        self.config.multiple
    }

    pub fn value(&self) -> &FieldValue {
        self.widget.value()
    }

    /// Stored id, comma-joined for multi-valued fields
    pub fn id(&self) -> String {
        self.value().id()
    }

    pub fn text(&self) -> String {
        self.value().text()
    }

    pub fn is_set(&self) -> bool {
        !self.id().is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.widget.is_enabled()
    }

    pub fn is_readonly(&self) -> bool {
        self.widget.is_readonly()
    }

    pub fn is_busy(&self) -> bool {
        self.widget.is_busy()
    }

    /// Replace the value. Returns the change, or `None` when the value is
    /// already in place. With `suppress` no `Change` notification goes out.
    pub fn set_value(&mut self, value: FieldValue, suppress: bool) -> Option<ValueChange> {
        let value = FieldValue::from_records(value.into_records(), self.is_multiple());
        if &value == self.value() {
            return None;
        }
        let (added, removed) = self.value().diff(&value);
        self.widget.set_value(value);

        let change = ValueChange { added, removed };
        if !suppress {
            let mut event = self.event(FieldEventKind::Change);
            event.added = change.added.clone();
            event.removed = change.removed.clone();
            self.listeners.emit(&event);
        }
        Some(change)
    }

    pub fn enable(&mut self) -> bool {
        self.toggle(true)
    }

    /// Disable without touching the value.
    pub fn disable(&mut self) -> bool {
        self.toggle(false)
    }

    fn toggle(&mut self, enabled: bool) -> bool {
        if self.widget.is_enabled() == enabled {
            return false;
        }
        self.widget.set_enabled(enabled);
        let kind = if enabled {
            FieldEventKind::Enabled
        } else {
            FieldEventKind::Disabled
        };
        let event = self.event(kind);
        self.listeners.emit(&event);
        true
    }

    /// Reset to the empty value. Returns whether there was anything to clear.
    pub fn clear(&mut self) -> bool {
        self.set_value(FieldValue::empty(self.is_multiple()), false)
            .is_some()
    }

    /// Subscribe to notifications of one kind
    pub fn on<F>(&mut self, kind: FieldEventKind, listener: F)
    where
        F: FnMut(&FieldEvent) + 'static,
    {
        self.listeners.on(kind, Box::new(listener));
    }

    /// Interpret a remote record with this field's key policy
    pub fn record_from_remote(&self, map: &RemoteRecord) -> Record {
        Record::from_remote(map, self.key_policy())
    }

    pub(crate) fn set_hint(&mut self, text: Option<String>) {
        self.hint = text;
    }

    pub(crate) fn take_hint(&mut self) -> Option<String> {
        self.hint.take()
    }

    #[inline]
    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Mark busy and hand out the ticket the lookup result must match
    pub(crate) fn begin_lookup(&mut self) -> u64 {
        self.ticket += 1;
        self.set_busy(true);
        self.ticket
    }

    /// Drop interest in any lookup in flight
    pub(crate) fn end_lookup(&mut self, supersede: bool) {
        if supersede {
            self.ticket += 1;
        }
        self.set_busy(false);
    }

    fn set_busy(&mut self, busy: bool) {
        if self.widget.is_busy() == busy {
            return;
        }
        self.widget.set_busy(busy);
        let event = self.event(FieldEventKind::Busy);
        self.listeners.emit(&event);
    }

    pub(crate) fn emit_update(&mut self, update: &UpdateEvent) {
        let mut event = self.event(FieldEventKind::Update);
        event.origin = update.origin_type.clone();
        event.added = update.added.clone();
        event.removed = update.removed.clone();
        self.listeners.emit(&event);
    }

    fn event(&self, kind: FieldEventKind) -> FieldEvent {
        FieldEvent::new(kind, self.field_type().clone(), self.handle)
    }
}

impl fmt::Debug for ComboField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComboField")
            .field("handle", &self.handle)
            .field("type", self.field_type())
            .field("value", self.value())
            .field("enabled", &self.is_enabled())
            .field("busy", &self.is_busy())
            .finish()
    }
}
