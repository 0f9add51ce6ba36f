//! Widget capability
//!
//! The engine never renders anything. It drives whatever select widget the
//! host provides through this trait.

use combo_core::FieldValue;

pub trait Widget {
    fn value(&self) -> &FieldValue;

    fn set_value(&mut self, value: FieldValue);

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Readonly widgets are still toggled but never hold a pass open.
    fn is_readonly(&self) -> bool {
        false
    }

    fn is_busy(&self) -> bool;

    fn set_busy(&mut self, busy: bool);
}

/// Widget state kept in memory
#[derive(Clone, Debug)]
pub struct MemoryWidget {
    value: FieldValue,
    enabled: bool,
    readonly: bool,
    busy: bool,
}

impl Default for MemoryWidget {
    fn default() -> Self {
        MemoryWidget {
            value: FieldValue::default(),
            enabled: true,
            readonly: false,
            busy: false,
        }
    }
}

impl MemoryWidget {
    pub fn new() -> Self {
        MemoryWidget::default()
    }

    pub fn readonly() -> Self {
        MemoryWidget {
            readonly: true,
            ..Default::default()
        }
    }

    pub fn boxed(self) -> Box<dyn Widget> {
        Box::new(self)
    }
}

impl Widget for MemoryWidget {
    fn value(&self) -> &FieldValue {
        &self.value
    }

    fn set_value(&mut self, value: FieldValue) {
        self.value = value;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn is_busy(&self) -> bool {
        self.busy
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }
}
