//! Browser abstraction used by the controller.
//!
//! DESIGN
//! ======
//! `Page` covers the handful of DOM operations the inventory page needs:
//! attaching submit listeners, reading and writing input values, rendering
//! the three tables and showing a status message. A wasm build implements
//! it over `web_sys`; tests implement it over hash maps.

use crate::types::{Part, UsageRecord};

/// Form that hosts the insert-part fields.
pub const INSERT_FORM: &str = "insertForm";
/// Form that hosts the register-usage fields.
pub const USAGE_FORM: &str = "usageForm";
/// Form that hosts the bulk-insert rows.
pub const BULK_INSERT_FORM: &str = "bulkInsertForm";
/// Date input inside `usageForm`.
pub const USED_DATE_INPUT: &str = "usedDate";
/// Optional number input holding the low-stock threshold.
pub const LOW_STOCK_THRESHOLD_INPUT: &str = "lowStockThreshold";

/// Which controller operation a submit listener delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormHandler {
    InsertPart,
    RegisterUsage,
    BulkInsertParts,
}

/// Table a list of parts is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartsTable {
    All,
    LowStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

/// A form submission. Handlers call [`SubmitEvent::prevent_default`] so the
/// browser does not navigate away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitEvent {
    pub form_id: String,
    default_prevented: bool,
}

impl SubmitEvent {
    #[must_use]
    pub fn new(form_id: impl Into<String>) -> Self {
        Self { form_id: form_id.into(), default_prevented: false }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

pub trait Page {
    /// Attach a submit listener on `form_id` that delegates to `handler`.
    /// Returns `false` when the form is not on the page.
    fn add_submit_listener(&mut self, form_id: &str, handler: FormHandler) -> bool;

    /// Current value of input `id`, or `None` when the input does not exist.
    fn value(&self, id: &str) -> Option<String>;

    /// Set the value of input `id`. Returns `false` when it does not exist.
    fn set_value(&mut self, id: &str, value: &str) -> bool;

    /// Reset every input of `form_id` to its initial value.
    fn reset_form(&mut self, form_id: &str);

    fn render_parts(&mut self, table: PartsTable, parts: &[Part]);

    fn render_usage(&mut self, records: &[UsageRecord]);

    fn show_message(&mut self, text: &str, kind: MessageKind);
}
