//! Inventory page controller.
//!
//! SYSTEM CONTEXT
//! ==============
//! The inventory page is a single HTML document with three forms and three
//! tables. This crate holds everything the page does that is not markup:
//! the bootstrap that wires submit handlers once the document is ready, the
//! handlers themselves, the table loaders, and a typed client for the
//! `/livewalk` REST API served by the `livewalk` binary.
//!
//! The browser is reached only through the [`dom::Page`] trait, so the
//! controller runs (and is tested) without one.

pub mod api;
pub mod controller;
pub mod dom;
pub mod types;

pub use api::{ApiClient, ApiError, InventoryApi};
pub use controller::PageController;
pub use dom::{FormHandler, MessageKind, Page, PartsTable, SubmitEvent};
