//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own validation and persistence so route handlers can stay
//! focused on request parsing and status-code translation.

pub mod part;
pub mod sort;
pub mod usage;
