//! Combo State Engine - Field dependency and update propagation
//!
//! This crate provides:
//! - The widget capability a combo field drives
//! - Combo fields with value resolution and event listeners
//! - Filter parameter building for remote searches
//! - Pending remote lookups and their application
//! - The form orchestrator running the fixed-point update loop

pub mod widget;
pub mod event;
pub mod field;
pub mod view;
pub mod filter;
pub mod resolve;
pub mod form;

pub use widget::*;
pub use event::*;
pub use field::*;
pub use view::*;
pub use filter::*;
pub use resolve::*;
pub use form::*;
