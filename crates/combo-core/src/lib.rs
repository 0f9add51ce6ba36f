//! Combo Core - Fundamental types and configuration
//!
//! This crate defines the types shared by every combo crate:
//! - Identifiers (FieldType, ConfigId, WidgetHandle)
//! - Records and field values
//! - The strict field configuration schema
//! - Declarative filter specifications
//! - The config registry
//! - Error types

pub mod id;
pub mod record;
pub mod filter;
pub mod config;
pub mod states;
pub mod registry;
pub mod error;

pub use id::*;
pub use record::*;
pub use filter::*;
pub use config::*;
pub use states::*;
pub use registry::*;
pub use error::*;
