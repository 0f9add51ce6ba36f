//! Combo Transport Layer - Remote lookup contract
//!
//! This crate provides:
//! - The `RemoteLookup` capability the engine requires
//! - Request/response shapes
//! - An in-process request/response channel
//! - In-memory lookup tables

pub mod lookup;
pub mod channel;
pub mod table;

pub use lookup::*;
pub use channel::*;
pub use table::*;
