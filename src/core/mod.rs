//! Core types shared by every adapter component
//!
//! - `AdapterError` / `AdapterResult` - Error types

pub mod error;

pub use error::{AdapterError, AdapterResult};
