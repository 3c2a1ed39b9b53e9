pub mod core;
pub mod llm;
pub mod logging;

pub use crate::core::{AdapterError, AdapterResult};
pub use crate::llm::{ContentGenerator, GlmConfig, GlmContentGenerator};
