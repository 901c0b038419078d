//! Tools the assistant can call in Tools mode.
//!
//! Defines the [`Tool`] contract, the [`ToolRegistry`] the chat engine
//! dispatches through, and the built-in utility tools.

pub mod error;
pub mod tool;

pub use error::ToolError;
pub use tool::{Tool, ToolRegistry};
