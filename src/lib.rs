//! `codemyway`: prompt to generated component to live, sandboxed render.
//!
//! The binary in `main.rs` wires these modules into an Axum server.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod routes;
pub mod sandbox;
pub mod state;
