//! Kotonoha: style-conditioned Japanese copy generation over a chat
//! completion backend.
//!
//! A request names a writing style (and optionally a board concept). The
//! pipeline resolves the style from the configuration store, samples
//! reference examples and a writing tip, composes the prompt, calls the
//! backend and splits the completion into titled patterns.

pub mod bootstrap;
pub mod core;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod store;

pub use crate::core::{config, error};
