//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `KOTONOHA_*` and store/backend env overrides.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs consumed by the pipeline and
//!   server (`Config`, `LlmConfig`, `GenerationConfig`, etc.).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawLlm`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `defaults`.

mod load;
mod raw;
mod types;

pub use load::{defaults, load, load_from};
pub use types::*;
