//! Ponder is a streaming client for the OpenAI Responses API that keeps a
//! model's reasoning traces next to its answer.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns request shaping, SSE decoding, event resolution, the
//!   per-call reasoning tracker, and the shared reasoning store.
//! - [`api`] defines the caller-side messages and the Responses request body.
//! - [`utils`] holds URL, auth header, id, and transcript helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
