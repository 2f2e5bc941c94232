//! The shared library for Trivium, a real-time multiplayer quiz engine.
//!
//! This library provides the core domain and wire types used by the backend:
//! session state, question shapes, message payloads, error handling, ID
//! generation, and logging setup.

pub mod data;
pub mod errors;
pub mod id;
pub mod log;

pub use serde;
pub use serde_json;
pub use tracing;
