//! Uniform call surface over the supported LLM provider families.
//!
//! [`routing`] normalizes a [`Provider`] + bare model id into the
//! provider-specific model string, API key and base URL; [`client`] wraps
//! `reqwest` into the `generate`/`count_tokens` contract used by every agent
//! in [`crate::agents`].

pub mod client;
pub mod routing;

pub use client::{LlmClient, LlmResponse};
pub use routing::{ModelSpec, Provider};
