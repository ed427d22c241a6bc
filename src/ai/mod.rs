//! AI endpoint access
//!
//! This module handles:
//! - The stateless HTTP client for the AI cloud functions
//! - The gateway that applies tier gating and the daily meter

mod client;
mod gateway;

pub use client::{AiBackend, AiOperation, HttpAiClient};
pub use gateway::AiGateway;
