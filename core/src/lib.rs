// Core tempmail provider functionality:
// - HTTP client for the upstream inbox API
// - Wire types and inbox parsing
// - Bounded retry policy
// - Configuration loading
// - Shared error types

// Export client module - upstream provider client
pub mod client;
pub use client::*;

// Export types module - wire and response data structures
pub mod types;
pub use types::*;

// Export parser module - OTP extraction and message normalization
pub mod parser;

// Export retry module - bounded retry policy
pub mod retry;
pub use retry::RetryPolicy;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
