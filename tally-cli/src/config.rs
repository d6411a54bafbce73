//! Configuration module
//!
//! Handles CLI configuration including orchestrator URL and credentials.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,

    /// Bearer token for administrative endpoints
    pub api_key: Option<String>,
}
