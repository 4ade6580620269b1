//! Gateway configuration.

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Request body read timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Upsert completion timeout in milliseconds
    pub response_timeout_ms: u64,
    /// Path prefix for entity routes
    pub rest_base_path: String,
    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,
    /// Header carrying the caller's role
    pub role_header: String,
    /// Role assumed when the header is absent
    pub default_role: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,   // 5 seconds default
            response_timeout_ms: 10000, // 10 seconds default
            rest_base_path: "/api".to_string(),
            max_body_bytes: 1024 * 1024,
            role_header: "X-Client-Role".to_string(),
            default_role: "anonymous".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Base path without a trailing slash; empty for the root.
    pub fn normalized_base_path(&self) -> String {
        let trimmed = self.rest_base_path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}
