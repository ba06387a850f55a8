//! Process configuration resolved from environment variables.
//!
//! Every knob has a development default so a bare `cargo run` starts a working
//! gateway against a local orchestration server. Production deployments set
//! the `FLOWGATE_*` variables explicitly.

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the gateway's own HTTP listener binds to.
    pub http_port: u16,
    /// Upstream GraphQL endpoint requests are forwarded to.
    pub upstream_url: String,
    /// Path to the JSON principals file read by the credential store adapter.
    pub principals_path: String,
    /// Optional path to a JSON authorization policy; built-in default when unset.
    pub policy_path: Option<String>,
    /// Lifetime of an issued bearer token, in seconds.
    pub token_ttl_secs: u64,
    /// Per-request upstream timeout, in seconds.
    pub upstream_timeout_secs: u64,
    /// Maximum concurrent in-flight upstream calls.
    pub upstream_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            http_port: env_parse_or("FLOWGATE_HTTP_PORT", 7070),
            upstream_url: env_or("FLOWGATE_UPSTREAM_URL", "http://localhost:4200/graphql"),
            principals_path: env_or("FLOWGATE_PRINCIPALS", "principals.json"),
            policy_path: std::env::var("FLOWGATE_POLICY").ok(),
            token_ttl_secs: env_parse_or("FLOWGATE_TOKEN_TTL_SECS", 3600),
            upstream_timeout_secs: env_parse_or("FLOWGATE_UPSTREAM_TIMEOUT_SECS", 15),
            upstream_concurrency: env_parse_or("FLOWGATE_UPSTREAM_CONCURRENCY", 64),
        }
    }
}
