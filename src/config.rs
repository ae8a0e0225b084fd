//! Application-level configuration constants.

// Upstream endpoints
pub const TOP_100_GAMES_URL: &str = "https://boardgamegeek.com/browse/boardgame?sort=rank";
pub const XMLAPI2_COLLECTION: &str = "https://boardgamegeek.com/xmlapi2/collection";

// Reference list caching
pub const TOP100_CACHE_KEY: &str = "top100Games";
pub const TOP100_TTL_MS: u64 = 1000 * 60 * 60 * 6;
pub const TOP_N: usize = 100;

// Gateway behavior
pub const REQUEST_TIMEOUT_MS: u32 = 15_000;
pub const QUEUED_RETRY_ATTEMPTS: usize = 5;
pub const QUEUED_RETRY_DELAY_MS: u32 = 2_000;

// UI behavior
pub const DEBOUNCE_MS: u32 = 300;
pub const MAX_USERNAME_LEN: usize = 64;

/// Gateway settings, overridable for tests and proxied deployments.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub top100_url: String,
    pub collection_url: String,
    pub top100_ttl_ms: u64,
    pub timeout_ms: u32,
    pub retry_attempts: usize,
    pub retry_delay_ms: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            top100_url: TOP_100_GAMES_URL.to_string(),
            collection_url: XMLAPI2_COLLECTION.to_string(),
            top100_ttl_ms: TOP100_TTL_MS,
            timeout_ms: REQUEST_TIMEOUT_MS,
            retry_attempts: QUEUED_RETRY_ATTEMPTS,
            retry_delay_ms: QUEUED_RETRY_DELAY_MS,
        }
    }
}
