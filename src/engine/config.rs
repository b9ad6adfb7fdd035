//! Engine-wide configuration.

/// Tunables shared by every index the engine opens.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pre-shared key guarding system reset. `None` disables reset entirely.
    pub reset_key: Option<String>,
    /// Entries the per-index wildcard scan cache may hold.
    pub scan_cache_capacity: usize,
    /// Per-search execution deadline in milliseconds; 0 disables it.
    pub search_timeout_ms: u64,
    /// Page size for document listings without an explicit limit.
    pub default_list_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            reset_key: None,
            scan_cache_capacity: 256,
            search_timeout_ms: 5_000,
            default_list_limit: 10,
        }
    }
}

impl EngineConfig {
    pub fn with_reset_key(mut self, key: impl Into<String>) -> Self {
        self.reset_key = Some(key.into());
        self
    }

    pub fn with_scan_cache_capacity(mut self, capacity: usize) -> Self {
        self.scan_cache_capacity = capacity;
        self
    }

    pub fn with_search_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.search_timeout_ms = timeout_ms;
        self
    }
}
