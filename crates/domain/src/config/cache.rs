use serde::{Deserialize, Serialize};

/// Decision Cache configuration. TTL-per-sensitivity is fixed by
/// [`crate::types::Sensitivity::cache_ttl_secs`]; this section only governs
/// capacity and the background sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "d_max_entries")]
    pub max_entries: usize,
    #[serde(default = "d_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: d_max_entries(),
            sweep_interval_secs: d_sweep_interval(),
        }
    }
}

fn d_max_entries() -> usize {
    100_000
}
fn d_sweep_interval() -> u64 {
    60
}
