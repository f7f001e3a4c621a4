//! Pipeline configuration, resolved once at startup

use std::env;

/// Cache capacity when no capability signal is available
pub const CONSERVATIVE_CAPACITY: usize = 200;
/// Cache capacity on devices reporting more than [`LARGE_DEVICE_MEMORY_GB`]
pub const LARGE_CAPACITY: usize = 400;
pub const LARGE_DEVICE_MEMORY_GB: f64 = 4.0;

pub const DEFAULT_FETCH_CONCURRENCY: usize = 10;
pub const DEFAULT_RENDER_BATCH_SIZE: usize = 20;

/// Pick a cache capacity from the device-memory class, in gigabytes
pub fn capacity_for_device_memory(gigabytes: Option<f64>) -> usize {
    match gigabytes {
        Some(gb) if gb.is_finite() && gb > LARGE_DEVICE_MEMORY_GB => LARGE_CAPACITY,
        _ => CONSERVATIVE_CAPACITY,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub cache_capacity: usize,
    pub fetch_concurrency: usize,
    pub render_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: CONSERVATIVE_CAPACITY,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            render_batch_size: DEFAULT_RENDER_BATCH_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let device_memory = lookup("DEVICE_MEMORY_GB").and_then(|s| s.trim().parse::<f64>().ok());

        let fetch_concurrency = lookup("ASSET_FETCH_CONCURRENCY")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_FETCH_CONCURRENCY)
            .max(1);

        let render_batch_size = lookup("RENDER_BATCH_SIZE")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_RENDER_BATCH_SIZE)
            .max(1);

        Self {
            cache_capacity: capacity_for_device_memory(device_memory),
            fetch_concurrency,
            render_batch_size,
        }
    }
}
