//! Infrastructure - configuration and metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `metrics` - Lock-free API call metrics

pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use config::Config;
pub use metrics::ApiMetrics;
