//! hostglow-core — library behind the hostglow metrics agent.
//!
//! Provides:
//! - `collector` — source readers over `/proc` and `/sys`, with mocking
//! - `config` — host/GPU type selection and agent settings
//! - `rates` — cumulative-counter to per-second rate conversion
//! - `registry` — concurrency-safe store of current metric values
//! - `render` — Prometheus text exposition rendering
//! - `sampler` — per-cycle pipeline tying readers, rates and the registry

pub mod collector;
pub mod config;
pub mod rates;
pub mod registry;
pub mod render;
pub mod sampler;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
