//! Multi-window rate limiting and per-user quota tracking

pub mod limiter;
pub mod ports;
pub mod windows;

pub use limiter::RateLimiter;
pub use ports::{CounterStore, QuotaRepository, UsageLogRepository};
pub use windows::{Window, WindowBucket};
