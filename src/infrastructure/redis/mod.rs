//! Redis-backed rate limiting.

pub mod redis_rate_limit_store;

pub use redis_rate_limit_store::RedisRateLimitStore;
