//! Cache module (Redis adapters)

pub mod rate_counter;

pub use rate_counter::{create_redis_pool, RedisRateCounter};
