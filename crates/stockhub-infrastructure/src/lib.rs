//! # StockHub Infrastructure
//! 
//! Database and cache implementations (adapters).

pub mod database;
pub mod cache;

pub use database::{create_pool, run_migrations, PgEntityStore, PgTenantRepository};
pub use cache::{create_redis_pool, RedisRateCounter};
