//! In-process adapters
//!
//! Used by tests and by single-node deployments that run without Postgres
//! or Redis.

pub mod tenant_repo;
pub mod entity_store;
pub mod rate_counter;

pub use tenant_repo::InMemoryTenantRepository;
pub use entity_store::InMemoryEntityStore;
pub use rate_counter::InMemoryRateCounter;
